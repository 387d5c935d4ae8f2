use serde::{Deserialize, Serialize};

fn default_minutes_per_slice() -> i64 {
    1
}

fn default_lookahead_days() -> i64 {
    14
}

fn default_max_reservation_days() -> i64 {
    365
}

fn default_speculative_count() -> usize {
    10
}

fn default_speculative_increment_minutes() -> i64 {
    10
}

fn default_state_path() -> String {
    "/var/lib/igor/state.json".to_string()
}

fn default_tftp_root() -> String {
    "/tftpboot".to_string()
}

fn default_privileged_user() -> String {
    "root".to_string()
}

/// Scheduler configuration as written in the JSON config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerConfigDto {
    pub prefix: String,
    pub start: u32,
    pub end: u32,

    #[serde(default = "default_minutes_per_slice")]
    pub minutes_per_slice: i64,

    pub vlan_min: u32,
    pub vlan_max: u32,

    /// Max nodes per reservation for non-privileged users, 0 disables the limit.
    #[serde(default)]
    pub node_limit: usize,

    /// Max reservation length in minutes for non-privileged users, 0 disables the limit.
    #[serde(default)]
    pub time_limit: i64,

    #[serde(default = "default_lookahead_days")]
    pub lookahead_days: i64,

    /// Upper bound on the length of any reservation, privileged or not.
    #[serde(default = "default_max_reservation_days")]
    pub max_reservation_days: i64,

    #[serde(default = "default_speculative_count")]
    pub speculative_count: usize,

    #[serde(default = "default_speculative_increment_minutes")]
    pub speculative_increment_minutes: i64,

    #[serde(default = "default_state_path")]
    pub state_path: String,

    #[serde(default = "default_tftp_root")]
    pub tftp_root: String,

    #[serde(default)]
    pub use_cobbler: bool,

    #[serde(default = "default_privileged_user")]
    pub privileged_user: String,

    /// Optional JSON-lines file receiving audit events.
    #[serde(default)]
    pub audit_log_path: Option<String>,
}
