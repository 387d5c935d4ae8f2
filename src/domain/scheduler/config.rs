use std::path::PathBuf;

use crate::api::config_dto::SchedulerConfigDto;
use crate::domain::cluster::node_range::NodeRange;
use crate::domain::scheduler::request::Limits;
use crate::domain::utils::id::UserName;
use crate::domain::vlan::vlan_allocator::VlanAllocator;
use crate::error::{Error, Result};
use crate::loader::parser::parse_json_file;

/// Hard ceiling for `maxReservationDays`, about ten years.
const MAX_RESERVATION_DAYS: i64 = 3660;

/// Validated scheduler configuration. Times are in seconds unless noted.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub nodes: NodeRange,

    /// Width of one time slice in s.
    pub slice_width: i64,

    pub vlans: VlanAllocator,

    /// Default limits for non-privileged callers.
    pub limits: Limits,

    /// How far past the earliest candidate start a search may look.
    pub lookahead: i64,

    /// Longest reservation anyone may hold, in s.
    pub max_duration: i64,

    pub speculative_count: usize,
    pub speculative_increment: i64,

    pub state_path: PathBuf,
    pub tftp_root: PathBuf,
    pub use_cobbler: bool,
    pub privileged_user: UserName,
    pub audit_log_path: Option<PathBuf>,
}

impl SchedulerConfig {
    pub fn from_file(file_path: &str) -> Result<Self> {
        let dto: SchedulerConfigDto = parse_json_file(file_path)?;
        log::info!("Loaded scheduler configuration from '{}'.", file_path);
        SchedulerConfig::try_from(dto)
    }

    pub fn is_privileged(&self, user: &UserName) -> bool {
        &self.privileged_user == user
    }
}

impl TryFrom<SchedulerConfigDto> for SchedulerConfig {
    type Error = Error;

    fn try_from(dto: SchedulerConfigDto) -> Result<Self> {
        if dto.minutes_per_slice <= 0 {
            return Err(Error::ConfigError(format!("minutesPerSlice must be positive, got {}", dto.minutes_per_slice)));
        }

        if dto.lookahead_days <= 0 {
            return Err(Error::ConfigError(format!("lookaheadDays must be positive, got {}", dto.lookahead_days)));
        }

        if dto.max_reservation_days <= 0 || dto.max_reservation_days > MAX_RESERVATION_DAYS {
            return Err(Error::ConfigError(format!(
                "maxReservationDays must be in 1..={}, got {}",
                MAX_RESERVATION_DAYS, dto.max_reservation_days
            )));
        }

        if dto.speculative_increment_minutes <= 0 {
            return Err(Error::ConfigError(format!(
                "speculativeIncrementMinutes must be positive, got {}",
                dto.speculative_increment_minutes
            )));
        }

        if dto.time_limit < 0 {
            return Err(Error::ConfigError(format!("timeLimit can't be negative, got {}", dto.time_limit)));
        }

        let nodes = NodeRange::new(dto.prefix, dto.start, dto.end)?;
        let vlans = VlanAllocator::new(dto.vlan_min, dto.vlan_max)?;

        Ok(SchedulerConfig {
            nodes,
            slice_width: to_seconds("minutesPerSlice", dto.minutes_per_slice, 60)?,
            vlans,
            limits: Limits { node_limit: dto.node_limit, time_limit: dto.time_limit },
            lookahead: to_seconds("lookaheadDays", dto.lookahead_days, 24 * 60 * 60)?,
            max_duration: dto.max_reservation_days * 24 * 60 * 60,
            speculative_count: dto.speculative_count,
            speculative_increment: to_seconds("speculativeIncrementMinutes", dto.speculative_increment_minutes, 60)?,
            state_path: PathBuf::from(dto.state_path),
            tftp_root: PathBuf::from(dto.tftp_root),
            use_cobbler: dto.use_cobbler,
            privileged_user: UserName::new(dto.privileged_user),
            audit_log_path: dto.audit_log_path.map(PathBuf::from),
        })
    }
}

fn to_seconds(field: &str, value: i64, unit: i64) -> Result<i64> {
    value.checked_mul(unit).ok_or_else(|| Error::ConfigError(format!("{} is too large, got {}", field, value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dto() -> SchedulerConfigDto {
        serde_json::from_str(r#"{ "prefix": "host", "start": 1, "end": 4, "vlanMin": 100, "vlanMax": 199 }"#).unwrap()
    }

    #[test]
    fn test_defaults_are_applied() {
        let config = SchedulerConfig::try_from(dto()).unwrap();

        assert_eq!(config.slice_width, 60);
        assert_eq!(config.lookahead, 14 * 24 * 3600);
        assert_eq!(config.max_duration, 365 * 24 * 3600);
        assert_eq!(config.speculative_count, 10);
        assert_eq!(config.speculative_increment, 600);
        assert_eq!(config.nodes.len(), 4);
        assert_eq!(config.limits, Limits { node_limit: 0, time_limit: 0 });
        assert!(config.is_privileged(&UserName::new("root")));
        assert!(!config.use_cobbler);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut bad_slice = dto();
        bad_slice.minutes_per_slice = 0;
        assert!(matches!(SchedulerConfig::try_from(bad_slice), Err(Error::ConfigError(_))));

        let mut bad_vlans = dto();
        bad_vlans.vlan_min = 200;
        assert!(matches!(SchedulerConfig::try_from(bad_vlans), Err(Error::ConfigError(_))));

        let mut bad_max = dto();
        bad_max.max_reservation_days = 0;
        assert!(matches!(SchedulerConfig::try_from(bad_max), Err(Error::ConfigError(_))));

        let mut huge_lookahead = dto();
        huge_lookahead.lookahead_days = i64::MAX;
        assert!(matches!(SchedulerConfig::try_from(huge_lookahead), Err(Error::ConfigError(_))));

        let mut bad_range = dto();
        bad_range.start = 5;
        assert!(matches!(SchedulerConfig::try_from(bad_range), Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scheduler.json");
        std::fs::write(&path, serde_json::to_string(&dto()).unwrap()).unwrap();

        let config = SchedulerConfig::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.vlans.max(), 199);
    }
}
