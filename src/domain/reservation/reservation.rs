use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::domain::utils::id::{ReservationName, UserName};

/// Monotonic reservation number handed out by the `ReservationStore`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReservationId(pub u64);

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the reserved nodes boot: either an explicit kernel/initrd pair or a
/// named Cobbler profile, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BootSpec {
    KernelInitrd { kernel: PathBuf, initrd: PathBuf },
    Profile { name: String },
}

/// `[start, end)` in unix seconds, aligned to slice boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start: i64,
    pub end: i64,
}

impl Window {
    pub fn new(start: i64, end: i64) -> Self {
        Window { start, end }
    }

    pub fn duration(&self) -> i64 {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Window) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: ReservationId,
    pub name: ReservationName,
    pub owner: UserName,

    /// Unix seconds, inclusive.
    pub start_time: i64,

    /// Unix seconds, exclusive.
    pub end_time: i64,

    pub vlan: u32,

    /// Node names in ascending node id order.
    pub hosts: Vec<String>,

    pub boot: BootSpec,

    #[serde(default)]
    pub kernel_args: String,
}

impl Reservation {
    pub fn window(&self) -> Window {
        Window::new(self.start_time, self.end_time)
    }

    /// A reservation stays active (holds its nodes and vlan) until its end time passes.
    pub fn is_active(&self, now: i64) -> bool {
        self.end_time > now
    }

    pub fn is_owned_by(&self, user: &UserName) -> bool {
        &self.owner == user
    }
}
