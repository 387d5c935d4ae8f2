use std::fmt::Debug;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Source of "now" for the scheduler. Everything that prunes, searches or
/// validates windows asks this trait instead of the OS, so tests can pin time.
pub trait SystemClock: Debug + Send + Sync {
    fn get_current_time_in_s(&self) -> i64 {
        self.get_current_time_in_ms() / 1000
    }

    fn get_current_time_in_ms(&self) -> i64;
}

/// Wall clock backed by `SystemTime`.
#[derive(Debug, Clone, Default)]
pub struct Clock;

impl Clock {
    pub fn new() -> Clock {
        Clock
    }

    fn get_system_time_ms() -> i64 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO).as_millis() as i64
    }
}

impl SystemClock for Clock {
    fn get_current_time_in_ms(&self) -> i64 {
        Self::get_system_time_ms()
    }
}
