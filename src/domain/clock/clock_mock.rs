use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::domain::clock::clock::SystemClock;

/// Manually driven clock. Clones share the same time, so a test can hold one
/// handle and advance the clock seen by a scheduler it already handed off.
#[derive(Debug, Clone)]
pub struct MockClock {
    time_s: Arc<AtomicI64>,
}

impl MockClock {
    pub fn new(time_s: i64) -> MockClock {
        MockClock { time_s: Arc::new(AtomicI64::new(time_s)) }
    }

    pub fn set_current_time(&self, time_s: i64) {
        self.time_s.store(time_s, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: i64) {
        self.time_s.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl SystemClock for MockClock {
    fn get_current_time_in_s(&self) -> i64 {
        self.time_s.load(Ordering::SeqCst)
    }

    fn get_current_time_in_ms(&self) -> i64 {
        self.get_current_time_in_s() * 1000
    }
}
