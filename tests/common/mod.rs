#![allow(dead_code)]

use std::sync::Arc;

use testbed_scheduler::api::config_dto::SchedulerConfigDto;
use testbed_scheduler::domain::audit::audit_log::MemoryAuditLog;
use testbed_scheduler::domain::clock::clock_mock::MockClock;
use testbed_scheduler::domain::persistence::state_store::MemoryStateStore;
use testbed_scheduler::domain::reservation::reservation::Reservation;
use testbed_scheduler::domain::scheduler::config::SchedulerConfig;
use testbed_scheduler::domain::scheduler::request::{BootRequest, CreateRequest, NodeSpec};
use testbed_scheduler::domain::scheduler::scheduler::Scheduler;

/// Slice aligned start time used by every test, in unix seconds.
pub const NOW: i64 = 1_700_000_040;
pub const HOUR: i64 = 3600;

pub fn config_dto(nodes: u32) -> SchedulerConfigDto {
    let json = format!(r#"{{ "prefix": "host", "start": 1, "end": {}, "vlanMin": 100, "vlanMax": 199 }}"#, nodes);
    serde_json::from_str(&json).unwrap()
}

pub fn config(nodes: u32) -> SchedulerConfig {
    SchedulerConfig::try_from(config_dto(nodes)).unwrap()
}

pub struct Fixture {
    pub clock: MockClock,
    pub persistence: Arc<MemoryStateStore>,
    pub audit: Arc<MemoryAuditLog>,
    pub scheduler: Scheduler,
}

impl Fixture {
    pub fn new(config: SchedulerConfig) -> Fixture {
        let clock = MockClock::new(NOW);
        let persistence = Arc::new(MemoryStateStore::new());
        let audit = Arc::new(MemoryAuditLog::new());

        let scheduler = Scheduler::open(config, Arc::new(clock.clone()), Box::new(persistence.clone()))
            .unwrap()
            .with_audit_sink(audit.clone());

        Fixture { clock, persistence, audit, scheduler }
    }

    pub fn with_nodes(nodes: u32) -> Fixture {
        Fixture::new(config(nodes))
    }
}

pub fn request(name: &str, owner: &str, minutes: i64, nodes: NodeSpec) -> CreateRequest {
    CreateRequest::new(name, owner, minutes, nodes, BootRequest::kernel_initrd("/boot/vmlinuz", "/boot/initrd.img"))
}

/// Panics if two reservations share a host during overlapping windows, or
/// share a vlan while both are active.
pub fn assert_consistent(reservations: &[Reservation]) {
    for (i, a) in reservations.iter().enumerate() {
        for b in &reservations[i + 1..] {
            if !a.window().overlaps(&b.window()) {
                continue;
            }

            assert_ne!(a.vlan, b.vlan, "reservations {} and {} overlap on vlan {}", a.name, b.name, a.vlan);

            for host in &a.hosts {
                assert!(!b.hosts.contains(host), "reservations {} and {} overlap on {}", a.name, b.name, host);
            }
        }
    }
}
