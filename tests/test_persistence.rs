mod common;

use std::sync::Arc;

use common::{HOUR, NOW, assert_consistent, config, config_dto, request};
use testbed_scheduler::domain::clock::clock_mock::MockClock;
use testbed_scheduler::domain::persistence::state_store::{FileStateStore, StatePersistence};
use testbed_scheduler::domain::reservation::reservation::ReservationId;
use testbed_scheduler::domain::scheduler::request::{BootRequest, CreateRequest, NodeSpec};
use testbed_scheduler::domain::scheduler::scheduler::Scheduler;
use testbed_scheduler::open_scheduler;

fn open(path: &std::path::Path, clock: &MockClock) -> Scheduler {
    Scheduler::open(config(4), Arc::new(clock.clone()), Box::new(FileStateStore::new(path))).unwrap()
}

#[test]
fn test_restart_restores_reservations_and_schedule() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let clock = MockClock::new(NOW);

    let scheduler = open(&path, &clock);
    scheduler.create(request("alpha", "alice", 60, NodeSpec::Count(2))).unwrap();
    scheduler.create(request("beta", "bob", 90, NodeSpec::Named("host[2-3]".to_string()))).unwrap();
    let reservations = scheduler.list().unwrap();
    let schedule = scheduler.schedule().unwrap();
    drop(scheduler);

    let reopened = open(&path, &clock);

    assert_eq!(reopened.list().unwrap(), reservations);
    assert_eq!(reopened.schedule().unwrap(), schedule);

    // ids keep counting where they left off
    let gamma = reopened.create(request("gamma", "alice", 60, NodeSpec::Count(1))).unwrap();
    assert_eq!(gamma.id, ReservationId(3));
    assert_consistent(&reopened.list().unwrap());
}

#[test]
fn test_restart_after_reservations_ended() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let clock = MockClock::new(NOW);

    let scheduler = open(&path, &clock);
    scheduler.create(request("alpha", "alice", 60, NodeSpec::Count(4))).unwrap();
    drop(scheduler);

    clock.advance(2 * HOUR);
    let reopened = open(&path, &clock);
    assert_eq!(reopened.list().unwrap().len(), 1);

    let expired = reopened.expire().unwrap();
    assert_eq!(expired.len(), 1);
    assert!(reopened.list().unwrap().is_empty());

    let persisted = FileStateStore::new(&path).load().unwrap().unwrap();
    assert!(persisted.reservations.is_empty());
    assert_eq!(persisted.schedule.slices.first().map(|slice| slice.start), Some(NOW + 2 * HOUR));
}

#[test]
fn test_inconsistent_schedule_is_rebuilt_from_reservations() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let clock = MockClock::new(NOW);

    let scheduler = open(&path, &clock);
    let alpha = scheduler.create(request("alpha", "alice", 60, NodeSpec::Count(2))).unwrap();
    drop(scheduler);

    // a state written with another slice width
    let store = FileStateStore::new(&path);
    let mut state = store.load().unwrap().unwrap();
    state.schedule.slice_width = 300;
    store.save(&state).unwrap();

    let reopened = open(&path, &clock);
    let schedule = reopened.schedule().unwrap();

    assert_eq!(schedule.slice_width(), 60);
    assert_eq!(schedule.occupant(0, NOW), Some(alpha.id));
    assert_eq!(schedule.occupant(1, NOW + HOUR - 1), Some(alpha.id));
    assert_eq!(schedule.occupant(2, NOW), None);

    let beta = reopened.create(request("beta", "alice", 60, NodeSpec::Count(3))).unwrap();
    assert_eq!(beta.start_time, NOW + HOUR);
}

#[test]
fn test_open_scheduler_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut dto = config_dto(4);
    dto.state_path = dir.path().join("state.json").to_string_lossy().to_string();
    dto.tftp_root = dir.path().join("tftp").to_string_lossy().to_string();
    dto.audit_log_path = Some(dir.path().join("audit.log").to_string_lossy().to_string());

    let config_path = dir.path().join("scheduler.json");
    std::fs::write(&config_path, serde_json::to_string_pretty(&dto).unwrap()).unwrap();

    let kernel = dir.path().join("vmlinuz");
    let initrd = dir.path().join("initrd.img");
    std::fs::write(&kernel, b"kernel").unwrap();
    std::fs::write(&initrd, b"initrd").unwrap();

    let scheduler = open_scheduler(config_path.to_str().unwrap(), Arc::new(MockClock::new(NOW))).unwrap();
    let boot = BootRequest::kernel_initrd(&kernel, &initrd);
    let alpha = scheduler.create(CreateRequest::new("alpha", "alice", 60, NodeSpec::Count(1), boot).with_kernel_args("console=ttyS0")).unwrap();

    assert!(dir.path().join("tftp").join("igor").join("alpha-kernel").exists());
    assert!(dir.path().join("tftp").join("igor").join("alpha-initrd").exists());

    let audit = std::fs::read_to_string(dir.path().join("audit.log")).unwrap();
    assert_eq!(audit.lines().count(), 1);
    assert!(audit.contains("\"CREATED\""));

    let state = FileStateStore::new(dir.path().join("state.json")).load().unwrap().unwrap();
    assert_eq!(state.reservations, vec![alpha]);
    assert_eq!(state.reservations[0].kernel_args, "console=ttyS0");
}
