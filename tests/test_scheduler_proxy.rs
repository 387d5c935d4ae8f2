mod common;

use std::thread;

use common::{Fixture, NOW, assert_consistent, request};
use testbed_scheduler::domain::audit::audit_log::AuditAction;
use testbed_scheduler::domain::scheduler::request::NodeSpec;
use testbed_scheduler::domain::scheduler::scheduler_proxy::SchedulerProxy;
use testbed_scheduler::domain::utils::id::{ReservationName, UserName};
use testbed_scheduler::error::Error;

#[test]
fn test_concurrent_creations_never_collide() {
    let fixture = Fixture::with_nodes(4);
    let audit = fixture.audit.clone();
    let proxy = SchedulerProxy::spawn(fixture.scheduler).unwrap();

    let workers: Vec<_> = (0..8)
        .map(|i| {
            let proxy = proxy.clone();
            thread::spawn(move || {
                for j in 0..5 {
                    let nodes = if (i + j) % 2 == 0 { NodeSpec::Count(2) } else { NodeSpec::Named(format!("host{}", 1 + (i + j) % 4)) };
                    proxy.create(request(&format!("r{}-{}", i, j), "alice", 30 + 15 * j as i64, nodes)).unwrap();
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    let reservations = proxy.list().unwrap();
    assert_eq!(reservations.len(), 40);
    assert!(reservations.iter().all(|r| r.start_time >= NOW));
    assert_consistent(&reservations);
    assert_eq!(audit.actions().len(), 40);
    assert!(audit.actions().iter().all(|action| *action == AuditAction::Created));

    proxy.shutdown().unwrap();
}

#[test]
fn test_concurrent_name_conflicts() {
    let fixture = Fixture::with_nodes(4);
    let proxy = SchedulerProxy::spawn(fixture.scheduler).unwrap();

    let workers: Vec<_> = (0..6)
        .map(|_| {
            let proxy = proxy.clone();
            thread::spawn(move || proxy.create(request("shared", "alice", 60, NodeSpec::Count(1))))
        })
        .collect();
    let results: Vec<_> = workers.into_iter().map(|worker| worker.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    assert!(results.iter().filter_map(|result| result.as_ref().err()).all(|e| matches!(e, Error::NameConflict(_))));

    proxy.shutdown().unwrap();
}

#[test]
fn test_proxy_forwards_every_operation() {
    let fixture = Fixture::with_nodes(4);
    let proxy = SchedulerProxy::spawn(fixture.scheduler).unwrap();
    let alice = UserName::new("alice");

    let alpha = proxy.create(request("alpha", "alice", 60, NodeSpec::Count(2))).unwrap();
    assert_eq!(proxy.get(alpha.id).unwrap(), Some(alpha.clone()));
    assert_eq!(proxy.get_by_name(ReservationName::new("alpha")).unwrap().map(|r| r.id), Some(alpha.id));

    let windows = proxy.preview(60, NodeSpec::Count(4), None, 2).unwrap();
    assert_eq!(windows[0].start, alpha.end_time);

    let extended = proxy.extend(alpha.id, 30, alice.clone()).unwrap();
    assert_eq!(extended.end_time, alpha.end_time + 1800);

    assert!(proxy.expire().unwrap().is_empty());
    proxy.cancel_by_name(ReservationName::new("alpha"), alice.clone()).unwrap();
    assert!(matches!(proxy.cancel(alpha.id, alice), Err(Error::ReservationNotFound(_))));
    assert!(proxy.list().unwrap().is_empty());

    proxy.shutdown().unwrap();
}

#[test]
fn test_calls_after_shutdown_fail() {
    let fixture = Fixture::with_nodes(2);
    let proxy = SchedulerProxy::spawn(fixture.scheduler).unwrap();
    let clone = proxy.clone();

    proxy.shutdown().unwrap();

    assert!(matches!(clone.list(), Err(Error::ServiceUnavailable)));
    assert!(matches!(clone.create(request("late", "alice", 60, NodeSpec::Count(1))), Err(Error::ServiceUnavailable)));

    // shutting down twice is harmless
    clone.shutdown().unwrap();
}
