use std::sync::Arc;

use crate::domain::audit::audit_log::{AuditFanout, AuditSink, FileAuditLog, TracingAuditLog};
use crate::domain::boot::boot_stager::TftpBootStager;
use crate::domain::clock::clock::SystemClock;
use crate::domain::persistence::state_store::FileStateStore;
use crate::domain::scheduler::config::SchedulerConfig;
use crate::domain::scheduler::scheduler::Scheduler;
use crate::error::Result;

pub mod api;
pub mod domain;
pub mod error;
pub mod loader;
pub mod logger;

/// Builds a scheduler from a JSON config file, wired to the on-disk state,
/// the TFTP boot directory and the configured audit sinks.
pub fn open_scheduler(file_path: &str, clock: Arc<dyn SystemClock>) -> Result<Scheduler> {
    let config = SchedulerConfig::from_file(file_path)?;
    log::info!("Configuration parsed, cluster has {} nodes.", config.nodes.len());

    let audit: Arc<dyn AuditSink> = match &config.audit_log_path {
        Some(path) => {
            let sinks: Vec<Box<dyn AuditSink>> = vec![Box::new(TracingAuditLog), Box::new(FileAuditLog::new(path))];
            Arc::new(AuditFanout::new(sinks))
        }
        None => Arc::new(TracingAuditLog),
    };

    let persistence = Box::new(FileStateStore::new(&config.state_path));
    let boot_stager = Box::new(TftpBootStager::new(&config.tftp_root));

    let scheduler = Scheduler::open(config, clock, persistence)?.with_audit_sink(audit).with_boot_stager(boot_stager);
    log::info!("Scheduler state loaded successfully.");

    Ok(scheduler)
}
