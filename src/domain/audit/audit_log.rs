use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::domain::reservation::reservation::Reservation;
use crate::error::{Error, Result};

/// `tracing` target carrying reservation lifecycle events.
pub const AUDIT_TARGET: &str = "testbed_scheduler::audit";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditAction {
    Created,
    Deleted,
    Extended,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = match self {
            AuditAction::Created => "CREATED",
            AuditAction::Deleted => "DELETED",
            AuditAction::Extended => "EXTENDED",
        };
        write!(f, "{}", action)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unix seconds at which the event happened.
    pub time: i64,
    pub action: AuditAction,
    pub reservation: Reservation,
}

impl AuditEvent {
    pub fn new(time: i64, action: AuditAction, reservation: Reservation) -> Self {
        AuditEvent { time, action, reservation }
    }
}

/// Append-only consumer of lifecycle events.
pub trait AuditSink: fmt::Debug + Send + Sync {
    fn record(&self, event: &AuditEvent) -> Result<()>;
}

/// Emits each event as a structured `tracing` event on `AUDIT_TARGET`.
#[derive(Debug, Clone, Default)]
pub struct TracingAuditLog;

impl AuditSink for TracingAuditLog {
    fn record(&self, event: &AuditEvent) -> Result<()> {
        let reservation = &event.reservation;

        tracing::info!(
            target: AUDIT_TARGET,
            time = event.time,
            action = %event.action,
            reservation_id = reservation.id.0,
            reservation_name = %reservation.name,
            owner = %reservation.owner,
            start = reservation.start_time,
            end = reservation.end_time,
            hosts = ?reservation.hosts,
            vlan = reservation.vlan,
            "reservation {}",
            event.action
        );

        Ok(())
    }
}

/// Appends one JSON line per event to a file.
#[derive(Debug)]
pub struct FileAuditLog {
    path: PathBuf,

    /// Serialises appends from concurrent callers.
    lock: Mutex<()>,
}

impl FileAuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileAuditLog { path: path.into(), lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl AuditSink for FileAuditLog {
    fn record(&self, event: &AuditEvent) -> Result<()> {
        let _guard = self.lock.lock().map_err(|_| Error::StatePoisoned)?;

        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;

        Ok(())
    }
}

/// Keeps events in memory. Useful for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        MemoryAuditLog::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn actions(&self) -> Vec<AuditAction> {
        self.events().iter().map(|event| event.action).collect()
    }
}

impl AuditSink for MemoryAuditLog {
    fn record(&self, event: &AuditEvent) -> Result<()> {
        let mut events = self.events.lock().map_err(|_| Error::StatePoisoned)?;
        events.push(event.clone());
        Ok(())
    }
}

/// Forwards every event to several sinks, reporting the first failure.
#[derive(Debug, Default)]
pub struct AuditFanout {
    sinks: Vec<Box<dyn AuditSink>>,
}

impl AuditFanout {
    pub fn new(sinks: Vec<Box<dyn AuditSink>>) -> Self {
        AuditFanout { sinks }
    }
}

impl AuditSink for AuditFanout {
    fn record(&self, event: &AuditEvent) -> Result<()> {
        let mut first_error = None;

        for sink in &self.sinks {
            if let Err(e) = sink.record(event) {
                log::error!("Audit sink {:?} failed: {}", sink, e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
