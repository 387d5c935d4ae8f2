use thiserror::Error;

use crate::domain::reservation::reservation::ReservationId;

#[derive(Debug, Error)]
pub enum Error {
    #[error("A reservation named '{0}' already exists.")]
    NameConflict(String),

    #[error("Invalid boot specification: {0}")]
    InvalidBootSpec(String),

    #[error("Policy limit exceeded: {0}")]
    PolicyLimitExceeded(String),

    #[error("No free capacity for the requested reservation within the lookahead horizon.")]
    NoCapacity,

    #[error("Couldn't assign a vlan: all ids in [{min}, {max}] are in use.")]
    PoolExhausted { min: u32, max: u32 },

    #[error("Couldn't parse node specification '{0}'.")]
    MalformedNodeList(String),

    #[error("Unable to parse duration '{0}'.")]
    InvalidDuration(String),

    #[error("Unable to parse start time '{0}', expected format like 2017-Jan-2-15:04.")]
    InvalidStartTime(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Reservation not found: {0}")]
    ReservationNotFound(String),

    #[error("User '{user}' is not allowed to modify reservation '{reservation}'.")]
    PermissionDenied { user: String, reservation: String },

    #[error("Node {node} is already occupied by reservation {occupant} at time {time}.")]
    SlotConflict { node: usize, occupant: ReservationId, time: i64 },

    #[error("Failed to persist scheduler state: {0}")]
    Persistence(String),

    #[error("Failed to stage boot files: {0}")]
    BootStaging(String),

    #[error("File not found or could not be read: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    DeserializationError(#[from] serde_json::Error),

    #[error("Invalid scheduler configuration: {0}")]
    ConfigError(String),

    #[error("Scheduler state lock was poisoned.")]
    StatePoisoned,

    #[error("Scheduler service is not running.")]
    ServiceUnavailable,
}

pub type Result<T> = std::result::Result<T, Error>;
