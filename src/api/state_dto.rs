use serde::{Deserialize, Serialize};

use crate::domain::reservation::reservation::Reservation;
use crate::domain::schedule::time_slice::TimeSlice;

/// On-disk form of the scheduler state. Both records live in one document so
/// they are always replaced together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateDto {
    pub next_id: u64,
    pub reservations: Vec<Reservation>,
    pub schedule: ScheduleDto,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleDto {
    /// Slice width in seconds the slices were written with.
    pub slice_width: i64,
    pub slices: Vec<TimeSlice>,
}
