use std::sync::mpsc;

use crate::domain::reservation::reservation::{Reservation, ReservationId, Window};
use crate::domain::scheduler::request::{CreateRequest, NodeSpec};
use crate::domain::utils::id::{ReservationName, UserName};
use crate::error::Result;

/// One message per public `Scheduler` operation, so calls can be handed to
/// the thread owning the scheduler.
pub enum SchedulerMessage {
    Create {
        request: CreateRequest,
        reply_to: mpsc::Sender<Result<Reservation>>,
    },

    Preview {
        duration_minutes: i64,
        nodes: NodeSpec,
        earliest_start: Option<i64>,
        count: usize,
        reply_to: mpsc::Sender<Result<Vec<Window>>>,
    },

    Cancel {
        id: ReservationId,
        caller: UserName,
        reply_to: mpsc::Sender<Result<Reservation>>,
    },

    CancelByName {
        name: ReservationName,
        caller: UserName,
        reply_to: mpsc::Sender<Result<Reservation>>,
    },

    Extend {
        id: ReservationId,
        extra_minutes: i64,
        caller: UserName,
        reply_to: mpsc::Sender<Result<Reservation>>,
    },

    Expire(mpsc::Sender<Result<Vec<Reservation>>>),
    List(mpsc::Sender<Result<Vec<Reservation>>>),

    Get {
        id: ReservationId,
        reply_to: mpsc::Sender<Result<Option<Reservation>>>,
    },

    GetByName {
        name: ReservationName,
        reply_to: mpsc::Sender<Result<Option<Reservation>>>,
    },

    Shutdown,
}
