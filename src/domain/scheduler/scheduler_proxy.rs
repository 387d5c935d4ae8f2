use std::sync::{Arc, Mutex, mpsc};
use std::thread;

use crate::domain::reservation::reservation::{Reservation, ReservationId, Window};
use crate::domain::scheduler::request::{CreateRequest, NodeSpec};
use crate::domain::scheduler::scheduler::Scheduler;
use crate::domain::scheduler::scheduler_message::SchedulerMessage;
use crate::domain::utils::id::{ReservationName, UserName};
use crate::error::{Error, Result};

/// Cloneable handle to a `Scheduler` running on its own thread. Every call
/// is queued and executed one after the other.
#[derive(Debug, Clone)]
pub struct SchedulerProxy {
    tx: mpsc::Sender<SchedulerMessage>,
    worker: Arc<Mutex<Option<thread::JoinHandle<()>>>>,
}

impl SchedulerProxy {
    /// Moves `scheduler` onto a dedicated thread.
    pub fn spawn(scheduler: Scheduler) -> Result<Self> {
        let (tx, rx) = mpsc::channel::<SchedulerMessage>();

        let worker = thread::Builder::new().name("scheduler".to_string()).spawn(move || {
            log::info!("Scheduler thread started.");
            Self::run_loop(scheduler, rx);
            log::info!("Scheduler thread stopped.");
        })?;

        Ok(SchedulerProxy { tx, worker: Arc::new(Mutex::new(Some(worker))) })
    }

    fn run_loop(scheduler: Scheduler, rx: mpsc::Receiver<SchedulerMessage>) {
        while let Ok(msg) = rx.recv() {
            match msg {
                SchedulerMessage::Create { request, reply_to } => {
                    let _ = reply_to.send(scheduler.create(request));
                }
                SchedulerMessage::Preview { duration_minutes, nodes, earliest_start, count, reply_to } => {
                    let _ = reply_to.send(scheduler.preview(duration_minutes, &nodes, earliest_start, count));
                }
                SchedulerMessage::Cancel { id, caller, reply_to } => {
                    let _ = reply_to.send(scheduler.cancel(id, &caller));
                }
                SchedulerMessage::CancelByName { name, caller, reply_to } => {
                    let _ = reply_to.send(scheduler.cancel_by_name(&name, &caller));
                }
                SchedulerMessage::Extend { id, extra_minutes, caller, reply_to } => {
                    let _ = reply_to.send(scheduler.extend(id, extra_minutes, &caller));
                }
                SchedulerMessage::Expire(reply_to) => {
                    let _ = reply_to.send(scheduler.expire());
                }
                SchedulerMessage::List(reply_to) => {
                    let _ = reply_to.send(scheduler.list());
                }
                SchedulerMessage::Get { id, reply_to } => {
                    let _ = reply_to.send(scheduler.get(id));
                }
                SchedulerMessage::GetByName { name, reply_to } => {
                    let _ = reply_to.send(scheduler.get_by_name(&name));
                }
                SchedulerMessage::Shutdown => break,
            }
        }
    }

    fn call<R, F>(&self, msg_builder: F) -> Result<R>
    where
        F: FnOnce(mpsc::Sender<Result<R>>) -> SchedulerMessage,
    {
        let (reply_tx, reply_rx) = mpsc::channel();

        self.tx.send(msg_builder(reply_tx)).map_err(|_| Error::ServiceUnavailable)?;
        reply_rx.recv().map_err(|_| Error::ServiceUnavailable)?
    }

    pub fn create(&self, request: CreateRequest) -> Result<Reservation> {
        self.call(|tx| SchedulerMessage::Create { request, reply_to: tx })
    }

    pub fn preview(&self, duration_minutes: i64, nodes: NodeSpec, earliest_start: Option<i64>, count: usize) -> Result<Vec<Window>> {
        self.call(|tx| SchedulerMessage::Preview { duration_minutes, nodes, earliest_start, count, reply_to: tx })
    }

    pub fn cancel(&self, id: ReservationId, caller: UserName) -> Result<Reservation> {
        self.call(|tx| SchedulerMessage::Cancel { id, caller, reply_to: tx })
    }

    pub fn cancel_by_name(&self, name: ReservationName, caller: UserName) -> Result<Reservation> {
        self.call(|tx| SchedulerMessage::CancelByName { name, caller, reply_to: tx })
    }

    pub fn extend(&self, id: ReservationId, extra_minutes: i64, caller: UserName) -> Result<Reservation> {
        self.call(|tx| SchedulerMessage::Extend { id, extra_minutes, caller, reply_to: tx })
    }

    pub fn expire(&self) -> Result<Vec<Reservation>> {
        self.call(SchedulerMessage::Expire)
    }

    pub fn list(&self) -> Result<Vec<Reservation>> {
        self.call(SchedulerMessage::List)
    }

    pub fn get(&self, id: ReservationId) -> Result<Option<Reservation>> {
        self.call(|tx| SchedulerMessage::Get { id, reply_to: tx })
    }

    pub fn get_by_name(&self, name: ReservationName) -> Result<Option<Reservation>> {
        self.call(|tx| SchedulerMessage::GetByName { name, reply_to: tx })
    }

    /// Stops the scheduler thread after the calls queued before this one.
    /// Later calls on any clone fail with `Error::ServiceUnavailable`.
    pub fn shutdown(&self) -> Result<()> {
        let _ = self.tx.send(SchedulerMessage::Shutdown);

        let worker = self.worker.lock().map_err(|_| Error::StatePoisoned)?.take();
        if let Some(worker) = worker {
            worker.join().map_err(|_| Error::ServiceUnavailable)?;
        }

        Ok(())
    }
}
