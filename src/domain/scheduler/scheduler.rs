use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::api::state_dto::StateDto;
use crate::domain::audit::audit_log::{AuditAction, AuditEvent, AuditSink, TracingAuditLog};
use crate::domain::boot::boot_stager::{BootStager, NullBootStager};
use crate::domain::clock::clock::SystemClock;
use crate::domain::persistence::state_store::{StatePersistence, to_state_dto};
use crate::domain::reservation::reservation::{Reservation, ReservationId, Window};
use crate::domain::reservation::reservation_store::ReservationStore;
use crate::domain::schedule::slot_finder::{Candidate, SlotFinder};
use crate::domain::schedule::slotted_schedule::SlottedSchedule;
use crate::domain::scheduler::config::SchedulerConfig;
use crate::domain::scheduler::request::{CreateRequest, NodeSelection, NodeSpec, check_name};
use crate::domain::utils::id::{ReservationName, UserName};
use crate::error::{Error, Result};

/// Store and grid. They only change together, under the scheduler lock.
#[derive(Debug, Clone)]
struct SchedulerState {
    store: ReservationStore,
    schedule: SlottedSchedule,
}

impl SchedulerState {
    fn empty(config: &SchedulerConfig, now: i64) -> Self {
        SchedulerState { store: ReservationStore::new(), schedule: SlottedSchedule::new(config.nodes.len(), config.slice_width, now) }
    }

    /// Rebuilds the state from what was last persisted. A persisted grid that
    /// no longer fits the configuration or disagrees with the reservations is
    /// replaced by one derived from the reservations.
    fn restore(config: &SchedulerConfig, persisted: Option<StateDto>, now: i64) -> Result<Self> {
        let Some(persisted) = persisted else {
            return Ok(SchedulerState::empty(config, now));
        };

        let store = ReservationStore::from_parts(persisted.next_id, persisted.reservations)?;

        let restored = if persisted.schedule.slice_width == config.slice_width {
            SlottedSchedule::from_slices(config.nodes.len(), config.slice_width, now, persisted.schedule.slices)
        } else {
            Err(Error::Persistence(format!(
                "persisted slice width {}s differs from the configured {}s",
                persisted.schedule.slice_width, config.slice_width
            )))
        };

        let schedule = match restored {
            Ok(schedule) => {
                let derived = derive_schedule(config, &store, schedule.first_start())?;
                if same_occupancy(&schedule, &derived) {
                    schedule
                } else {
                    log::warn!("Persisted schedule disagrees with the persisted reservations, rebuilding it.");
                    derived
                }
            }
            Err(e) => {
                log::warn!("Discarding persisted schedule: {}", e);
                derive_schedule(config, &store, now)?
            }
        };

        Ok(SchedulerState { store, schedule })
    }
}

/// Lays every reservation of `store` into a fresh grid starting at `from`.
fn derive_schedule(config: &SchedulerConfig, store: &ReservationStore, from: i64) -> Result<SlottedSchedule> {
    let mut schedule = SlottedSchedule::new(config.nodes.len(), config.slice_width, from);

    for reservation in store.iter() {
        let start = reservation.start_time.max(schedule.first_start());
        if start >= reservation.end_time {
            continue;
        }

        let columns = config.nodes.indices_of(&reservation.hosts).map_err(|e| {
            Error::Persistence(format!("reservation '{}' holds nodes outside the cluster: {}", reservation.name, e))
        })?;

        schedule
            .reserve(&columns, Window::new(start, reservation.end_time), reservation.id)
            .map_err(|e| Error::Persistence(format!("reservation '{}' can't be laid into the schedule: {}", reservation.name, e)))?;
    }

    Ok(schedule)
}

fn same_occupancy(a: &SlottedSchedule, b: &SlottedSchedule) -> bool {
    let from = a.first_start().min(b.first_start());
    let to = a.horizon_end().max(b.horizon_end());
    let mut time = from;

    while time < to {
        for node in 0..a.num_nodes() {
            if a.occupant(node, time) != b.occupant(node, time) {
                return false;
            }
        }
        time += a.slice_width();
    }

    true
}

/// Front door of the reservation system.
///
/// All operations go through one `RwLock`: searches and listings share it,
/// every commit holds it exclusively from validation to audit. A commit
/// either lands in memory and on disk, or leaves no trace in either.
#[derive(Debug)]
pub struct Scheduler {
    config: SchedulerConfig,
    clock: Arc<dyn SystemClock>,
    persistence: Box<dyn StatePersistence>,
    audit: Arc<dyn AuditSink>,
    boot_stager: Box<dyn BootStager>,
    state: RwLock<SchedulerState>,
}

impl Scheduler {
    /// Loads the last persisted state. Reservations that ended meanwhile stay
    /// until the next `expire` or mutating call.
    ///
    /// Audit events go to `TracingAuditLog` and boot files are not staged
    /// until `with_audit_sink` and `with_boot_stager` say otherwise.
    pub fn open(config: SchedulerConfig, clock: Arc<dyn SystemClock>, persistence: Box<dyn StatePersistence>) -> Result<Self> {
        let now = clock.get_current_time_in_s();
        let state = SchedulerState::restore(&config, persistence.load()?, now)?;

        log::info!(
            "Scheduler opened with {} reservations on {} nodes ({}s slices).",
            state.store.len(),
            config.nodes.len(),
            config.slice_width
        );

        let scheduler = Scheduler {
            config,
            clock,
            persistence,
            audit: Arc::new(TracingAuditLog),
            boot_stager: Box::new(NullBootStager),
            state: RwLock::new(state),
        };

        Ok(scheduler)
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_boot_stager(mut self, boot_stager: Box<dyn BootStager>) -> Self {
        self.boot_stager = boot_stager;
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    fn now(&self) -> i64 {
        self.clock.get_current_time_in_s()
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, SchedulerState>> {
        self.state.read().map_err(|_| Error::StatePoisoned)
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, SchedulerState>> {
        self.state.write().map_err(|_| Error::StatePoisoned)
    }

    fn persist(&self, state: &SchedulerState) -> Result<()> {
        self.persistence.save(&to_state_dto(&state.store, &state.schedule))
    }

    fn audit(&self, now: i64, action: AuditAction, reservation: &Reservation) {
        if let Err(e) = self.audit.record(&AuditEvent::new(now, action, reservation.clone())) {
            log::error!("Failed to record {} event for reservation '{}': {}", action, reservation.name, e);
        }
    }

    /// Converts a length in minutes to seconds, refusing anything longer
    /// than the configured maximum.
    fn duration_in_s(&self, minutes: i64) -> Result<i64> {
        minutes
            .checked_mul(60)
            .filter(|seconds| *seconds <= self.config.max_duration)
            .ok_or_else(|| Error::InvalidDuration(format!("{}m is longer than the maximum of {}m", minutes, self.config.max_duration / 60)))
    }

    /// Earliest time a search may start at: the requested start, but never
    /// before the slice containing `now`.
    fn search_start(&self, schedule: &SlottedSchedule, earliest_start: Option<i64>, now: i64) -> i64 {
        let current_slice = schedule.align_down(now);
        earliest_start.map_or(current_slice, |start| start.max(current_slice))
    }

    fn find(&self, schedule: &SlottedSchedule, selection: &NodeSelection, duration: i64, after: i64) -> Result<Candidate> {
        let finder = SlotFinder::new(schedule, self.config.lookahead);

        match selection {
            NodeSelection::Any(count) => finder.find_after(duration, *count, after),
            NodeSelection::Exactly(columns) => finder.find_generic(duration, columns.len(), columns, true, after),
        }
    }

    fn check_permission(&self, reservation: &Reservation, caller: &UserName) -> Result<()> {
        if reservation.is_owned_by(caller) || self.config.is_privileged(caller) {
            return Ok(());
        }

        log::warn!("User '{}' tried to modify reservation '{}' owned by '{}'.", caller, reservation.name, reservation.owner);
        Err(Error::PermissionDenied { user: caller.to_string(), reservation: reservation.name.to_string() })
    }

    /// Finds the earliest window for `request`, assigns it a vlan and commits it.
    ///
    /// # Returns
    /// The committed reservation, or the first failing check:
    /// `InvalidRequest`, `NameConflict`, `InvalidBootSpec`, `MalformedNodeList`,
    /// `InvalidDuration`, `PolicyLimitExceeded`, `NoCapacity`, `PoolExhausted`, `Persistence`
    /// or `BootStaging`. Nothing is kept when an error is returned.
    pub fn create(&self, request: CreateRequest) -> Result<Reservation> {
        let mut state = self.write_state()?;
        let now = self.now();
        self.expire_locked(&mut state, now)?;

        check_name(&request.name)?;

        if state.store.contains_name(&request.name) {
            return Err(Error::NameConflict(request.name.to_string()));
        }

        let boot = request.boot.validate(self.config.use_cobbler)?;
        let selection = NodeSelection::resolve(&request.nodes, &self.config.nodes)?;

        if request.duration_minutes < 0 {
            return Err(Error::InvalidDuration(format!("{}m", request.duration_minutes)));
        }
        let duration_minutes = request.duration_minutes.max(self.config.slice_width / 60);
        let duration = self.duration_in_s(duration_minutes)?;

        if !self.config.is_privileged(&request.owner) {
            let limits = request.limits.unwrap_or(self.config.limits);
            limits.check_nodes(selection.node_count())?;
            limits.check_duration(duration_minutes)?;
        }

        let after = self.search_start(&state.schedule, request.earliest_start, now);
        let candidate = self.find(&state.schedule, &selection, duration, after)?;
        let vlan = self.config.vlans.allocate(&state.store, now)?;

        let next_id = state.store.next_id();
        let reservation = Reservation {
            id: state.store.peek_next_id(),
            name: request.name,
            owner: request.owner,
            start_time: candidate.window.start,
            end_time: candidate.window.end,
            vlan,
            hosts: self.config.nodes.names_of(&candidate.nodes),
            boot,
            kernel_args: request.kernel_args,
        };

        state.schedule.reserve(&candidate.nodes, candidate.window, reservation.id)?;
        if let Err(e) = state.store.insert(reservation.clone()) {
            state.schedule.release(reservation.id);
            return Err(e);
        }

        if let Err(e) = self.persist(&state) {
            log::error!("Failed to persist reservation '{}', rolling back: {}", reservation.name, e);
            undo_create(&mut state, reservation.id, next_id);
            return Err(e);
        }

        if let Err(e) = self.boot_stager.stage(&reservation) {
            log::error!("Failed to stage boot files for reservation '{}', rolling back: {}", reservation.name, e);
            undo_create(&mut state, reservation.id, next_id);
            if let Err(persist_error) = self.persist(&state) {
                log::error!("Failed to persist rollback of reservation '{}': {}", reservation.name, persist_error);
            }
            return Err(e);
        }

        self.audit(now, AuditAction::Created, &reservation);
        log::info!(
            "Reservation '{}' ({}) created for '{}': {} nodes in [{}, {}) on vlan {}.",
            reservation.name,
            reservation.id,
            reservation.owner,
            reservation.hosts.len(),
            reservation.start_time,
            reservation.end_time,
            reservation.vlan
        );

        Ok(reservation)
    }

    /// Reports the windows `count` creations of the same shape would get if
    /// their searches started `speculative_increment` apart. Nothing is
    /// reserved.
    ///
    /// Stops at the first search that fails and returns the windows found up
    /// to there. Fails only if the very first search fails.
    pub fn preview(&self, duration_minutes: i64, nodes: &NodeSpec, earliest_start: Option<i64>, count: usize) -> Result<Vec<Window>> {
        if count == 0 {
            return Err(Error::InvalidRequest("preview count must be at least 1".to_string()));
        }

        if duration_minutes < 0 {
            return Err(Error::InvalidDuration(format!("{}m", duration_minutes)));
        }

        let duration = self.duration_in_s(duration_minutes)?;
        let selection = NodeSelection::resolve(nodes, &self.config.nodes)?;

        let state = self.read_state()?;
        let now = self.now();
        let base = self.search_start(&state.schedule, earliest_start, now);
        let mut windows = Vec::with_capacity(count);

        for iteration in 0..count {
            let after = base + iteration as i64 * self.config.speculative_increment;

            match self.find(&state.schedule, &selection, duration, after) {
                Ok(candidate) => windows.push(candidate.window),
                Err(e) if windows.is_empty() => return Err(e),
                Err(e) => {
                    log::debug!("Preview stopped after {} windows: {}", windows.len(), e);
                    break;
                }
            }
        }

        Ok(windows)
    }

    /// `preview` with the configured number of iterations.
    pub fn speculate(&self, duration_minutes: i64, nodes: &NodeSpec, earliest_start: Option<i64>) -> Result<Vec<Window>> {
        self.preview(duration_minutes, nodes, earliest_start, self.config.speculative_count)
    }

    pub fn cancel(&self, id: ReservationId, caller: &UserName) -> Result<Reservation> {
        let mut state = self.write_state()?;
        let now = self.now();
        self.expire_locked(&mut state, now)?;

        self.cancel_locked(&mut state, id, caller, now)
    }

    pub fn cancel_by_name(&self, name: &ReservationName, caller: &UserName) -> Result<Reservation> {
        let mut state = self.write_state()?;
        let now = self.now();
        self.expire_locked(&mut state, now)?;

        let id = state.store.get_by_name(name).map(|r| r.id).ok_or_else(|| Error::ReservationNotFound(name.to_string()))?;
        self.cancel_locked(&mut state, id, caller, now)
    }

    fn cancel_locked(&self, state: &mut SchedulerState, id: ReservationId, caller: &UserName, now: i64) -> Result<Reservation> {
        let reservation = state.store.get(id).cloned().ok_or_else(|| Error::ReservationNotFound(id.to_string()))?;
        self.check_permission(&reservation, caller)?;

        state.schedule.release(id);
        state.store.remove(id);

        if let Err(e) = self.persist(state) {
            log::error!("Failed to persist cancellation of '{}', restoring it: {}", reservation.name, e);
            self.reinstate(state, &reservation);
            return Err(e);
        }

        if let Err(e) = self.boot_stager.unstage(&reservation) {
            log::warn!("Failed to remove boot files of '{}': {}", reservation.name, e);
        }

        self.audit(now, AuditAction::Deleted, &reservation);
        log::info!("Reservation '{}' ({}) deleted by '{}'.", reservation.name, reservation.id, caller);

        Ok(reservation)
    }

    /// Puts a just removed reservation back into store and grid.
    fn reinstate(&self, state: &mut SchedulerState, reservation: &Reservation) {
        let start = reservation.start_time.max(state.schedule.first_start());

        if start < reservation.end_time {
            let restored = self
                .config
                .nodes
                .indices_of(&reservation.hosts)
                .and_then(|columns| state.schedule.reserve(&columns, Window::new(start, reservation.end_time), reservation.id));

            if let Err(e) = restored {
                log::error!("Failed to restore the cells of reservation '{}': {}", reservation.name, e);
            }
        }

        if let Err(e) = state.store.insert(reservation.clone()) {
            log::error!("Failed to restore reservation '{}': {}", reservation.name, e);
        }
    }

    /// Lengthens a reservation by `extra_minutes` (rounded up to whole
    /// slices) if all its nodes are free right after its current end.
    pub fn extend(&self, id: ReservationId, extra_minutes: i64, caller: &UserName) -> Result<Reservation> {
        if extra_minutes <= 0 {
            return Err(Error::InvalidDuration(format!("{}m", extra_minutes)));
        }
        let extra = self.duration_in_s(extra_minutes)?;

        let mut state = self.write_state()?;
        let now = self.now();
        self.expire_locked(&mut state, now)?;

        let reservation = state.store.get(id).cloned().ok_or_else(|| Error::ReservationNotFound(id.to_string()))?;
        self.check_permission(&reservation, caller)?;

        let width = state.schedule.slice_width();
        let old_end = reservation.end_time;
        let new_end = old_end + state.schedule.slices_for(extra) * width;

        if new_end - reservation.start_time > self.config.max_duration {
            return Err(Error::InvalidDuration(format!(
                "extending '{}' by {}m exceeds the maximum of {}m",
                reservation.name,
                extra_minutes,
                self.config.max_duration / 60
            )));
        }

        if !self.config.is_privileged(caller) {
            self.config.limits.check_duration((new_end - reservation.start_time) / 60)?;
        }

        let columns = self.config.nodes.indices_of(&reservation.hosts)?;
        if let Some(node) = columns.iter().find(|node| state.schedule.occupied(**node, old_end, new_end)) {
            log::info!(
                "Can't extend '{}': node {} is taken in [{}, {}).",
                reservation.name,
                self.config.nodes.name_of(*node).unwrap_or("?"),
                old_end,
                new_end
            );
            return Err(Error::NoCapacity);
        }

        state.schedule.reserve(&columns, Window::new(old_end, new_end), id)?;
        if let Some(stored) = state.store.get_mut(id) {
            stored.end_time = new_end;
        }

        if let Err(e) = self.persist(&state) {
            log::error!("Failed to persist extension of '{}', rolling back: {}", reservation.name, e);
            state.schedule.release_from(id, old_end);
            if let Some(stored) = state.store.get_mut(id) {
                stored.end_time = old_end;
            }
            return Err(e);
        }

        let extended = Reservation { end_time: new_end, ..reservation };

        self.audit(now, AuditAction::Extended, &extended);
        log::info!("Reservation '{}' ({}) extended until {}.", extended.name, extended.id, extended.end_time);

        Ok(extended)
    }

    /// Drops reservations that have ended and the slices behind "now".
    pub fn expire(&self) -> Result<Vec<Reservation>> {
        let mut state = self.write_state()?;
        let now = self.now();
        self.expire_locked(&mut state, now)
    }

    /// Works on a copy of the state and only swaps it in once the copy is
    /// saved, so a failed save leaves memory and disk as they were.
    fn expire_locked(&self, state: &mut SchedulerState, now: i64) -> Result<Vec<Reservation>> {
        let expired_ids = state.store.expired(now);
        if expired_ids.is_empty() && !state.schedule.has_elapsed_slices(now) {
            return Ok(Vec::new());
        }

        let mut next = state.clone();
        let mut expired = Vec::new();

        for id in expired_ids {
            next.schedule.release(id);
            if let Some(reservation) = next.store.remove(id) {
                expired.push(reservation);
            }
        }

        next.schedule.prune(now);

        if let Err(e) = self.persist(&next) {
            log::error!("Failed to persist expiry of {} reservations, keeping them for now: {}", expired.len(), e);
            return Err(e);
        }
        *state = next;

        for reservation in &expired {
            if let Err(e) = self.boot_stager.unstage(reservation) {
                log::warn!("Failed to remove boot files of expired reservation '{}': {}", reservation.name, e);
            }
            self.audit(now, AuditAction::Deleted, reservation);
            log::info!("Reservation '{}' ({}) expired.", reservation.name, reservation.id);
        }

        Ok(expired)
    }

    /// All reservations ordered by start time, then id.
    pub fn list(&self) -> Result<Vec<Reservation>> {
        Ok(self.read_state()?.store.list())
    }

    pub fn get(&self, id: ReservationId) -> Result<Option<Reservation>> {
        Ok(self.read_state()?.store.get(id).cloned())
    }

    pub fn get_by_name(&self, name: &ReservationName) -> Result<Option<Reservation>> {
        Ok(self.read_state()?.store.get_by_name(name).cloned())
    }

    /// Copy of the current grid.
    pub fn schedule(&self) -> Result<SlottedSchedule> {
        Ok(self.read_state()?.schedule.clone())
    }
}

fn undo_create(state: &mut SchedulerState, id: ReservationId, next_id: u64) {
    state.schedule.release(id);
    state.store.remove(id);
    state.store.rollback_next_id(next_id);
}
