use std::collections::VecDeque;

use crate::domain::reservation::reservation::{ReservationId, Window};
use crate::domain::schedule::time_slice::TimeSlice;
use crate::error::{Error, Result};

/// Node x time occupancy grid.
///
/// Slices are contiguous and strictly increasing in start time. The front is
/// pruned as time passes and the back grows on demand, so the schedule always
/// covers "now" up to the furthest window anyone has reserved. Cells outside
/// the retained slices are free.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlottedSchedule {
    /// The duration of a single time slice in s.
    slice_width: i64,

    /// Number of grid columns, one per cluster node.
    num_nodes: usize,

    slices: VecDeque<TimeSlice>,
}

impl SlottedSchedule {
    pub fn new(num_nodes: usize, slice_width: i64, now: i64) -> Self {
        let mut schedule = SlottedSchedule { slice_width, num_nodes, slices: VecDeque::new() };
        schedule.slices.push_back(TimeSlice::new(schedule.align_down(now), num_nodes));
        schedule
    }

    /// Rebuilds a schedule from persisted slices, checking that they still
    /// form a contiguous grid with the configured width and node count.
    pub fn from_slices(num_nodes: usize, slice_width: i64, now: i64, slices: Vec<TimeSlice>) -> Result<Self> {
        if slices.is_empty() {
            return Ok(SlottedSchedule::new(num_nodes, slice_width, now));
        }

        let mut previous: Option<i64> = None;
        for slice in &slices {
            if slice.start.rem_euclid(slice_width) != 0 {
                return Err(Error::Persistence(format!("slice start {} is not aligned to width {}", slice.start, slice_width)));
            }
            if slice.nodes.len() != num_nodes {
                return Err(Error::Persistence(format!(
                    "slice starting at {} has {} node columns, cluster has {}",
                    slice.start,
                    slice.nodes.len(),
                    num_nodes
                )));
            }
            if let Some(previous_start) = previous {
                if slice.start != previous_start + slice_width {
                    return Err(Error::Persistence(format!("gap in schedule between {} and {}", previous_start, slice.start)));
                }
            }
            previous = Some(slice.start);
        }

        Ok(SlottedSchedule { slice_width, num_nodes, slices: slices.into() })
    }

    pub fn slice_width(&self) -> i64 {
        self.slice_width
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    pub fn slices(&self) -> impl Iterator<Item = &TimeSlice> {
        self.slices.iter()
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    /// Start of the earliest retained slice.
    pub fn first_start(&self) -> i64 {
        self.slices.front().map(|slice| slice.start).unwrap_or(0)
    }

    /// End of the latest retained slice (exclusive).
    pub fn horizon_end(&self) -> i64 {
        self.slices.back().map(|slice| slice.start + self.slice_width).unwrap_or(0)
    }

    pub fn align_down(&self, time: i64) -> i64 {
        time.div_euclid(self.slice_width) * self.slice_width
    }

    pub fn align_up(&self, time: i64) -> i64 {
        self.align_down(time.saturating_add(self.slice_width - 1))
    }

    /// Number of slices needed to cover `duration` seconds, at least one.
    pub fn slices_for(&self, duration: i64) -> i64 {
        let slices = duration.saturating_add(self.slice_width - 1).div_euclid(self.slice_width);
        slices.max(1)
    }

    /// Position of the slice containing `time`, if that slice is retained.
    fn slice_index(&self, time: i64) -> Option<usize> {
        if time < self.first_start() || time >= self.horizon_end() {
            return None;
        }

        Some(((time - self.first_start()) / self.slice_width) as usize)
    }

    pub fn occupant(&self, node: usize, time: i64) -> Option<ReservationId> {
        let index = self.slice_index(time)?;
        self.slices.get(index)?.occupant(node)
    }

    /// Retained slices overlapping `[from, to)`.
    fn slices_in(&self, from: i64, to: i64) -> impl Iterator<Item = &TimeSlice> {
        let first = self.first_start();
        let width = self.slice_width;
        let skip = if from <= first { 0 } else { ((from - first) / width) as usize };

        self.slices.iter().skip(skip).take_while(move |slice| slice.start < to).filter(move |slice| slice.start + width > from)
    }

    /// True if any slice in `[from, to)` assigns `node` to a reservation.
    pub fn occupied(&self, node: usize, from: i64, to: i64) -> bool {
        self.slices_in(from, to).any(|slice| !slice.is_free(node))
    }

    /// Filters `candidates` down to the nodes free for the whole of `[from, to)`,
    /// keeping their order and stopping after `limit` hits.
    pub fn free_nodes(&self, candidates: &[usize], from: i64, to: i64, limit: usize) -> Vec<usize> {
        let mut free = Vec::new();

        for node in candidates {
            if free.len() >= limit {
                break;
            }
            if !self.occupied(*node, from, to) {
                free.push(*node);
            }
        }

        free
    }

    /// Appends free slices until the schedule covers `end`.
    pub fn extend_to(&mut self, end: i64) {
        while self.horizon_end() < end {
            let start = self.horizon_end();
            self.slices.push_back(TimeSlice::new(start, self.num_nodes));
        }
    }

    /// Marks every cell of `nodes` in `window` as held by `id`.
    ///
    /// Nothing is written unless every targeted cell is free or already held
    /// by `id`.
    pub fn reserve(&mut self, nodes: &[usize], window: Window, id: ReservationId) -> Result<()> {
        if window.start.rem_euclid(self.slice_width) != 0 || window.end.rem_euclid(self.slice_width) != 0 || window.end <= window.start {
            return Err(Error::InvalidRequest(format!("window [{}, {}) is not slice aligned", window.start, window.end)));
        }

        if window.start < self.first_start() {
            return Err(Error::InvalidRequest(format!("window starts at {}, before the schedule start {}", window.start, self.first_start())));
        }

        if let Some(node) = nodes.iter().find(|node| **node >= self.num_nodes) {
            return Err(Error::InvalidRequest(format!("node column {} is outside the cluster", node)));
        }

        for node in nodes {
            for slice in self.slices_in(window.start, window.end) {
                if let Some(occupant) = slice.occupant(*node) {
                    if occupant != id {
                        return Err(Error::SlotConflict { node: *node, occupant, time: slice.start });
                    }
                }
            }
        }

        self.extend_to(window.end);

        let first = self.first_start();
        let from = ((window.start - first) / self.slice_width) as usize;
        let to = ((window.end - first) / self.slice_width) as usize;

        for slice in self.slices.range_mut(from..to) {
            for node in nodes {
                slice.insert_reservation(*node, id);
            }
        }

        log::debug!("Reserved nodes {:?} for reservation {} in [{}, {}).", nodes, id, window.start, window.end);
        Ok(())
    }

    /// Frees every cell referencing `id` and returns how many were freed.
    pub fn release(&mut self, id: ReservationId) -> usize {
        let freed: usize = self.slices.iter_mut().map(|slice| slice.release(id)).sum();
        log::debug!("Released {} cells of reservation {}.", freed, id);
        freed
    }

    /// Frees the cells of `id` from `from` onwards only.
    pub fn release_from(&mut self, id: ReservationId, from: i64) -> usize {
        let width = self.slice_width;
        self.slices.iter_mut().filter(|slice| slice.start + width > from).map(|slice| slice.release(id)).sum()
    }

    /// True if `prune(now)` would drop at least one slice.
    pub fn has_elapsed_slices(&self, now: i64) -> bool {
        self.slices.front().is_some_and(|front| front.start + self.slice_width <= now)
    }

    /// Drops slices that ended at or before `now`. The slice containing `now`
    /// is always kept.
    ///
    /// # Returns
    /// The number of dropped slices.
    pub fn prune(&mut self, now: i64) -> usize {
        let mut dropped = 0;

        while let Some(front) = self.slices.front() {
            if front.start + self.slice_width > now {
                break;
            }
            self.slices.pop_front();
            dropped += 1;
        }

        if self.slices.is_empty() {
            let start = self.align_down(now);
            self.slices.push_back(TimeSlice::new(start, self.num_nodes));
        }

        if dropped > 0 {
            log::debug!("Pruned {} expired slices, schedule now starts at {}.", dropped, self.first_start());
        }

        dropped
    }

    /// All slices as a plain vector for persistence.
    pub fn to_slices(&self) -> Vec<TimeSlice> {
        self.slices.iter().cloned().collect()
    }
}
