use serde::{Deserialize, Serialize};

use crate::domain::reservation::reservation::ReservationId;

/// One fixed-width column of the schedule: for every node the reservation
/// occupying it during `[start, start + slice_width)`, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlice {
    /// Absolute start of the slice in unix seconds.
    pub start: i64,

    /// Occupant per grid column (node).
    pub nodes: Vec<Option<ReservationId>>,
}

impl TimeSlice {
    pub fn new(start: i64, num_nodes: usize) -> Self {
        TimeSlice { start, nodes: vec![None; num_nodes] }
    }

    pub fn occupant(&self, node: usize) -> Option<ReservationId> {
        self.nodes.get(node).copied().flatten()
    }

    pub fn is_free(&self, node: usize) -> bool {
        self.occupant(node).is_none()
    }

    /// Assigns `node` to reservation `id`.
    ///
    /// # Returns
    /// `true` if the cell was free (or already held by `id`), `false` if it
    /// belongs to another reservation or the node is unknown.
    pub fn insert_reservation(&mut self, node: usize, id: ReservationId) -> bool {
        match self.nodes.get_mut(node) {
            Some(cell) => match *cell {
                Some(occupant) if occupant != id => {
                    log::error!(
                        "Slice starting at {}: node {} is held by reservation {}, can't assign it to reservation {}.",
                        self.start,
                        node,
                        occupant,
                        id
                    );
                    false
                }
                _ => {
                    *cell = Some(id);
                    true
                }
            },
            None => {
                log::error!("Slice starting at {} has no node column {}.", self.start, node);
                false
            }
        }
    }

    /// Frees every cell held by `id` and returns how many were freed.
    pub fn release(&mut self, id: ReservationId) -> usize {
        let mut freed = 0;

        for cell in self.nodes.iter_mut() {
            if *cell == Some(id) {
                *cell = None;
                freed += 1;
            }
        }

        freed
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.iter().all(|cell| cell.is_none())
    }
}
