use crate::domain::reservation::reservation_store::ReservationStore;
use crate::error::{Error, Result};

/// Hands out network isolation ids from the inclusive pool `[min, max]`.
///
/// The allocator keeps no state of its own: an id is taken exactly when an
/// active reservation in the store holds it. Callers must allocate and insert
/// the reservation under the same scheduler lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VlanAllocator {
    min: u32,
    max: u32,
}

impl VlanAllocator {
    pub fn new(min: u32, max: u32) -> Result<Self> {
        if min > max {
            return Err(Error::ConfigError(format!("vlan range [{}, {}] is empty", min, max)));
        }

        Ok(VlanAllocator { min, max })
    }

    pub fn min(&self) -> u32 {
        self.min
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    /// Returns the lowest id not held by any reservation that is still active at `now`.
    pub fn allocate(&self, store: &ReservationStore, now: i64) -> Result<u32> {
        let in_use = store.active_vlans(now);

        match (self.min..=self.max).find(|vlan| !in_use.contains(vlan)) {
            Some(vlan) => {
                log::debug!("Assigned vlan {} ({} of [{}, {}] in use).", vlan, in_use.len(), self.min, self.max);
                Ok(vlan)
            }
            None => {
                log::warn!("Vlan pool [{}, {}] is exhausted.", self.min, self.max);
                Err(Error::PoolExhausted { min: self.min, max: self.max })
            }
        }
    }
}
