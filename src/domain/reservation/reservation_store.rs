use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::domain::reservation::reservation::{Reservation, ReservationId};
use crate::domain::utils::id::ReservationName;
use crate::error::{Error, Result};

/// The allocation ledger: every accepted reservation keyed by id, plus a
/// name index so names stay unique.
///
/// The store is not synchronised on its own. It lives inside the scheduler
/// state and is only touched under the scheduler lock.
#[derive(Debug, Clone)]
pub struct ReservationStore {
    /// Id handed to the next accepted reservation. Never decreases except
    /// when a failed commit is rolled back.
    next_id: u64,

    reservations: BTreeMap<ReservationId, Reservation>,

    /// Index lookup ReservationId using reservation name.
    name_index: HashMap<ReservationName, ReservationId>,
}

impl ReservationStore {
    pub fn new() -> Self {
        Self { next_id: 1, reservations: BTreeMap::new(), name_index: HashMap::new() }
    }

    /// Rebuilds a store from persisted parts.
    pub fn from_parts(next_id: u64, reservations: Vec<Reservation>) -> Result<Self> {
        let mut store = ReservationStore::new();

        for reservation in reservations {
            store.insert(reservation).map_err(|e| Error::Persistence(format!("persisted reservations are inconsistent: {}", e)))?;
        }

        store.next_id = store.next_id.max(next_id);
        Ok(store)
    }

    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// The id the next insert is expected to use.
    pub fn peek_next_id(&self) -> ReservationId {
        ReservationId(self.next_id)
    }

    /// Restores the id counter captured before a commit that later failed.
    pub fn rollback_next_id(&mut self, next_id: u64) {
        self.next_id = next_id;
    }

    /// Adds a reservation to the store.
    ///
    /// # Returns
    /// `Error::NameConflict` if the name or the id is already taken.
    pub fn insert(&mut self, reservation: Reservation) -> Result<()> {
        if self.name_index.contains_key(&reservation.name) || self.reservations.contains_key(&reservation.id) {
            return Err(Error::NameConflict(reservation.name.to_string()));
        }

        self.next_id = self.next_id.max(reservation.id.0 + 1);
        self.name_index.insert(reservation.name.clone(), reservation.id);
        self.reservations.insert(reservation.id, reservation);

        Ok(())
    }

    pub fn remove(&mut self, id: ReservationId) -> Option<Reservation> {
        let reservation = self.reservations.remove(&id)?;
        self.name_index.remove(&reservation.name);
        Some(reservation)
    }

    pub fn get(&self, id: ReservationId) -> Option<&Reservation> {
        self.reservations.get(&id)
    }

    pub fn get_mut(&mut self, id: ReservationId) -> Option<&mut Reservation> {
        self.reservations.get_mut(&id)
    }

    pub fn get_by_name(&self, name: &ReservationName) -> Option<&Reservation> {
        let id = self.name_index.get(name)?;
        self.reservations.get(id)
    }

    pub fn contains_name(&self, name: &ReservationName) -> bool {
        self.name_index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.reservations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reservations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reservation> {
        self.reservations.values()
    }

    /// All reservations ordered by start time, ties broken by id.
    pub fn list(&self) -> Vec<Reservation> {
        let mut list: Vec<Reservation> = self.reservations.values().cloned().collect();
        list.sort_by_key(|r| (r.start_time, r.id));
        list
    }

    /// Vlans held by reservations that have not ended yet.
    pub fn active_vlans(&self, now: i64) -> BTreeSet<u32> {
        self.reservations.values().filter(|r| r.is_active(now)).map(|r| r.vlan).collect()
    }

    /// Ids of reservations whose window has fully elapsed.
    pub fn expired(&self, now: i64) -> Vec<ReservationId> {
        self.reservations.values().filter(|r| !r.is_active(now)).map(|r| r.id).collect()
    }
}

impl Default for ReservationStore {
    fn default() -> Self {
        ReservationStore::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::reservation::reservation::BootSpec;
    use crate::domain::utils::id::UserName;

    fn reservation(id: u64, name: &str, start: i64, end: i64, vlan: u32) -> Reservation {
        Reservation {
            id: ReservationId(id),
            name: ReservationName::new(name),
            owner: UserName::new("alice"),
            start_time: start,
            end_time: end,
            vlan,
            hosts: vec!["host1".to_string()],
            boot: BootSpec::Profile { name: "default".to_string() },
            kernel_args: String::new(),
        }
    }

    #[test]
    fn test_insert_and_lookup_by_name() {
        let mut store = ReservationStore::new();
        store.insert(reservation(1, "alpha", 0, 60, 100)).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get_by_name(&ReservationName::new("alpha")).map(|r| r.id), Some(ReservationId(1)));
        assert_eq!(store.peek_next_id(), ReservationId(2));
    }

    #[test]
    fn test_default_store_starts_at_id_one() {
        assert_eq!(ReservationStore::default().peek_next_id(), ReservationId(1));
    }

    #[test]
    fn test_duplicate_name_is_rejected() {
        let mut store = ReservationStore::new();
        store.insert(reservation(1, "alpha", 0, 60, 100)).unwrap();

        let result = store.insert(reservation(2, "alpha", 60, 120, 101));
        assert!(matches!(result, Err(Error::NameConflict(name)) if name == "alpha"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_remove_frees_name() {
        let mut store = ReservationStore::new();
        store.insert(reservation(1, "alpha", 0, 60, 100)).unwrap();

        assert!(store.remove(ReservationId(1)).is_some());
        assert!(!store.contains_name(&ReservationName::new("alpha")));
        assert!(store.remove(ReservationId(1)).is_none());

        // ids keep counting up after removal
        assert_eq!(store.peek_next_id(), ReservationId(2));
    }

    #[test]
    fn test_active_vlans_and_expired() {
        let mut store = ReservationStore::new();
        store.insert(reservation(1, "old", 0, 60, 100)).unwrap();
        store.insert(reservation(2, "new", 60, 120, 101)).unwrap();

        assert_eq!(store.active_vlans(60), BTreeSet::from([101]));
        assert_eq!(store.expired(60), vec![ReservationId(1)]);
    }

    #[test]
    fn test_list_is_ordered_by_start() {
        let mut store = ReservationStore::new();
        store.insert(reservation(1, "late", 120, 180, 100)).unwrap();
        store.insert(reservation(2, "early", 0, 60, 101)).unwrap();

        let names: Vec<String> = store.list().into_iter().map(|r| r.name.to_string()).collect();
        assert_eq!(names, vec!["early", "late"]);
    }

    #[test]
    fn test_from_parts_keeps_counter() {
        let store = ReservationStore::from_parts(10, vec![reservation(3, "alpha", 0, 60, 100)]).unwrap();
        assert_eq!(store.peek_next_id(), ReservationId(10));

        let duplicate = ReservationStore::from_parts(1, vec![reservation(1, "a", 0, 60, 100), reservation(2, "a", 0, 60, 101)]);
        assert!(matches!(duplicate, Err(Error::Persistence(_))));
    }
}
