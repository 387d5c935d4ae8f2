use crate::domain::reservation::reservation::Window;
use crate::domain::schedule::slotted_schedule::SlottedSchedule;
use crate::error::{Error, Result};

/// Nodes and window proposed by a search. Nothing is reserved yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Grid columns, ascending.
    pub nodes: Vec<usize>,
    pub window: Window,
}

/// Read-only earliest-fit search over a `SlottedSchedule`.
///
/// Candidate start times are slice aligned, begin at `after` (rounded up,
/// never before the first retained slice) and advance one slice at a time
/// until `lookahead` seconds past the first candidate. The first start time
/// that satisfies the request wins; ties between nodes go to the lowest id.
/// No randomness is involved, so the same schedule always yields the same
/// candidate.
#[derive(Debug, Clone, Copy)]
pub struct SlotFinder<'a> {
    schedule: &'a SlottedSchedule,
    lookahead: i64,
}

impl<'a> SlotFinder<'a> {
    pub fn new(schedule: &'a SlottedSchedule, lookahead: i64) -> Self {
        SlotFinder { schedule, lookahead }
    }

    /// Finds the earliest window of `duration` seconds in which `node_count`
    /// nodes of the whole cluster are free.
    pub fn find_after(&self, duration: i64, node_count: usize, after: i64) -> Result<Candidate> {
        if node_count == 0 {
            return Err(Error::InvalidRequest("node count must be at least 1".to_string()));
        }

        if node_count > self.schedule.num_nodes() {
            log::info!("Requested {} nodes, but the cluster only has {}.", node_count, self.schedule.num_nodes());
            return Err(Error::NoCapacity);
        }

        let all_nodes: Vec<usize> = (0..self.schedule.num_nodes()).collect();

        self.scan(duration, after, |window| {
            let free = self.schedule.free_nodes(&all_nodes, window.start, window.end, node_count);
            if free.len() >= node_count { Some(free) } else { None }
        })
    }

    /// Like `find_after`, but only `candidates` are considered.
    ///
    /// With `require_all` every candidate has to be free at once. Otherwise
    /// the `max(min_nodes, 1)` lowest free candidates are taken.
    pub fn find_generic(&self, duration: i64, min_nodes: usize, candidates: &[usize], require_all: bool, after: i64) -> Result<Candidate> {
        let mut candidates: Vec<usize> = candidates.to_vec();
        candidates.sort_unstable();
        candidates.dedup();

        if candidates.is_empty() {
            return Err(Error::InvalidRequest("no candidate nodes given".to_string()));
        }

        if let Some(node) = candidates.iter().find(|node| **node >= self.schedule.num_nodes()) {
            return Err(Error::InvalidRequest(format!("node column {} is outside the cluster", node)));
        }

        let needed = if require_all { candidates.len() } else { min_nodes.max(1) };

        if needed > candidates.len() {
            log::info!("Requested {} nodes out of a candidate set of {}.", needed, candidates.len());
            return Err(Error::NoCapacity);
        }

        self.scan(duration, after, |window| {
            let free = self.schedule.free_nodes(&candidates, window.start, window.end, needed);
            if free.len() >= needed { Some(free) } else { None }
        })
    }

    fn scan<F>(&self, duration: i64, after: i64, mut pick: F) -> Result<Candidate>
    where
        F: FnMut(Window) -> Option<Vec<usize>>,
    {
        let width = self.schedule.slice_width();
        let length = self.schedule.slices_for(duration) * width;

        let first_candidate = self.schedule.align_up(after).max(self.schedule.first_start());
        let last_candidate = first_candidate + self.lookahead;

        let mut start = first_candidate;
        while start <= last_candidate {
            let window = Window::new(start, start + length);

            if let Some(nodes) = pick(window) {
                log::debug!("Found nodes {:?} free for [{}, {}).", nodes, window.start, window.end);
                return Ok(Candidate { nodes, window });
            }

            start += width;
        }

        log::info!("No window of {}s found between {} and {}.", length, first_candidate, last_candidate);
        Err(Error::NoCapacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::reservation::reservation::ReservationId;

    const WIDTH: i64 = 60;
    const HOUR: i64 = 3600;
    const NOW: i64 = 36_000;
    const LOOKAHEAD: i64 = 24 * HOUR;

    fn schedule() -> SlottedSchedule {
        SlottedSchedule::new(4, WIDTH, NOW)
    }

    #[test]
    fn test_find_after_takes_lowest_nodes() {
        let schedule = schedule();
        let finder = SlotFinder::new(&schedule, LOOKAHEAD);

        let candidate = finder.find_after(HOUR, 2, NOW).unwrap();

        assert_eq!(candidate.nodes, vec![0, 1]);
        assert_eq!(candidate.window, Window::new(NOW, NOW + HOUR));
    }

    #[test]
    fn test_short_duration_is_one_slice() {
        let schedule = schedule();
        let finder = SlotFinder::new(&schedule, LOOKAHEAD);

        let candidate = finder.find_after(5, 1, NOW).unwrap();
        assert_eq!(candidate.window.duration(), WIDTH);

        let candidate = finder.find_after(0, 1, NOW).unwrap();
        assert_eq!(candidate.window.duration(), WIDTH);
    }

    #[test]
    fn test_duration_rounds_up_to_slices() {
        let schedule = schedule();
        let finder = SlotFinder::new(&schedule, LOOKAHEAD);

        let candidate = finder.find_after(WIDTH + 1, 1, NOW).unwrap();
        assert_eq!(candidate.window.duration(), 2 * WIDTH);
    }

    #[test]
    fn test_start_rounds_up_to_slice_boundary() {
        let schedule = schedule();
        let finder = SlotFinder::new(&schedule, LOOKAHEAD);

        let candidate = finder.find_after(HOUR, 1, NOW + 10).unwrap();
        assert_eq!(candidate.window.start, NOW + WIDTH);

        // never before the retained schedule
        let candidate = finder.find_after(HOUR, 1, NOW - 10 * WIDTH).unwrap();
        assert_eq!(candidate.window.start, NOW);
    }

    #[test]
    fn test_too_many_nodes_is_no_capacity() {
        let schedule = schedule();
        let finder = SlotFinder::new(&schedule, LOOKAHEAD);

        assert!(matches!(finder.find_after(HOUR, 5, NOW), Err(Error::NoCapacity)));
        assert!(matches!(finder.find_after(HOUR, 0, NOW), Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn test_find_after_waits_for_capacity() {
        let mut schedule = schedule();
        schedule.reserve(&[0, 1], Window::new(NOW, NOW + 2 * HOUR), ReservationId(1)).unwrap();
        let finder = SlotFinder::new(&schedule, LOOKAHEAD);

        let candidate = finder.find_after(HOUR, 3, NOW).unwrap();

        assert_eq!(candidate.window, Window::new(NOW + 2 * HOUR, NOW + 3 * HOUR));
        assert_eq!(candidate.nodes, vec![0, 1, 2]);

        let candidate = finder.find_after(HOUR, 2, NOW).unwrap();
        assert_eq!(candidate.window.start, NOW);
        assert_eq!(candidate.nodes, vec![2, 3]);
    }

    #[test]
    fn test_lookahead_bounds_the_search() {
        let mut schedule = schedule();
        schedule.reserve(&[0, 1, 2, 3], Window::new(NOW, NOW + 2 * HOUR), ReservationId(1)).unwrap();
        let finder = SlotFinder::new(&schedule, HOUR);

        assert!(matches!(finder.find_after(HOUR, 1, NOW), Err(Error::NoCapacity)));
    }

    #[test]
    fn test_search_is_deterministic() {
        let mut schedule = schedule();
        schedule.reserve(&[1], Window::new(NOW, NOW + HOUR), ReservationId(1)).unwrap();
        schedule.reserve(&[2], Window::new(NOW + HOUR, NOW + 2 * HOUR), ReservationId(2)).unwrap();
        let finder = SlotFinder::new(&schedule, LOOKAHEAD);

        let first = finder.find_after(90 * 60, 3, NOW).unwrap();
        let generic = finder.find_generic(90 * 60, 2, &[1, 2, 3], false, NOW).unwrap();

        for _ in 0..5 {
            assert_eq!(finder.find_after(90 * 60, 3, NOW).unwrap(), first);
            assert_eq!(finder.find_generic(90 * 60, 2, &[1, 2, 3], false, NOW).unwrap(), generic);
        }
    }

    #[test]
    fn test_find_generic_require_all_fails_on_one_busy_node() {
        let mut schedule = schedule();
        schedule.reserve(&[2], Window::new(NOW, NOW + 48 * HOUR), ReservationId(1)).unwrap();
        let finder = SlotFinder::new(&schedule, LOOKAHEAD);

        let result = finder.find_generic(HOUR, 0, &[1, 2, 3], true, NOW);
        assert!(matches!(result, Err(Error::NoCapacity)));

        let candidate = finder.find_generic(HOUR, 2, &[1, 2, 3], false, NOW).unwrap();
        assert_eq!(candidate.nodes, vec![1, 3]);
        assert_eq!(candidate.window.start, NOW);
    }

    #[test]
    fn test_find_generic_require_all_waits_for_whole_set() {
        let mut schedule = schedule();
        schedule.reserve(&[2], Window::new(NOW, NOW + HOUR), ReservationId(1)).unwrap();
        let finder = SlotFinder::new(&schedule, LOOKAHEAD);

        let candidate = finder.find_generic(HOUR, 0, &[3, 2, 1], true, NOW).unwrap();

        assert_eq!(candidate.nodes, vec![1, 2, 3]);
        assert_eq!(candidate.window.start, NOW + HOUR);
    }

    #[test]
    fn test_find_generic_subset_larger_than_candidates() {
        let schedule = schedule();
        let finder = SlotFinder::new(&schedule, LOOKAHEAD);

        assert!(matches!(finder.find_generic(HOUR, 3, &[0, 1], false, NOW), Err(Error::NoCapacity)));
        assert!(matches!(finder.find_generic(HOUR, 1, &[], false, NOW), Err(Error::InvalidRequest(_))));
        assert!(matches!(finder.find_generic(HOUR, 1, &[7], true, NOW), Err(Error::InvalidRequest(_))));
    }
}
