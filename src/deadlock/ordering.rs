//! Ordering-based deadlock prevention.

use std::hash::Hash;

use itertools::Itertools;
use log::warn;
use parking_lot::Mutex;

use super::{holds::ThreadHolds, DeadlockPreventorTraits, PossibleDeadlockError};

/// Deadlock preventor based on consistent lock-acquisition ordering.
///
/// Before a worker may block on a lock, its prospective acquisition order is
/// compared against every other worker registered on the same resource. Two
/// workers acquiring a shared set of resources in inconsistent relative order
/// are the classic two-party deadlock; the later acquisition is rejected with
/// [`PossibleDeadlockError`] before it blocks.
///
/// The check is a heuristic. Cycles spanning three or more workers with no
/// pairwise order inconsistency are not detected.
#[derive(Debug)]
pub struct OrderingDeadlockPreventor<ID> {
    section: Mutex<()>,
    holds: ThreadHolds<ID>,
}

impl<ID> OrderingDeadlockPreventor<ID> {
    /// Create a new ordering deadlock preventor.
    #[must_use]
    pub fn new() -> Self {
        Self {
            section: Mutex::default(),
            holds: ThreadHolds::default(),
        }
    }
}

impl<ID> Default for OrderingDeadlockPreventor<ID> {
    fn default() -> Self {
        Self::new()
    }
}

impl<ID: Clone + Eq + Hash> OrderingDeadlockPreventor<ID> {
    /// Whether the current worker may acquire `id` without risking a
    /// two-party ordering deadlock. Runs under [`Self::section`].
    fn can_lock(&self, id: &ID) -> bool {
        let other_holds = self.holds.held_by_others(id);
        if other_holds.is_empty() {
            return true;
        }

        // A worker holding nothing cannot participate in an ordering
        // violation.
        let Some(held) = self.holds.held_by(std::thread::current().id()) else {
            return true;
        };
        if held.is_empty() {
            return true;
        }

        let mut candidate = held;
        candidate.push(id.clone());

        other_holds
            .iter()
            .filter(|other| other.len() > 1)
            .all(|other| consistent_order(other, &candidate))
    }
}

impl<ID> DeadlockPreventorTraits<ID> for OrderingDeadlockPreventor<ID>
where
    ID: Clone + Eq + Hash + core::fmt::Debug + Send + Sync,
{
    fn register_lock(
        &self,
        id: Option<&ID>,
        acquire: &mut dyn FnMut() -> bool,
    ) -> Result<bool, PossibleDeadlockError> {
        if let Some(id) = id {
            let _section = self.section.lock();
            if !self.can_lock(id) {
                warn!("possible deadlock, rejecting the lock registration");
                return Err(PossibleDeadlockError);
            }
            self.holds.record_hold(id);
        }
        Ok(acquire())
    }

    fn deregister_lock(&self, id: Option<&ID>, release: &mut dyn FnMut()) {
        if let Some(id) = id {
            self.holds.release_hold(id);
        }
        release();
    }
}

/// Whether the resources common to both sequences appear in a consistent
/// relative order: walked in `first`'s order, the first-occurrence position
/// of each common resource must be non-decreasing in both sequences.
fn consistent_order<ID: Eq + Hash>(first: &[ID], second: &[ID]) -> bool {
    let common = first.iter().filter(|&id| second.contains(id)).unique();

    let mut first_previous = 0;
    let mut second_previous = 0;
    for id in common {
        let first_position = first.iter().position(|held| held == id);
        let second_position = second.iter().position(|held| held == id);
        match (first_position, second_position) {
            (Some(first_position), Some(second_position))
                if first_position >= first_previous && second_position >= second_previous =>
            {
                first_previous = first_position;
                second_previous = second_position;
            }
            _ => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn consistent_order_accepts_matching_sequences() {
        assert!(consistent_order::<u64>(&[], &[]));
        assert!(consistent_order(&[1], &[1]));
        assert!(consistent_order(&[1, 2, 3], &[1, 2, 3]));
        assert!(consistent_order(&[1, 2], &[1, 5, 2]));
        assert!(consistent_order(&[1, 2], &[3, 4]));
    }

    #[test]
    fn consistent_order_rejects_inverted_sequences() {
        assert!(!consistent_order(&[1, 2], &[2, 1]));
        assert!(!consistent_order(&[1, 2, 3], &[1, 3, 2]));
        assert!(!consistent_order(&[5, 1, 2], &[2, 8, 1]));
    }

    /// Registers `ids` in order from a separate worker, leaving its holds in
    /// place.
    fn register_from_another_worker(preventor: &Arc<OrderingDeadlockPreventor<u64>>, ids: &[u64]) {
        let preventor = preventor.clone();
        let ids = ids.to_vec();
        std::thread::spawn(move || {
            for id in &ids {
                assert!(preventor.register_lock(Some(id), &mut || true).unwrap());
            }
        })
        .join()
        .unwrap();
    }

    #[test]
    fn rejects_an_acquisition_order_inverted_against_another_worker() {
        let preventor = Arc::new(OrderingDeadlockPreventor::new());
        register_from_another_worker(&preventor, &[1, 2]);

        assert!(preventor.register_lock(Some(&2), &mut || true).unwrap());
        assert!(preventor.register_lock(Some(&1), &mut || true).is_err());
    }

    #[test]
    fn approves_an_acquisition_order_matching_another_worker() {
        let preventor = Arc::new(OrderingDeadlockPreventor::new());
        register_from_another_worker(&preventor, &[1, 2]);

        assert!(preventor.register_lock(Some(&1), &mut || true).unwrap());
        assert!(preventor.register_lock(Some(&2), &mut || true).unwrap());
    }

    #[test]
    fn a_worker_holding_nothing_is_always_approved() {
        let preventor = Arc::new(OrderingDeadlockPreventor::new());
        register_from_another_worker(&preventor, &[1, 2]);

        // 2 before 1 inverts the other worker's order, but the current worker
        // holds nothing yet.
        assert!(preventor.register_lock(Some(&2), &mut || true).unwrap());
    }

    #[test]
    fn a_rejected_registration_records_no_hold() {
        let preventor = Arc::new(OrderingDeadlockPreventor::new());
        register_from_another_worker(&preventor, &[1, 2]);

        assert!(preventor.register_lock(Some(&2), &mut || true).unwrap());
        assert!(preventor.register_lock(Some(&1), &mut || true).is_err());

        // The rejected hold on 1 was not recorded, so releasing 2 leaves the
        // current worker empty-handed and free to start over in order.
        preventor.deregister_lock(Some(&2), &mut || {});
        assert!(preventor.register_lock(Some(&1), &mut || true).unwrap());
        assert!(preventor.register_lock(Some(&2), &mut || true).unwrap());
    }

    #[test]
    fn an_unregistered_id_skips_the_check_and_the_bookkeeping() {
        let preventor = Arc::new(OrderingDeadlockPreventor::new());
        register_from_another_worker(&preventor, &[1, 2]);

        assert!(preventor.register_lock(Some(&2), &mut || true).unwrap());
        // An id of None is exempt even though 2 then 1 is inverted.
        assert!(preventor.register_lock(None, &mut || true).unwrap());
    }

    #[test]
    fn deregistering_an_unknown_id_still_releases_once() {
        let preventor: OrderingDeadlockPreventor<u64> = OrderingDeadlockPreventor::new();
        let mut releases = 0;
        preventor.deregister_lock(Some(&9), &mut || releases += 1);
        assert_eq!(releases, 1);
    }
}
