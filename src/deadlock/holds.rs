//! Bookkeeping of which worker holds locks on which resources.

use std::{collections::HashMap, hash::Hash, thread::ThreadId};

use parking_lot::RwLock;

/// Registered holds, indexed in both directions.
///
/// A `(worker, id)` pair is a member of one map iff it is a member of the
/// other; both maps are mutated together under the write lock. Lists keep
/// insertion order, which records the acquisition order the ordering check
/// relies on.
#[derive(Debug)]
struct HoldsInner<ID> {
    held_ids: HashMap<ThreadId, Vec<ID>>,
    holders: HashMap<ID, Vec<ThreadId>>,
}

/// Which resources each worker currently holds or is acquiring, and which
/// workers are registered against each resource.
///
/// Holds are recorded before the underlying lock is acquired and removed when
/// it is released; removal tolerates absent holds. Entries for workers and
/// resources are never pruned.
#[derive(Debug)]
pub struct ThreadHolds<ID> {
    inner: RwLock<HoldsInner<ID>>,
}

impl<ID> Default for ThreadHolds<ID> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(HoldsInner {
                held_ids: HashMap::new(),
                holders: HashMap::new(),
            }),
        }
    }
}

impl<ID: Clone + Eq + Hash> ThreadHolds<ID> {
    /// Records that the current worker holds, or is about to acquire, `id`.
    pub fn record_hold(&self, id: &ID) {
        let worker = std::thread::current().id();
        let mut inner = self.inner.write();
        inner.held_ids.entry(worker).or_default().push(id.clone());
        inner.holders.entry(id.clone()).or_default().push(worker);
    }

    /// Removes the current worker's hold on `id`. A no-op if absent; one
    /// occurrence is removed per call.
    pub fn release_hold(&self, id: &ID) {
        let worker = std::thread::current().id();
        let mut inner = self.inner.write();
        if let Some(ids) = inner.held_ids.get_mut(&worker) {
            if let Some(position) = ids.iter().position(|held| held == id) {
                ids.remove(position);
            }
        }
        if let Some(workers) = inner.holders.get_mut(id) {
            if let Some(position) = workers.iter().position(|holder| *holder == worker) {
                workers.remove(position);
            }
        }
    }

    /// Returns a snapshot of the resources held by `worker`, in acquisition
    /// order, or [`None`] if the worker never registered a hold.
    pub fn held_by(&self, worker: ThreadId) -> Option<Vec<ID>> {
        self.inner.read().held_ids.get(&worker).cloned()
    }

    /// Returns a snapshot of the full held list of every worker other than
    /// the current one registered against `id`. Empty when `id` has no other
    /// registered worker.
    pub fn held_by_others(&self, id: &ID) -> Vec<Vec<ID>> {
        let worker = std::thread::current().id();
        let inner = self.inner.read();
        let Some(holders) = inner.holders.get(id) else {
            return Vec::new();
        };
        holders
            .iter()
            .filter(|holder| **holder != worker)
            .filter_map(|holder| inner.held_ids.get(holder).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn holds_are_recorded_bidirectionally() {
        let holds: ThreadHolds<u64> = ThreadHolds::default();
        holds.record_hold(&1);
        holds.record_hold(&2);

        let worker = std::thread::current().id();
        assert_eq!(holds.held_by(worker), Some(vec![1, 2]));
        {
            let inner = holds.inner.read();
            assert_eq!(inner.holders[&1], vec![worker]);
            assert_eq!(inner.holders[&2], vec![worker]);
        }

        holds.release_hold(&1);
        assert_eq!(holds.held_by(worker), Some(vec![2]));
        assert!(holds.inner.read().holders[&1].is_empty());
    }

    #[test]
    fn releasing_an_absent_hold_is_a_no_op() {
        let holds: ThreadHolds<u64> = ThreadHolds::default();
        holds.release_hold(&1);
        assert_eq!(holds.held_by(std::thread::current().id()), None);

        holds.record_hold(&1);
        holds.release_hold(&1);
        holds.release_hold(&1);
        assert_eq!(holds.held_by(std::thread::current().id()), Some(vec![]));
    }

    #[test]
    fn duplicate_holds_release_one_occurrence_at_a_time() {
        let holds: ThreadHolds<u64> = ThreadHolds::default();
        holds.record_hold(&1);
        holds.record_hold(&1);

        let worker = std::thread::current().id();
        assert_eq!(holds.held_by(worker), Some(vec![1, 1]));
        holds.release_hold(&1);
        assert_eq!(holds.held_by(worker), Some(vec![1]));
    }

    #[test]
    fn the_maps_stay_bidirectional_under_concurrent_mutation() {
        let holds: Arc<ThreadHolds<u64>> = Arc::new(ThreadHolds::default());

        let workers: Vec<_> = (0..8u64)
            .map(|worker| {
                let holds = holds.clone();
                std::thread::spawn(move || {
                    for round in 0..200u64 {
                        let id = (worker + round) % 5;
                        holds.record_hold(&id);
                        holds.record_hold(&(id + 1));
                        holds.release_hold(&id);
                        if round % 3 != 0 {
                            holds.release_hold(&(id + 1));
                        }
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        // Once the mutations settle, a (worker, id) pair is in one map iff it
        // is in the other, occurrence for occurrence.
        let inner = holds.inner.read();
        for (worker, ids) in &inner.held_ids {
            for id in ids {
                let holders = &inner.holders[id];
                assert_eq!(
                    ids.iter().filter(|held| *held == id).count(),
                    holders.iter().filter(|holder| *holder == worker).count(),
                );
            }
        }
        for (id, workers) in &inner.holders {
            for worker in workers {
                assert!(inner.held_ids[worker].contains(id));
            }
        }
    }

    #[test]
    fn other_holders_exclude_the_current_worker() {
        let holds: Arc<ThreadHolds<u64>> = Arc::new(ThreadHolds::default());
        holds.record_hold(&1);
        assert!(holds.held_by_others(&1).is_empty());

        {
            let holds = holds.clone();
            std::thread::spawn(move || {
                holds.record_hold(&1);
                holds.record_hold(&2);
            })
            .join()
            .unwrap();
        }
        assert_eq!(holds.held_by_others(&1), vec![vec![1, 2]]);
    }
}
