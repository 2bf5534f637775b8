//! The lock manager.

use std::{collections::HashMap, fmt, hash::Hash, sync::Arc, time::Duration};

use log::debug;
use parking_lot::{Mutex, RwLock};
use thiserror::Error;

use crate::{
    acquire::{self, HeldLock, ResolvedLock},
    barrier::GlobalBarrier,
    deadlock::{DeadlockPreventor, OrderingDeadlockPreventor, PossibleDeadlockError},
    lock_type::LockType,
    lockable::Lockable,
};

/// A lock acquisition failure.
#[derive(Debug, Error)]
pub enum LockError {
    /// A possible deadlock was detected before blocking. The work never ran.
    #[error(transparent)]
    PossibleDeadlock(#[from] PossibleDeadlockError),
    /// The lock was not acquired within the requested time. The work never
    /// ran.
    #[error("failed to acquire the lock in the specified time")]
    Timeout,
}

/// Row-level lock manager for in-process resources.
///
/// Runs caller-supplied work under a [read, write or global
/// lock](LockType) on the resource identified by [`Lockable::lock_id`].
/// Per-resource locks are created on first use and kept for the life of the
/// manager; the registry grows monotonically with the number of distinct
/// identifiers ever locked.
///
/// Acquisitions are vetted by a [deadlock preventor](crate::deadlock) before
/// the worker is allowed to block, and lock, barrier and bookkeeping state
/// are always released when the work finishes, fails or panics.
///
/// Locks are not reentrant. Nesting an execution on a resource already locked
/// by the current thread deadlocks (write) or may block indefinitely under
/// writer pressure (read); nested executions on distinct resources are what
/// the deadlock preventor is there for.
///
/// # Examples
/// ```
/// use rowlock::{LockManager, LockType, Lockable};
///
/// struct Account {
///     id: u32,
///     balance: i64,
/// }
///
/// impl Lockable for Account {
///     type Id = u32;
///     fn lock_id(&self) -> u32 {
///         self.id
///     }
/// }
///
/// let manager = LockManager::new();
/// let account = Account { id: 1, balance: 100 };
/// let balance = manager.execute(&account, LockType::Read, |account| account.balance)?;
/// assert_eq!(balance, 100);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct LockManager<ID: 'static> {
    locks: Mutex<HashMap<ID, Arc<RwLock<()>>>>,
    preventor: DeadlockPreventor<ID>,
    barrier: GlobalBarrier,
}

impl<ID> LockManager<ID>
where
    ID: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static,
{
    /// Create a new lock manager with the default
    /// [`OrderingDeadlockPreventor`].
    #[must_use]
    pub fn new() -> Self {
        Self::new_with_preventor(Arc::new(OrderingDeadlockPreventor::new()))
    }

    /// Create a new lock manager with a non-default deadlock preventor.
    #[must_use]
    pub fn new_with_preventor(preventor: DeadlockPreventor<ID>) -> Self {
        Self {
            locks: Mutex::default(),
            preventor,
            barrier: GlobalBarrier::new(),
        }
    }

    /// Runs `work` on `entity` under a lock of `lock_type`, waiting
    /// indefinitely for the lock.
    ///
    /// # Errors
    /// Returns [`LockError::PossibleDeadlock`] if the deadlock preventor
    /// rejects the acquisition; the rejection is synchronous and the worker
    /// never blocks.
    pub fn execute<E, R>(
        &self,
        entity: &E,
        lock_type: LockType,
        work: impl FnOnce(&E) -> R,
    ) -> Result<R, LockError>
    where
        E: Lockable<Id = ID>,
    {
        self.exec(entity, lock_type, None, work)
    }

    /// Runs `work` on `entity` under a lock of `lock_type`, waiting at most
    /// `timeout` for the lock. A zero `timeout` waits indefinitely.
    ///
    /// The bound covers only the lock acquisition. A global execution still
    /// waits unbounded for in-flight local work to drain, and a local
    /// execution waits unbounded for an outstanding global lock to release.
    ///
    /// # Errors
    /// Returns [`LockError::Timeout`] if the lock is not acquired within
    /// `timeout`, and [`LockError::PossibleDeadlock`] if the deadlock
    /// preventor rejects the acquisition.
    pub fn execute_timeout<E, R>(
        &self,
        entity: &E,
        lock_type: LockType,
        timeout: Duration,
        work: impl FnOnce(&E) -> R,
    ) -> Result<R, LockError>
    where
        E: Lockable<Id = ID>,
    {
        let timeout = (!timeout.is_zero()).then_some(timeout);
        self.exec(entity, lock_type, timeout, work)
    }

    fn exec<E, R>(
        &self,
        entity: &E,
        lock_type: LockType,
        timeout: Option<Duration>,
        work: impl FnOnce(&E) -> R,
    ) -> Result<R, LockError>
    where
        E: Lockable<Id = ID>,
    {
        let id = entity.lock_id();
        debug!("start executing for id {:?}", id);

        let pair = self.lock_pair(&id);
        let lock = match lock_type {
            LockType::Read => ResolvedLock::Read(&pair),
            LockType::Write => ResolvedLock::Write(&pair),
            LockType::Global => ResolvedLock::Global(self.barrier.monitor()),
        };

        let Some(mut held) = acquire::try_acquire(&self.preventor, timeout, lock, &id)? else {
            return Err(LockError::Timeout);
        };
        self.barrier.enter(&mut held);

        let cleanup = Cleanup {
            barrier: &self.barrier,
            preventor: &self.preventor,
            lock_type,
            id: &id,
            held: Some(held),
        };
        let result = work(entity);
        debug!("finish executing for id {:?}", id);
        drop(cleanup);
        Ok(result)
    }

    /// The read/write lock for `id`, created on first use and never evicted.
    fn lock_pair(&self, id: &ID) -> Arc<RwLock<()>> {
        let mut locks = self.locks.lock();
        locks.entry(id.clone()).or_default().clone()
    }
}

impl<ID> Default for LockManager<ID>
where
    ID: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Unwinds the acquisition in reverse, whatever way the work terminates:
/// barrier leave first, then lock release with its bookkeeping.
struct Cleanup<'a, ID: fmt::Debug> {
    barrier: &'a GlobalBarrier,
    preventor: &'a DeadlockPreventor<ID>,
    lock_type: LockType,
    id: &'a ID,
    held: Option<HeldLock<'a>>,
}

impl<ID: fmt::Debug> Drop for Cleanup<'_, ID> {
    fn drop(&mut self) {
        debug!("unlocking entity with id {:?}", self.id);
        self.barrier.leave(self.lock_type);
        if let Some(held) = self.held.take() {
            acquire::release(self.preventor, self.id, held);
        }
    }
}
