//! Acquisition and release of resolved locks through the deadlock preventor.

use std::time::Duration;

use log::debug;
use parking_lot::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::deadlock::{DeadlockPreventor, PossibleDeadlockError};

/// The concrete lock selected for a request.
#[derive(Debug, Copy, Clone)]
pub(crate) enum ResolvedLock<'a> {
    /// The shared half of a resource's read/write lock.
    Read(&'a RwLock<()>),
    /// The exclusive half of a resource's read/write lock.
    Write(&'a RwLock<()>),
    /// The global monitor.
    Global(&'a Mutex<()>),
}

/// An acquired lock, released when the guard drops.
#[derive(Debug)]
pub(crate) enum HeldLock<'a> {
    Read(RwLockReadGuard<'a, ()>),
    Write(RwLockWriteGuard<'a, ()>),
    Global(MutexGuard<'a, ()>),
}

impl<'a> ResolvedLock<'a> {
    /// Acquires the lock, blocking the current worker until it is able to.
    fn lock(self) -> HeldLock<'a> {
        match self {
            Self::Read(lock) => HeldLock::Read(lock.read()),
            Self::Write(lock) => HeldLock::Write(lock.write()),
            Self::Global(monitor) => HeldLock::Global(monitor.lock()),
        }
    }

    /// Acquires the lock if possible within `timeout`.
    fn try_lock_for(self, timeout: Duration) -> Option<HeldLock<'a>> {
        match self {
            Self::Read(lock) => lock.try_read_for(timeout).map(HeldLock::Read),
            Self::Write(lock) => lock.try_write_for(timeout).map(HeldLock::Write),
            Self::Global(monitor) => monitor.try_lock_for(timeout).map(HeldLock::Global),
        }
    }
}

/// Acquires `lock` through the preventor, blocking when `timeout` is [`None`]
/// and waiting at most `timeout` otherwise.
///
/// Returns [`None`] when a timed acquisition expires. The hold optimistically
/// recorded at registration is rolled back first, so no phantom hold remains
/// for a lock that was never taken.
///
/// # Errors
/// Returns [`PossibleDeadlockError`] if the preventor rejects the
/// registration. Nothing was recorded and no acquisition was attempted.
pub(crate) fn try_acquire<'a, ID>(
    preventor: &DeadlockPreventor<ID>,
    timeout: Option<Duration>,
    lock: ResolvedLock<'a>,
    id: &ID,
) -> Result<Option<HeldLock<'a>>, PossibleDeadlockError> {
    let mut held = None;
    let acquired = match timeout {
        None => preventor.register_lock(Some(id), &mut || {
            held = Some(lock.lock());
            true
        })?,
        Some(timeout) => preventor.register_lock(Some(id), &mut || {
            match lock.try_lock_for(timeout) {
                Some(guard) => {
                    held = Some(guard);
                    true
                }
                None => false,
            }
        })?,
    };

    if acquired {
        Ok(held)
    } else {
        debug!("lock not acquired within the timeout, rolling back its registration");
        preventor.deregister_lock(Some(id), &mut || {});
        Ok(None)
    }
}

/// Releases `held` through the preventor, deregistering its bookkeeping.
pub(crate) fn release<ID>(preventor: &DeadlockPreventor<ID>, id: &ID, held: HeldLock<'_>) {
    let mut held = Some(held);
    preventor.deregister_lock(Some(id), &mut || drop(held.take()));
}
