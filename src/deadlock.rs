//! Deadlock prevention for lock acquisition.
//!
//! A [`DeadlockPreventor`] implements [`DeadlockPreventorTraits`] to vet every
//! lock acquisition before the requesting worker is allowed to block, and to
//! keep the per-worker bookkeeping that decision needs.
//!
//! The preventor implementations include:
//!  - [`OrderingDeadlockPreventor`] rejects acquisitions whose resource
//!    ordering is inconsistent with another worker registered on the same
//!    resources.
//!    - Used by default in [`LockManager`](crate::LockManager).
//!  - [`DisabledDeadlockPreventor`] performs no checks and no bookkeeping.
//!    - **Requires lock-acquisition order to be managed by the caller to
//!      remain deadlock-free.**

pub mod disabled;
pub mod ordering;

mod holds;

pub use disabled::DisabledDeadlockPreventor;
pub use ordering::OrderingDeadlockPreventor;

use std::sync::Arc;

use thiserror::Error;

/// Deadlock preventor for lock acquisition.
pub type DeadlockPreventor<ID> = Arc<dyn DeadlockPreventorTraits<ID>>;

/// Traits for deadlock preventors.
pub trait DeadlockPreventorTraits<ID>: Send + Sync + core::fmt::Debug {
    /// Registers the current worker's intent to lock `id`, then runs `acquire`.
    ///
    /// The ordering check runs before `acquire` and before any bookkeeping is
    /// committed; on rejection `acquire` is never invoked. Otherwise the hold
    /// is recorded and `acquire` performs the real (possibly blocking,
    /// possibly timed) acquisition, returning whether it succeeded. A `false`
    /// outcome indicates a timed acquisition that expired; the caller rolls
    /// the recorded hold back via [`deregister_lock`](Self::deregister_lock).
    ///
    /// An `id` of [`None`] skips the check and the bookkeeping and runs
    /// `acquire` directly.
    ///
    /// # Errors
    /// Returns [`PossibleDeadlockError`] if acquiring `id` now risks a
    /// deadlock.
    fn register_lock(
        &self,
        id: Option<&ID>,
        acquire: &mut dyn FnMut() -> bool,
    ) -> Result<bool, PossibleDeadlockError>;

    /// Removes the current worker's hold on `id`, then runs `release`.
    ///
    /// `release` runs exactly once, whether or not a hold was recorded;
    /// removal of an absent hold is a no-op.
    fn deregister_lock(&self, id: Option<&ID>, release: &mut dyn FnMut());
}

/// A possible deadlock was detected.
///
/// Raised synchronously at registration time, before the worker blocks. The
/// offending lock is not acquired and no hold is recorded.
#[derive(Debug, Error)]
#[error("possible deadlock: lock acquisition order is inconsistent with another worker")]
pub struct PossibleDeadlockError;
