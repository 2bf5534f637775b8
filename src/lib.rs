//! Row-level locking for in-process resources.
//!
//! `rowlock` runs caller-supplied work under per-resource read/write locks or
//! a system-wide global lock, so that concurrent workers touching the same
//! rows of an in-memory table, cache or registry are serialized without a
//! lock per call site.
//!
//! - [`LockManager`] is the entry point. It keeps one read/write lock per
//!   resource identifier and runs work through [`LockManager::execute`] or
//!   [`LockManager::execute_timeout`].
//! - [`Lockable`] is implemented by resource types to expose the identifier
//!   they are locked under.
//! - [`LockType`] selects a shared [`Read`](LockType::Read), exclusive
//!   [`Write`](LockType::Write), or system-wide [`Global`](LockType::Global)
//!   lock. A global execution excludes all read/write executions on every
//!   resource, not just its own.
//! - [`deadlock`] vets every identified acquisition before the worker blocks.
//!   The default [`OrderingDeadlockPreventor`](deadlock::OrderingDeadlockPreventor)
//!   rejects acquisitions whose ordering is inconsistent with another worker's
//!   with [`LockError::PossibleDeadlock`], and
//!   [`DisabledDeadlockPreventor`](deadlock::DisabledDeadlockPreventor) opts
//!   out of the vetting.
//!
//! ## Example
//! ```rust
//! use std::sync::atomic::{AtomicI64, Ordering};
//!
//! use rowlock::{LockManager, LockType, Lockable};
//!
//! struct Account {
//!     id: u32,
//!     balance: AtomicI64,
//! }
//!
//! impl Lockable for Account {
//!     type Id = u32;
//!     fn lock_id(&self) -> u32 {
//!         self.id
//!     }
//! }
//!
//! let manager = LockManager::new();
//! let account = Account {
//!     id: 1,
//!     balance: AtomicI64::new(100),
//! };
//!
//! // Writers are exclusive per resource.
//! manager.execute(&account, LockType::Write, |account| {
//!     let balance = account.balance.load(Ordering::Relaxed);
//!     account.balance.store(balance - 25, Ordering::Relaxed);
//! })?;
//!
//! // Readers share the resource.
//! let balance = manager.execute(&account, LockType::Read, |account| {
//!     account.balance.load(Ordering::Relaxed)
//! })?;
//! assert_eq!(balance, 75);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Limitations
//! - Locks are not reentrant. Work that calls back into the manager for a
//!   resource its own thread already locked deadlocks.
//! - Work that calls back into the manager for a *different* resource is
//!   supported (this is what the deadlock preventor vets), but such a nested
//!   read/write execution can deadlock against a draining global execution:
//!   the nested worker waits for the global lock to release while the global
//!   worker waits for the outer execution to finish. Keep executions flat
//!   when mixing them with global locks.
//! - Per-resource locks are never evicted, so the manager's memory use grows
//!   with the number of distinct identifiers ever locked.

#![warn(unused_variables)]
#![warn(dead_code)]
#![deny(missing_docs)]
// #![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![deny(clippy::missing_panics_doc)]

mod acquire;
mod barrier;
pub mod deadlock;
mod lock_type;
mod lockable;
mod manager;

pub use lock_type::LockType;
pub use lockable::Lockable;
pub use manager::{LockError, LockManager};
