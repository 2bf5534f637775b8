//! Coordination of the system-wide global lock against active local locks.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::{Condvar, Mutex};

use crate::{acquire::HeldLock, lock_type::LockType};

/// Writer-priority drain barrier coordinating the process-wide global lock
/// with the population of active local (read/write) lock holders.
///
/// A global request claims the barrier before draining, so a stream of new
/// local requests can never starve it. The monitor mutex doubles as the
/// global lock object: a global holder keeps it for the whole drain, work,
/// and release span, and both condition variables wait with it.
#[derive(Debug)]
pub(crate) struct GlobalBarrier {
    global_held: AtomicBool,
    active_locals: AtomicUsize,
    monitor: Mutex<()>,
    locals_drained: Condvar,
    global_released: Condvar,
}

impl GlobalBarrier {
    pub(crate) fn new() -> Self {
        Self {
            global_held: AtomicBool::new(false),
            active_locals: AtomicUsize::new(0),
            monitor: Mutex::new(()),
            locals_drained: Condvar::new(),
            global_released: Condvar::new(),
        }
    }

    /// The mutex serving as the global lock object.
    pub(crate) fn monitor(&self) -> &Mutex<()> {
        &self.monitor
    }

    /// Enters the barrier with an already acquired lock, before the work
    /// runs. May block: a global holder drains the active locals, a local
    /// waits out an outstanding global.
    pub(crate) fn enter(&self, held: &mut HeldLock<'_>) {
        match held {
            HeldLock::Global(monitor) => {
                self.global_held.store(true, Ordering::SeqCst);
                while self.active_locals.load(Ordering::SeqCst) > 0 {
                    self.locals_drained.wait(monitor);
                    // A finishing global holder clears the flag. Restore it so
                    // that departing locals keep signaling this drain.
                    self.global_held.store(true, Ordering::SeqCst);
                }
            }
            HeldLock::Read(_) | HeldLock::Write(_) => {
                self.wait_global_released();
                self.active_locals.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    /// Leaves the barrier after the work completes, before the lock is
    /// released.
    pub(crate) fn leave(&self, lock_type: LockType) {
        if lock_type.is_global() {
            self.global_held.store(false, Ordering::SeqCst);
            self.global_released.notify_all();
            // A queued global may be parked in its drain loop waiting for
            // this one to finish; it re-checks the local count on wakeup.
            self.locals_drained.notify_all();
        } else {
            self.active_locals.fetch_sub(1, Ordering::SeqCst);
            if self.global_held.load(Ordering::SeqCst) {
                // Taking the monitor guarantees a draining global is parked
                // in its wait, not between its count check and the wait.
                let _monitor = self.monitor.lock();
                self.locals_drained.notify_all();
            }
        }
    }

    /// Waits until no global lock is outstanding. Double-checked: the common
    /// case skips the monitor entirely.
    fn wait_global_released(&self) {
        if self.global_held.load(Ordering::SeqCst) {
            let mut monitor = self.monitor.lock();
            while self.global_held.load(Ordering::SeqCst) {
                self.global_released.wait(&mut monitor);
            }
        }
    }
}
