//! Disabled deadlock prevention.

use super::{DeadlockPreventorTraits, PossibleDeadlockError};

/// Disabled deadlock preventor.
///
/// Performs no ordering checks and keeps no bookkeeping; every acquisition is
/// approved and runs directly. Callers are responsible for keeping their own
/// lock-acquisition order deadlock-free.
#[derive(Debug, Default)]
pub struct DisabledDeadlockPreventor;

impl<ID> DeadlockPreventorTraits<ID> for DisabledDeadlockPreventor {
    fn register_lock(
        &self,
        _id: Option<&ID>,
        acquire: &mut dyn FnMut() -> bool,
    ) -> Result<bool, PossibleDeadlockError> {
        Ok(acquire())
    }

    fn deregister_lock(&self, _id: Option<&ID>, release: &mut dyn FnMut()) {
        release();
    }
}
