//! Lock request types.

/// The type of lock requested for an execution.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum LockType {
    /// A shared per-resource lock. Read executions on one resource may overlap
    /// each other, but never a write or global execution.
    Read,
    /// An exclusive per-resource lock.
    Write,
    /// An exclusive system-wide lock. Drains all in-flight local executions,
    /// then excludes every execution on every resource while held.
    Global,
}

impl LockType {
    /// Returns true if this is the [`Global`](LockType::Global) lock type.
    #[must_use]
    pub fn is_global(self) -> bool {
        matches!(self, Self::Global)
    }
}
