//! Identification of lockable resources.

/// A resource that can be locked by identifier.
///
/// Implementations expose a stable identifier naming the resource; all lock
/// registries are keyed on that identifier, never on the resource value
/// itself. Two resources reporting equal identifiers contend for the same
/// locks.
pub trait Lockable {
    /// The resource identifier type.
    type Id;

    /// Returns the identifier of the resource to lock.
    fn lock_id(&self) -> Self::Id;
}
