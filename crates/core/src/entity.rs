//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Persisted entities are compared by identifier alone. An entity that has not
/// been assigned an identifier yet (`None`) is never equal to another one.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier, if the entity has been persisted.
    fn id(&self) -> Option<Self::Id>;
}

/// Identity equality shared by every [`Entity`] implementation.
pub fn same_identity<E: Entity>(a: &E, b: &E) -> bool {
    match (a.id(), b.id()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
