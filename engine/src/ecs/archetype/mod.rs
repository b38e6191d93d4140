//! Archetypes: equivalence classes of entities over component sets.
//!
//! Every entity belongs to exactly one archetype: the one whose mask
//! matches the exact set of components the entity owns. Entities with no
//! components sit in the root archetype (empty mask). Each archetype
//! tracks its current members plus the entered/exited deltas accumulated
//! since the last refresh, which is what the enter/exit query surface
//! reports from.

mod registry;

pub use registry::Registry;

use std::collections::HashMap;

use crate::ecs::{bitset::Bitset, component, query};

/// An archetype identifier, dense within one world.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id(u32);

impl Id {
    /// The root archetype: empty mask, held by entities with no components.
    pub const ROOT: Id = Id(0);

    /// Construct a new archetype Id from a raw u32 value.
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the index of this Id for use in indexable storage (e.g. Vec).
    #[inline]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// One archetype: a component mask and the entities currently carrying
/// exactly that set of components.
#[derive(Debug)]
pub struct Archetype {
    /// This archetype's id.
    id: Id,

    /// One bit per component present, over the component-id space.
    mask: Bitset,

    /// The components present, in ascending id order.
    components: Vec<component::Id>,

    /// Current members, over the entity-id space.
    entities: Bitset,

    /// Entities that joined since the last refresh.
    entered: Bitset,

    /// Entities that left since the last refresh.
    exited: Bitset,

    /// Memoized candidacy decisions per query instance.
    candidates: HashMap<query::Id, bool>,
}

impl Archetype {
    /// Create an empty archetype for the given mask.
    pub(crate) fn new(id: Id, mask: Bitset, components: Vec<component::Id>, capacity: u32) -> Self {
        Self {
            id,
            mask,
            components,
            entities: Bitset::new(capacity),
            entered: Bitset::new(capacity),
            exited: Bitset::new(capacity),
            candidates: HashMap::new(),
        }
    }

    /// This archetype's id.
    #[inline]
    pub fn id(&self) -> Id {
        self.id
    }

    /// The component mask.
    #[inline]
    pub fn mask(&self) -> &Bitset {
        &self.mask
    }

    /// The components present, in ascending id order.
    #[inline]
    pub fn components(&self) -> &[component::Id] {
        &self.components
    }

    /// Current members.
    #[inline]
    pub fn entities(&self) -> &Bitset {
        &self.entities
    }

    /// Entities that joined since the last refresh.
    #[inline]
    pub fn entered(&self) -> &Bitset {
        &self.entered
    }

    /// Entities that left since the last refresh.
    #[inline]
    pub fn exited(&self) -> &Bitset {
        &self.exited
    }

    /// Whether the archetype currently has no members.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Add a member. Re-entering within one refresh window cancels the
    /// pending exit, so the deltas always reflect the net movement.
    pub(crate) fn add(&mut self, entity: u32) {
        self.entities.insert(entity);
        self.entered.insert(entity);
        self.exited.remove(entity);
    }

    /// Remove a member, cancelling a pending enter.
    pub(crate) fn remove(&mut self, entity: u32) {
        self.entities.remove(entity);
        self.exited.insert(entity);
        self.entered.remove(entity);
    }

    /// Clear the enter/exit deltas.
    pub(crate) fn refresh(&mut self) {
        self.entered.clear();
        self.exited.clear();
    }

    /// The memoized candidacy decision for a query, if already computed.
    #[inline]
    pub(crate) fn cached_candidacy(&self, query: query::Id) -> Option<bool> {
        self.candidates.get(&query).copied()
    }

    /// Memoize a candidacy decision. Masks never change, so a decision
    /// holds for the archetype's lifetime.
    #[inline]
    pub(crate) fn memoize_candidacy(&mut self, query: query::Id, matched: bool) {
        self.candidates.insert(query, matched);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archetype() -> Archetype {
        Archetype::new(
            Id::new(1),
            Bitset::from_ids(4, [0, 2]),
            vec![component::Id::new(0), component::Id::new(2)],
            16,
        )
    }

    #[test]
    fn add_and_remove_track_membership() {
        // Given
        let mut archetype = archetype();

        // When
        archetype.add(3);
        archetype.add(7);

        // Then
        assert!(archetype.entities().get(3));
        assert!(archetype.entered().get(3));
        assert!(!archetype.is_empty());

        // And When
        archetype.remove(3);

        // Then
        assert!(!archetype.entities().get(3));
        assert!(archetype.exited().get(3));
        assert!(!archetype.entered().get(3));
    }

    #[test]
    fn reenter_within_window_cancels_exit() {
        // Given
        let mut archetype = archetype();
        archetype.add(5);

        // When - leave and come back before any refresh
        archetype.remove(5);
        archetype.add(5);

        // Then - net result is an enter, not an exit
        assert!(archetype.entered().get(5));
        assert!(!archetype.exited().get(5));
        assert!(archetype.entities().get(5));
    }

    #[test]
    fn refresh_clears_deltas_only() {
        // Given
        let mut archetype = archetype();
        archetype.add(1);
        archetype.add(2);
        archetype.remove(2);

        // When
        archetype.refresh();

        // Then
        assert!(archetype.entered().is_empty());
        assert!(archetype.exited().is_empty());
        assert!(archetype.entities().get(1));
    }

    #[test]
    fn candidacy_memoization() {
        // Given
        let mut archetype = archetype();
        let query = query::Id::new(9);

        // Then
        assert_eq!(archetype.cached_candidacy(query), None);

        // When
        archetype.memoize_candidacy(query, true);

        // Then
        assert_eq!(archetype.cached_candidacy(query), Some(true));
    }
}
