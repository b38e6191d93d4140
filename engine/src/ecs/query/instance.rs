//! World-local compiled form of a query.

use std::collections::{HashMap, HashSet};

use crate::ecs::{
    archetype,
    bitset::Bitset,
    component,
    error::{Error, Result},
    query::{Id, Query},
};

/// A query compiled against one world's component registry.
///
/// Holds the three predicate masks over the component-id space, the frozen
/// name → component map of the `all` ∪ `any` union, and the set of
/// matching archetypes accumulated across refreshes. Archetype masks never
/// change, so the set only ever grows; archetypes that empty out simply
/// stop contributing members.
#[derive(Debug)]
pub struct Instance {
    /// This instance's id.
    id: Id,

    /// Mask of components every match must own.
    and: Bitset,

    /// Mask of components of which a match must own at least one.
    or: Bitset,

    /// Mask of components no match may own.
    not: Bitset,

    /// Frozen name → component map over `all` ∪ `any`.
    components: HashMap<String, component::Id>,

    /// Matching archetypes seen so far.
    pub(crate) archetypes: HashSet<archetype::Id>,

    /// Cached union of the matching archetypes' members.
    pub(crate) cached: Bitset,

    /// Version at which `cached` was computed. Zero means never.
    pub(crate) stamp: u64,
}

impl Instance {
    /// Compile `query` against the registry.
    ///
    /// Descriptors with no instance in this world are skipped with a
    /// warning, or rejected with [`Error::NotRegistered`] in strict mode.
    pub(crate) fn compile(
        id: Id,
        query: &Query,
        registry: &component::Registry,
        strict: bool,
    ) -> Result<Self> {
        let count = registry.count();
        let mut and = Bitset::new(count);
        let mut or = Bitset::new(count);
        let mut not = Bitset::new(count);
        let mut components = HashMap::new();

        let mut resolve = |component: &component::Component,
                           mask: &mut Bitset,
                           track: bool|
         -> Result<()> {
            match registry.lookup(component) {
                Some(dense) => {
                    mask.insert(dense.id());
                    if track {
                        components.insert(component.name().to_string(), dense);
                    }
                }
                None if strict => {
                    return Err(Error::NotRegistered(component.name().to_string()));
                }
                None => {
                    log::warn!(
                        "query references unknown component `{}`; skipping it",
                        component.name()
                    );
                }
            }
            Ok(())
        };

        for component in query.all() {
            resolve(component, &mut and, true)?;
        }
        for component in query.any() {
            resolve(component, &mut or, true)?;
        }
        for component in query.none() {
            resolve(component, &mut not, false)?;
        }

        Ok(Self {
            id,
            and,
            or,
            not,
            components,
            archetypes: HashSet::new(),
            cached: Bitset::new(registry.capacity()),
            stamp: 0,
        })
    }

    /// This instance's id.
    #[inline]
    pub fn id(&self) -> Id {
        self.id
    }

    /// The frozen name → component map over `all` ∪ `any`.
    #[inline]
    pub fn components(&self) -> &HashMap<String, component::Id> {
        &self.components
    }

    /// The matching archetypes seen so far.
    #[inline]
    pub fn archetypes(&self) -> impl Iterator<Item = archetype::Id> + '_ {
        self.archetypes.iter().copied()
    }

    /// The three predicate masks, for instance de-duplication.
    pub(crate) fn masks(&self) -> (&Bitset, &Bitset, &Bitset) {
        (&self.and, &self.or, &self.not)
    }

    /// Record a matching archetype.
    #[inline]
    pub(crate) fn track(&mut self, archetype: archetype::Id) {
        self.archetypes.insert(archetype);
    }

    /// Whether an archetype with the given component mask matches this
    /// query.
    ///
    /// An empty mask never matches; otherwise the mask must cover `and`,
    /// avoid `not` entirely, and intersect `or` unless `or` is empty.
    pub fn matches(&self, mask: &Bitset) -> bool {
        if mask.is_empty() {
            return false;
        }
        if !self.and.is_subset(mask) {
            return false;
        }
        if !self.not.is_disjoint(mask) {
            return false;
        }
        if !self.or.is_empty() && self.or.is_disjoint(mask) {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::query::Spec;

    fn world_registry() -> (component::Registry, Vec<component::Component>) {
        let components = vec![
            component::Component::tag("a").unwrap(),
            component::Component::tag("b").unwrap(),
            component::Component::tag("c").unwrap(),
        ];
        (component::Registry::new(8, &components).unwrap(), components)
    }

    fn compile(spec: Spec, registry: &component::Registry) -> Instance {
        Instance::compile(Id::new(0), &Query::new(spec).unwrap(), registry, false).unwrap()
    }

    #[test]
    fn masks_follow_the_sets() {
        // Given
        let (registry, components) = world_registry();
        let instance = compile(
            Spec {
                all: vec![components[0].clone()],
                any: vec![components[1].clone()],
                none: vec![components[2].clone()],
            },
            &registry,
        );

        // Then
        let (and, or, not) = instance.masks();
        assert_eq!(and.ones().collect::<Vec<_>>(), [0]);
        assert_eq!(or.ones().collect::<Vec<_>>(), [1]);
        assert_eq!(not.ones().collect::<Vec<_>>(), [2]);
        assert_eq!(instance.components().len(), 2);
        assert!(instance.components().contains_key("a"));
        assert!(instance.components().contains_key("b"));
    }

    #[test]
    fn empty_mask_never_matches() {
        // Given
        let (registry, components) = world_registry();
        let instance = compile(
            Spec {
                none: vec![components[2].clone()],
                ..Default::default()
            },
            &registry,
        );

        // Then - even a pure-negation query rejects the empty mask
        assert!(!instance.matches(&Bitset::new(3)));
        assert!(instance.matches(&Bitset::from_ids(3, [0])));
    }

    #[test]
    fn match_semantics() {
        // Given
        let (registry, components) = world_registry();
        let instance = compile(
            Spec {
                all: vec![components[0].clone()],
                any: vec![components[1].clone(), components[2].clone()],
                ..Default::default()
            },
            &registry,
        );

        // Then
        assert!(instance.matches(&Bitset::from_ids(3, [0, 1])));
        assert!(instance.matches(&Bitset::from_ids(3, [0, 2])));
        // Missing the `all` component
        assert!(!instance.matches(&Bitset::from_ids(3, [1, 2])));
        // Missing every `any` component
        assert!(!instance.matches(&Bitset::from_ids(3, [0])));
    }

    #[test]
    fn none_excludes() {
        // Given
        let (registry, components) = world_registry();
        let instance = compile(
            Spec {
                all: vec![components[0].clone()],
                none: vec![components[2].clone()],
                ..Default::default()
            },
            &registry,
        );

        // Then
        assert!(instance.matches(&Bitset::from_ids(3, [0, 1])));
        assert!(!instance.matches(&Bitset::from_ids(3, [0, 2])));
    }

    #[test]
    fn unknown_components_are_skipped_unless_strict() {
        // Given
        let (registry, components) = world_registry();
        let stranger = component::Component::tag("stranger").unwrap();
        let query = Query::new(Spec {
            all: vec![components[0].clone(), stranger.clone()],
            ..Default::default()
        })
        .unwrap();

        // When - lenient compilation skips the unknown descriptor
        let instance = Instance::compile(Id::new(0), &query, &registry, false).unwrap();

        // Then
        let (and, _, _) = instance.masks();
        assert_eq!(and.ones().collect::<Vec<_>>(), [0]);
        assert!(!instance.components().contains_key("stranger"));

        // And strict compilation rejects it
        assert!(matches!(
            Instance::compile(Id::new(1), &query, &registry, true),
            Err(Error::NotRegistered(_))
        ));
    }
}
