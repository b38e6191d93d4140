//! Central registry of archetypes and the entity → archetype mapping.

use std::collections::HashMap;

use crate::ecs::{
    archetype::{Archetype, Id},
    bitset::Bitset,
    component,
    error::{Error, Result},
    query,
};

/// Registry of every archetype a world has observed.
///
/// Archetypes are created on demand the first time an entity arrives at a
/// new component mask and are never removed; masks are immutable, so two
/// archetypes never share one. The registry also owns the per-entity
/// archetype table and the query↔archetype incidence rebuilt on refresh.
#[derive(Debug)]
pub struct Registry {
    /// The archetypes stored by their unique identifier.
    archetypes: Vec<Archetype>,

    /// The archetypes indexed by their component mask.
    by_mask: HashMap<Bitset, Id>,

    /// Each entity slot's current archetype.
    entity_archetypes: Vec<Id>,

    /// Query → matching non-empty archetypes, rebuilt each refresh.
    incidence: HashMap<query::Id, Vec<Id>>,

    /// Bits per component mask.
    component_count: u32,

    /// Entity slots per archetype member set.
    capacity: u32,
}

impl Registry {
    /// Create a registry holding only the root archetype, with every
    /// entity slot seated in it.
    pub fn new(component_count: u32, capacity: u32) -> Self {
        let root = Archetype::new(Id::ROOT, Bitset::new(component_count), Vec::new(), capacity);
        let mut by_mask = HashMap::new();
        by_mask.insert(root.mask().clone(), Id::ROOT);

        Self {
            archetypes: vec![root],
            by_mask,
            entity_archetypes: vec![Id::ROOT; capacity as usize],
            incidence: HashMap::new(),
            component_count,
            capacity,
        }
    }

    /// Re-seat every entity slot in the root archetype.
    ///
    /// Construction already does this; init keeps the lifecycle explicit
    /// and makes re-running it harmless.
    pub fn init(&mut self) {
        self.entity_archetypes.fill(Id::ROOT);
    }

    /// Number of archetypes, including root.
    #[inline]
    pub fn count(&self) -> usize {
        self.archetypes.len()
    }

    /// Get an archetype by its Id, if it exists.
    #[inline]
    pub fn get(&self, id: Id) -> Option<&Archetype> {
        self.archetypes.get(id.index())
    }

    /// The archetype an entity currently belongs to.
    pub fn entity_archetype(&self, entity: u32) -> Result<&Archetype> {
        let id = self
            .entity_archetypes
            .get(entity as usize)
            .ok_or(Error::EntityNotFound(entity))?;
        Ok(&self.archetypes[id.index()])
    }

    /// Whether the entity sits in the root archetype.
    pub fn is_in_root(&self, entity: u32) -> Result<bool> {
        Ok(self.entity_archetype(entity)?.id() == Id::ROOT)
    }

    /// Mark a freshly created entity as a member of the root archetype.
    pub fn seat(&mut self, entity: u32) {
        self.entity_archetypes[entity as usize] = Id::ROOT;
        self.archetypes[Id::ROOT.index()].add(entity);
    }

    /// Recompute the entity's archetype from its current component list,
    /// moving it between archetypes if the set changed.
    ///
    /// Creates the target archetype on first sight of its mask. Returns
    /// the id of the archetype the entity ends up in.
    pub fn update(&mut self, entity: u32, components: &[component::Id]) -> Result<Id> {
        if entity as usize >= self.entity_archetypes.len() {
            return Err(Error::EntityNotFound(entity));
        }

        let mask = Bitset::from_ids(
            self.component_count,
            components.iter().map(|id| id.id()),
        );

        let current = self.entity_archetypes[entity as usize];
        if self.archetypes[current.index()].mask() == &mask {
            return Ok(current);
        }

        let target = match self.by_mask.get(&mask) {
            Some(id) => *id,
            None => self.create(mask, components),
        };

        self.archetypes[current.index()].remove(entity);
        self.archetypes[target.index()].add(entity);
        self.entity_archetypes[entity as usize] = target;
        Ok(target)
    }

    /// Forcibly move the entity back to the root archetype.
    pub fn reset(&mut self, entity: u32) -> Result<Id> {
        self.update(entity, &[])
    }

    /// Whether the archetype matches the query, memoizing the decision on
    /// the archetype.
    pub fn is_candidate(&mut self, id: Id, instance: &query::Instance) -> bool {
        if let Some(hit) = self.archetypes[id.index()].cached_candidacy(instance.id()) {
            return hit;
        }
        let matched = instance.matches(self.archetypes[id.index()].mask());
        self.archetypes[id.index()].memoize_candidacy(instance.id(), matched);
        matched
    }

    /// Rebuild the query↔archetype incidence for the given query
    /// instances and, when `clear_deltas` is set, clear every archetype's
    /// enter/exit deltas. Every archetype is cleared, whether or not any
    /// query matches it.
    ///
    /// The instances slice is a materialized snapshot; matching non-empty
    /// archetypes are recorded both here and on the instances themselves.
    pub fn refresh(&mut self, instances: &mut [query::Instance], clear_deltas: bool) {
        self.incidence.clear();
        for index in 0..self.archetypes.len() {
            let id = Id::new(index as u32);
            for instance in instances.iter_mut() {
                let matched = self.is_candidate(id, instance);
                if matched && !self.archetypes[index].is_empty() {
                    self.incidence.entry(instance.id()).or_default().push(id);
                    instance.track(id);
                }
            }
            if clear_deltas {
                self.archetypes[index].refresh();
            }
        }
    }

    /// The matching non-empty archetypes recorded for a query at the last
    /// refresh.
    pub fn query_archetypes(&self, query: query::Id) -> &[Id] {
        self.incidence.get(&query).map_or(&[], Vec::as_slice)
    }

    /// Drop every archetype and mapping, leaving only a fresh root.
    pub fn destroy(&mut self) {
        let component_count = self.component_count;
        let capacity = self.capacity;
        *self = Self::new(component_count, capacity);
    }

    fn create(&mut self, mask: Bitset, components: &[component::Id]) -> Id {
        let id = Id::new(self.archetypes.len() as u32);
        let mut components = components.to_vec();
        components.sort_unstable();
        log::debug!(
            "creating archetype {} for {} components",
            id.index(),
            components.len()
        );
        self.by_mask.insert(mask.clone(), id);
        self.archetypes
            .push(Archetype::new(id, mask, components, self.capacity));
        id
    }
}
