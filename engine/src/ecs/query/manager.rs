//! Query registration, result caching and invalidation.

use std::collections::HashMap;

use crate::ecs::{
    archetype,
    bitset::Bitset,
    component,
    error::Result,
    query::{Id, Instance, Query},
};

/// Owner of every compiled query in a world.
///
/// Registration is memoized twice: by query identity, and by the compiled
/// mask triple, so two queries that compile to the same three masks share
/// one instance. Entity results are cached per instance and keyed by a
/// monotonic version: bumping the version (on any world mutation that
/// moves entities between archetypes) lazily invalidates every cache.
/// Result bitsets recycle through a free-list pool.
#[derive(Debug)]
pub struct Manager {
    /// Compiled instances, indexed by [`Id`].
    instances: Vec<Instance>,

    /// Query identity → instance.
    by_uid: HashMap<u64, Id>,

    /// Compiled mask triple → instance, for structural de-duplication.
    by_masks: HashMap<(Bitset, Bitset, Bitset), Id>,

    /// Current cache version. Starts at 1 so a zero stamp is always stale.
    version: u64,

    /// Free list of capacity-sized bitsets.
    pool: Vec<Bitset>,

    /// Entity slots per result set.
    capacity: u32,

    /// Whether unknown components fail registration instead of being
    /// skipped.
    strict: bool,
}

impl Manager {
    /// Create an empty manager for a world of `capacity` entity slots.
    pub fn new(capacity: u32, strict: bool) -> Self {
        Self {
            instances: Vec::new(),
            by_uid: HashMap::new(),
            by_masks: HashMap::new(),
            version: 1,
            pool: Vec::new(),
            capacity,
            strict,
        }
    }

    /// Number of compiled instances.
    #[inline]
    pub fn count(&self) -> usize {
        self.instances.len()
    }

    /// The instance a query is registered under, if any.
    #[inline]
    pub fn lookup(&self, query: &Query) -> Option<Id> {
        self.by_uid.get(&query.uid()).copied()
    }

    /// Register a query, compiling it on first sight.
    ///
    /// Returns the instance id plus whether a new instance was created;
    /// callers use the flag to refresh the new instance's archetype set.
    pub fn register(
        &mut self,
        query: &Query,
        registry: &component::Registry,
    ) -> Result<(Id, bool)> {
        if let Some(id) = self.lookup(query) {
            return Ok((id, false));
        }

        let id = Id::new(self.instances.len() as u32);
        let instance = Instance::compile(id, query, registry, self.strict)?;

        let (and, or, not) = instance.masks();
        let key = (and.clone(), or.clone(), not.clone());
        if let Some(&existing) = self.by_masks.get(&key) {
            // Structurally identical to a known query; share its instance.
            self.by_uid.insert(query.uid(), existing);
            self.pool.push(instance.cached);
            return Ok((existing, false));
        }

        log::debug!("compiled query instance {}", id.index());
        self.by_masks.insert(key, id);
        self.by_uid.insert(query.uid(), id);
        self.instances.push(instance);
        Ok((id, true))
    }

    /// Get a compiled instance.
    #[inline]
    pub fn get(&self, id: Id) -> &Instance {
        &self.instances[id.index()]
    }

    /// The compiled instances, for the archetype refresh pass.
    #[inline]
    pub fn instances_mut(&mut self) -> &mut [Instance] {
        &mut self.instances
    }

    /// The frozen name → component map of a query.
    #[inline]
    pub fn components_of(&self, id: Id) -> &HashMap<String, component::Id> {
        self.instances[id.index()].components()
    }

    /// The entities matching a query, as a cached bitset.
    ///
    /// Rebuilt from the union of the matching archetypes' member sets when
    /// the cache is older than the current version; otherwise returned as
    /// is. The union over disjoint member sets is also what keeps the
    /// enumeration free of duplicates.
    pub fn entities(&mut self, id: Id, archetypes: &archetype::Registry) -> &Bitset {
        let index = id.index();
        if self.instances[index].stamp < self.version {
            let version = self.version;
            let instance = &mut self.instances[index];
            instance.cached.clear();
            for arch in instance.archetypes.iter() {
                if let Some(archetype) = archetypes.get(*arch) {
                    instance.cached.union_with(archetype.entities());
                }
            }
            instance.stamp = version;
        }
        &self.instances[index].cached
    }

    /// Entities that entered a matching archetype since the last delta
    /// clear.
    pub fn entered(&mut self, id: Id, archetypes: &archetype::Registry) -> Vec<u32> {
        self.collect_delta(id, archetypes, |archetype| archetype.entered())
    }

    /// Entities that left a matching archetype since the last delta clear.
    ///
    /// An entity that merely moved between two matching archetypes shows
    /// up in both deltas; exited entities that are still matched elsewhere
    /// are filtered against the current result set by the caller if
    /// needed.
    pub fn exited(&mut self, id: Id, archetypes: &archetype::Registry) -> Vec<u32> {
        self.collect_delta(id, archetypes, |archetype| archetype.exited())
    }

    /// Invalidate one query's cache, or bump the version to invalidate
    /// them all.
    pub fn invalidate(&mut self, target: Option<Id>) {
        match target {
            Some(id) => self.instances[id.index()].stamp = 0,
            None => self.version += 1,
        }
    }

    /// The current cache version.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Drop every instance and cache.
    pub fn destroy(&mut self) {
        for instance in self.instances.drain(..) {
            self.pool.push(instance.cached);
        }
        self.by_uid.clear();
        self.by_masks.clear();
    }

    fn collect_delta(
        &mut self,
        id: Id,
        archetypes: &archetype::Registry,
        delta: impl Fn(&archetype::Archetype) -> &Bitset,
    ) -> Vec<u32> {
        let mut visited = self
            .pool
            .pop()
            .unwrap_or_else(|| Bitset::new(self.capacity));
        visited.clear();

        for arch in self.instances[id.index()].archetypes() {
            if let Some(archetype) = archetypes.get(arch) {
                visited.union_with(delta(archetype));
            }
        }

        let out: Vec<u32> = visited.ones().collect();
        self.pool.push(visited);
        out
    }
}
