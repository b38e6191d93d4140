//! The World composes the ECS subsystems behind one public API.
//!
//! A `World` is built once, over a fixed entity capacity and a fixed
//! component list, and then driven through a small lifecycle:
//! uninitialized → initialized → destroyed, with any step able to divert
//! to an error state. While initialized, every mutation that changes which
//! components an entity owns routes through the component registry, the
//! archetype registry and the query caches, so query results always
//! reflect the latest mutation.
//!
//! # Example
//!
//! ```ignore
//! use strata_engine::ecs::{query, world, Component, ElementKind, Query, Schema, World};
//!
//! let position = Component::new(
//!     "position",
//!     Schema::new().field("x", ElementKind::F32).field("y", ElementKind::F32),
//! )?;
//! let frozen = Component::tag("frozen")?;
//!
//! let mut world = World::new(world::Spec::new(1024, vec![position.clone(), frozen.clone()]))?;
//! world.init()?;
//!
//! let entity = world.create_entity().unwrap();
//! world.add_component(&position, entity, None)?;
//!
//! let movable = Query::new(query::Spec {
//!     all: vec![position],
//!     none: vec![frozen],
//!     ..Default::default()
//! })?;
//! for entity in world.query_entities(&movable)? {
//!     // ...
//! }
//! ```

use std::collections::HashMap;

use crate::ecs::{
    archetype,
    component::{self, Component, Proxy},
    entity,
    error::{Error, Result},
    query::{self, Query},
    storage::{Element, Value},
};

/// The lifecycle state of a [`World`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Built but not yet initialized.
    Uninitialized,
    /// Live: mutations trigger immediate refreshes.
    Initialized,
    /// Torn down; only state inspection remains meaningful.
    Destroyed,
    /// A lifecycle step failed; stateful operations are refused.
    Error,
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            State::Uninitialized => "uninitialized",
            State::Initialized => "initialized",
            State::Destroyed => "destroyed",
            State::Error => "error",
        };
        f.write_str(name)
    }
}

/// A lifecycle hook run during init or destroy.
pub type Hook = Box<dyn FnMut() -> Result<()>>;

/// Construction parameters for a [`World`].
#[derive(Debug, Clone)]
pub struct Spec {
    /// Number of entity slots. Fixed for the world's lifetime.
    pub capacity: u32,

    /// The components the world is built over. Fixed for the world's
    /// lifetime.
    pub components: Vec<Component>,

    /// Fail query registration on unknown components instead of skipping
    /// them.
    pub strict_queries: bool,
}

impl Spec {
    /// A spec with the given capacity and components and default knobs.
    pub fn new(capacity: u32, components: Vec<Component>) -> Self {
        Self {
            capacity,
            components,
            strict_queries: false,
        }
    }
}

/// The central container: entity pool, component registry, archetype
/// registry and query manager behind one API.
pub struct World {
    /// The lifecycle state.
    state: State,

    /// The entity id pool.
    pool: entity::Pool,

    /// Component registration, storage and change tracking.
    components: component::Registry,

    /// Archetype membership and enter/exit deltas.
    archetypes: archetype::Registry,

    /// Compiled queries and their result caches.
    queries: query::Manager,

    /// Hooks run at init, in registration order.
    init_hooks: Vec<Hook>,

    /// Hooks run at destroy, in registration order.
    destroy_hooks: Vec<Hook>,
}

impl World {
    /// Build a world from its spec.
    ///
    /// Fails on a zero capacity, an empty component list, or invalid
    /// component registration (duplicate descriptors or names).
    pub fn new(spec: Spec) -> Result<Self> {
        if spec.capacity == 0 {
            return Err(Error::Spec("world capacity must be positive".to_string()));
        }

        let components = component::Registry::new(spec.capacity, &spec.components)?;
        let archetypes = archetype::Registry::new(components.count(), spec.capacity);
        let queries = query::Manager::new(spec.capacity, spec.strict_queries);

        log::info!(
            "created world: capacity={} components={}",
            spec.capacity,
            components.count()
        );

        Ok(Self {
            state: State::Uninitialized,
            pool: entity::Pool::new(spec.capacity),
            components,
            archetypes,
            queries,
            init_hooks: Vec::new(),
            destroy_hooks: Vec::new(),
        })
    }

    /// The lifecycle state.
    #[inline]
    pub fn state(&self) -> State {
        self.state
    }

    /// Number of entity slots.
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.pool.capacity()
    }

    /// Number of registered components.
    #[inline]
    pub fn component_count(&self) -> u32 {
        self.components.count()
    }

    /// Register a hook to run during [`World::init`].
    pub fn on_init(&mut self, hook: impl FnMut() -> Result<()> + 'static) {
        self.init_hooks.push(Box::new(hook));
    }

    /// Register a hook to run during [`World::destroy`].
    pub fn on_destroy(&mut self, hook: impl FnMut() -> Result<()> + 'static) {
        self.destroy_hooks.push(Box::new(hook));
    }

    /// Initialize the world: seat every entity slot in the root archetype,
    /// run the init hooks, and perform a first full refresh.
    ///
    /// A failing hook moves the world to [`State::Error`] and surfaces the
    /// failure.
    pub fn init(&mut self) -> Result<()> {
        self.expect(State::Uninitialized)?;

        self.archetypes.init();

        let mut hooks = std::mem::take(&mut self.init_hooks);
        let outcome = hooks.iter_mut().try_for_each(|hook| hook());
        self.init_hooks = hooks;
        if let Err(err) = outcome {
            log::warn!("init hook failed: {err}");
            self.state = State::Error;
            return Err(err);
        }

        self.state = State::Initialized;
        log::info!("world initialized");
        self.refresh_now(false);
        Ok(())
    }

    /// Destroy the world: run the destroy hooks and drop all archetype and
    /// query state.
    pub fn destroy(&mut self) -> Result<()> {
        self.expect(State::Initialized)?;

        let mut hooks = std::mem::take(&mut self.destroy_hooks);
        let outcome = hooks.iter_mut().try_for_each(|hook| hook());
        self.destroy_hooks = hooks;
        if let Err(err) = outcome {
            log::warn!("destroy hook failed: {err}");
            self.state = State::Error;
            return Err(err);
        }

        self.archetypes.destroy();
        self.queries.destroy();
        self.state = State::Destroyed;
        log::info!("world destroyed");
        Ok(())
    }

    /// End-of-frame maintenance.
    ///
    /// Rebuilds the query↔archetype incidence and bumps the cache version.
    /// With `retain_changes` unset this also clears every archetype's
    /// enter/exit deltas and every component's change bits, closing the
    /// observation window; with it set both delta families survive, which
    /// is how the internal mutation-triggered refreshes keep pending
    /// deltas observable until an explicit refresh.
    pub fn refresh(&mut self, retain_changes: bool) -> Result<()> {
        self.expect(State::Initialized)?;
        self.refresh_now(retain_changes);
        Ok(())
    }

    // ----- entities -------------------------------------------------------

    /// Create an entity in the root archetype.
    ///
    /// Returns `None` when every slot is occupied; capacity exhaustion is
    /// not an error.
    pub fn create_entity(&mut self) -> Option<u32> {
        let entity = self.pool.acquire()?;
        self.archetypes.seat(entity);
        Some(entity)
    }

    /// Destroy an entity: clear its component ownership and change bits,
    /// move it back to the root archetype and release its id for reuse.
    pub fn destroy_entity(&mut self, entity: u32) -> Result<()> {
        self.pool.release(entity)?;

        let owned = self.archetypes.entity_archetype(entity)?.components().to_vec();
        self.components.clear_entity(&owned, entity);
        self.archetypes.reset(entity)?;
        self.queries.invalidate(None);
        Ok(())
    }

    /// Whether the id addresses a live entity.
    #[inline]
    pub fn is_active(&self, entity: u32) -> bool {
        self.pool.is_occupied(entity)
    }

    /// Whether the id is a valid slot at all, live or not.
    #[inline]
    pub fn is_entity(&self, entity: u32) -> bool {
        entity < self.capacity()
    }

    /// Ascending iteration over the live entity ids.
    #[inline]
    pub fn active_entities(&self) -> impl Iterator<Item = u32> + '_ {
        self.pool.occupied()
    }

    /// Number of live entities.
    #[inline]
    pub fn active_count(&self) -> u32 {
        self.pool.occupied_count()
    }

    /// Number of free entity slots.
    #[inline]
    pub fn available_count(&self) -> u32 {
        self.pool.available_count()
    }

    // ----- components -----------------------------------------------------

    /// Give `entity` a component, optionally with initial field data, and
    /// move it to the matching archetype.
    pub fn add_component(
        &mut self,
        component: &Component,
        entity: u32,
        data: Option<&[(&str, Value)]>,
    ) -> Result<()> {
        let current = self.components.add_to_entity(component, entity, data)?;
        self.archetypes.update(entity, &current)?;
        if self.state == State::Initialized {
            self.refresh_now(true);
        }
        Ok(())
    }

    /// Take a component away from `entity` and move it to the matching
    /// archetype.
    pub fn remove_component(&mut self, component: &Component, entity: u32) -> Result<()> {
        let current = self.components.remove_from_entity(component, entity)?;
        self.archetypes.update(entity, &current)?;
        if self.state == State::Initialized {
            self.refresh_now(true);
        }
        Ok(())
    }

    /// Whether `entity` owns the component.
    #[inline]
    pub fn has_component(&self, component: &Component, entity: u32) -> bool {
        self.components.entity_has(component, entity)
    }

    /// Look up a registered component by name.
    #[inline]
    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.by_name(name)
    }

    /// Iterate the registered components in id order.
    #[inline]
    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.descriptors()
    }

    /// Entities whose data for the component changed since the last
    /// non-retaining refresh.
    #[inline]
    pub fn changed_entities(&self, component: &Component) -> Result<impl Iterator<Item = u32> + '_> {
        self.components.changed(component)
    }

    /// Entities owning the component.
    #[inline]
    pub fn component_owners(&self, component: &Component) -> Result<impl Iterator<Item = u32> + '_> {
        self.components.owners(component)
    }

    /// The components an entity owns, read from its archetype.
    pub fn entity_components(&self, entity: u32) -> Result<&[component::Id]> {
        Ok(self.archetypes.entity_archetype(entity)?.components())
    }

    /// Read every field value a component stores for `entity`.
    #[inline]
    pub fn get_entity_data(&self, component: &Component, entity: u32) -> Result<Vec<(String, Value)>> {
        self.components.entity_data(component, entity)
    }

    /// Write field values for `entity` with change tracking: the change
    /// bit is set only when a stored value actually changes.
    #[inline]
    pub fn set_entity_data(
        &mut self,
        component: &Component,
        entity: u32,
        values: &[(&str, Value)],
    ) -> Result<()> {
        self.components.set_entity_data(component, entity, values)
    }

    /// A change-tracking accessor for the component's fields.
    #[inline]
    pub fn proxy(&mut self, component: &Component) -> Result<Proxy<'_>> {
        self.components.proxy(component)
    }

    /// A typed read view of one field column, indexed by entity id. Not
    /// change-tracked.
    #[inline]
    pub fn view<T: Element>(&self, component: &Component, field: &str) -> Result<&[T]> {
        self.components.view(component, field)
    }

    /// A typed write view of one field column. Writes bypass change
    /// tracking; use [`World::proxy`] when change bits matter.
    #[inline]
    pub fn view_mut<T: Element>(&mut self, component: &Component, field: &str) -> Result<&mut [T]> {
        self.components.view_mut(component, field)
    }

    // ----- archetypes and queries ----------------------------------------

    /// The archetype an entity currently belongs to.
    #[inline]
    pub fn entity_archetype(&self, entity: u32) -> Result<&archetype::Archetype> {
        self.archetypes.entity_archetype(entity)
    }

    /// Whether the entity sits in the root archetype (owns no components).
    #[inline]
    pub fn is_in_root(&self, entity: u32) -> Result<bool> {
        self.archetypes.is_in_root(entity)
    }

    /// Register a query, compiling it on first sight.
    ///
    /// While initialized, a newly compiled query triggers a retaining
    /// refresh so its archetype set is populated before first iteration.
    pub fn register_query(&mut self, query: &Query) -> Result<query::Id> {
        let (id, created) = self.queries.register(query, &self.components)?;
        if created && self.state == State::Initialized {
            self.refresh_now(true);
        }
        Ok(id)
    }

    /// The entities matching a query, ascending and free of duplicates.
    pub fn query_entities(&mut self, query: &Query) -> Result<impl Iterator<Item = u32> + '_> {
        let id = self.register_query(query)?;
        Ok(self.queries.entities(id, &self.archetypes).ones())
    }

    /// The frozen name → component map of a query (`all` ∪ `any`).
    pub fn query_components(&mut self, query: &Query) -> Result<&HashMap<String, component::Id>> {
        let id = self.register_query(query)?;
        Ok(self.queries.components_of(id))
    }

    /// Entities that entered the query's matching archetypes since the
    /// last non-retaining refresh.
    pub fn query_entered(&mut self, query: &Query) -> Result<Vec<u32>> {
        let id = self.register_query(query)?;
        Ok(self.queries.entered(id, &self.archetypes))
    }

    /// Entities that left the query's matching archetypes since the last
    /// non-retaining refresh.
    pub fn query_exited(&mut self, query: &Query) -> Result<Vec<u32>> {
        let id = self.register_query(query)?;
        Ok(self.queries.exited(id, &self.archetypes))
    }

    // ----- internals ------------------------------------------------------

    fn refresh_now(&mut self, retain_changes: bool) {
        self.archetypes
            .refresh(self.queries.instances_mut(), !retain_changes);
        if !retain_changes {
            self.components.refresh();
        }
        self.queries.invalidate(None);
    }

    fn expect(&self, expected: State) -> Result<()> {
        if self.state != expected {
            return Err(Error::WorldState {
                expected,
                actual: self.state,
            });
        }
        Ok(())
    }
}
