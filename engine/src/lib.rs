//! A fixed-capacity, data-oriented entity–component–system runtime.
//!
//! State lives in columnar storage: one contiguous buffer partitioned per
//! component, one typed column per schema field. Entities are plain ids;
//! the set of components an entity owns places it in an archetype, and
//! queries match archetypes through three-way component masks (all, any,
//! none) with version-keyed result caching.

pub mod ecs;
