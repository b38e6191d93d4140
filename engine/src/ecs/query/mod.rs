//! Queries: immutable three-way predicates over component sets.
//!
//! A [`Query`] names components an entity must have all of, at least one
//! of, and none of. Worlds compile queries into [`Instance`]s (three
//! bitmasks plus the set of matching archetypes) via the [`Manager`],
//! which also caches results behind a version counter so repeated
//! iteration between mutations costs nothing.

mod instance;
mod manager;

pub use instance::Instance;
pub use manager::Manager;

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use crate::ecs::{
    component::Component,
    error::{Error, Result},
};

/// Source of process-unique query identities.
static NEXT_UID: AtomicU64 = AtomicU64::new(1);

/// A query instance identifier, dense within one world.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id(u32);

impl Id {
    /// Construct a new query Id from a raw u32 value.
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

/// The predicate sets a [`Query`] is built from.
#[derive(Debug, Clone, Default)]
pub struct Spec {
    /// Components every matching entity must own.
    pub all: Vec<Component>,

    /// Components of which a matching entity must own at least one.
    /// Empty means no constraint.
    pub any: Vec<Component>,

    /// Components no matching entity may own.
    pub none: Vec<Component>,
}

#[derive(Debug)]
struct Inner {
    uid: u64,
    all: Vec<Component>,
    any: Vec<Component>,
    none: Vec<Component>,
}

/// A shared, immutable query descriptor.
///
/// Cloning is cheap; all clones refer to the same query. Duplicates within
/// one set are dropped at construction; a component listed in two sets or
/// a query with all three sets empty is rejected.
#[derive(Debug, Clone)]
pub struct Query {
    inner: Arc<Inner>,
}

impl Query {
    /// Validate and build a query from its predicate sets.
    pub fn new(spec: Spec) -> Result<Self> {
        let all = dedup(spec.all);
        let any = dedup(spec.any);
        let none = dedup(spec.none);

        if all.is_empty() && any.is_empty() && none.is_empty() {
            return Err(Error::NoComponentsFound(
                "a query needs at least one component in all, any or none".to_string(),
            ));
        }

        for component in &all {
            if any.contains(component) || none.contains(component) {
                return Err(overlap(component));
            }
        }
        for component in &any {
            if none.contains(component) {
                return Err(overlap(component));
            }
        }

        Ok(Self {
            inner: Arc::new(Inner {
                uid: NEXT_UID.fetch_add(1, Ordering::Relaxed),
                all,
                any,
                none,
            }),
        })
    }

    /// Components every matching entity must own.
    #[inline]
    pub fn all(&self) -> &[Component] {
        &self.inner.all
    }

    /// Components of which a matching entity must own at least one.
    #[inline]
    pub fn any(&self) -> &[Component] {
        &self.inner.any
    }

    /// Components no matching entity may own.
    #[inline]
    pub fn none(&self) -> &[Component] {
        &self.inner.none
    }

    /// The process-unique query identity.
    #[inline]
    pub(crate) fn uid(&self) -> u64 {
        self.inner.uid
    }
}

impl PartialEq for Query {
    fn eq(&self, other: &Self) -> bool {
        self.inner.uid == other.inner.uid
    }
}

impl Eq for Query {}

fn dedup(components: Vec<Component>) -> Vec<Component> {
    let mut out: Vec<Component> = Vec::with_capacity(components.len());
    for component in components {
        if !out.contains(&component) {
            out.push(component);
        }
    }
    out
}

fn overlap(component: &Component) -> Error {
    Error::Spec(format!(
        "component `{}` appears in more than one query set",
        component.name()
    ))
}
