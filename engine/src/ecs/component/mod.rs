//! Component descriptors and their per-world registration.
//!
//! A [`Component`] is a shared, immutable descriptor: a unique name, an
//! optional [`Schema`] of numeric fields, and an advisory entity cap. A
//! descriptor without a schema is a *tag*: it carries an ownership bit
//! per entity and nothing else. Descriptors can be referenced by several
//! worlds; each world binds them to its own dense [`Id`]s, storage
//! partition, and ownership/change bitsets via the [`Registry`].

mod proxy;
mod registry;

pub use proxy::Proxy;
pub use registry::Registry;

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use crate::ecs::{
    error::{Error, Result},
    storage::ElementKind,
};

/// Names that cannot be used for components or schema fields. `id` is the
/// entity key itself; the other three name the partition handle and the
/// lifecycle hook slots.
pub const RESERVED_NAMES: [&str; 4] = ["id", "partition", "init", "destroy"];

/// Source of process-unique descriptor ids.
static NEXT_UID: AtomicU64 = AtomicU64::new(1);

/// A component identifier, dense within one world.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id(u32);

impl Id {
    /// Construct a new component Id from a raw u32 value.
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the index of this Id for use in indexable storage (e.g. Vec).
    #[inline]
    pub fn index(&self) -> usize {
        self.0 as usize
    }

    /// Get the raw id value.
    #[inline]
    pub const fn id(&self) -> u32 {
        self.0
    }
}

impl From<u32> for Id {
    #[inline]
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

/// An ordered set of named numeric fields.
///
/// Built with chained [`Schema::field`] calls; names are validated when
/// the schema is handed to a [`Component`] constructor.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<(String, ElementKind)>,
}

impl Schema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field.
    pub fn field(mut self, name: impl Into<String>, kind: ElementKind) -> Self {
        self.fields.push((name.into(), kind));
        self
    }

    /// The declared fields, in declaration order.
    #[inline]
    pub fn fields(&self) -> &[(String, ElementKind)] {
        &self.fields
    }

    /// Number of declared fields.
    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no field was declared.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Debug)]
struct Inner {
    uid: u64,
    name: String,
    schema: Option<Schema>,
    max_entities: Option<u32>,
}

/// A shared, immutable component descriptor.
///
/// Cloning is cheap; all clones refer to the same descriptor and compare
/// equal. Equality is identity, not structure: two descriptors built from
/// the same name and schema are still distinct components.
#[derive(Debug, Clone)]
pub struct Component {
    inner: Arc<Inner>,
}

impl Component {
    /// Create a component with stored fields.
    pub fn new(name: impl Into<String>, schema: Schema) -> Result<Self> {
        Self::create(name.into(), Some(schema), None)
    }

    /// Create a tag component: ownership bit only, no storage.
    pub fn tag(name: impl Into<String>) -> Result<Self> {
        Self::create(name.into(), None, None)
    }

    /// Create a component with an advisory cap on owning entities.
    ///
    /// The cap is recorded, not enforced: adds beyond it succeed and are
    /// logged.
    pub fn capped(
        name: impl Into<String>,
        schema: Option<Schema>,
        max_entities: u32,
    ) -> Result<Self> {
        Self::create(name.into(), schema, Some(max_entities))
    }

    fn create(name: String, schema: Option<Schema>, max_entities: Option<u32>) -> Result<Self> {
        validate_name("component", &name)?;
        if let Some(schema) = &schema {
            if schema.is_empty() {
                return Err(Error::Spec(format!(
                    "component `{name}` declares an empty schema; use a tag instead"
                )));
            }
            for (index, (field, _)) in schema.fields().iter().enumerate() {
                validate_name("field", field)?;
                if schema.fields()[..index].iter().any(|(other, _)| other == field) {
                    return Err(Error::Spec(format!(
                        "component `{name}` declares field `{field}` twice"
                    )));
                }
            }
        }

        Ok(Self {
            inner: Arc::new(Inner {
                uid: NEXT_UID.fetch_add(1, Ordering::Relaxed),
                name,
                schema,
                max_entities,
            }),
        })
    }

    /// The component name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The field schema, if the component stores data.
    #[inline]
    pub fn schema(&self) -> Option<&Schema> {
        self.inner.schema.as_ref()
    }

    /// The advisory cap on owning entities, if any.
    #[inline]
    pub fn max_entities(&self) -> Option<u32> {
        self.inner.max_entities
    }

    /// Whether this component is a tag (no stored fields).
    #[inline]
    pub fn is_tag(&self) -> bool {
        self.inner.schema.is_none()
    }

    /// The process-unique descriptor identity.
    #[inline]
    pub(crate) fn uid(&self) -> u64 {
        self.inner.uid
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        self.inner.uid == other.inner.uid
    }
}

impl Eq for Component {}

impl std::hash::Hash for Component {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.inner.uid.hash(state);
    }
}

fn validate_name(what: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Spec(format!("{what} name must not be empty")));
    }
    if RESERVED_NAMES.contains(&name) {
        return Err(Error::Spec(format!("{what} name `{name}` is reserved")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_has_no_schema() {
        // Given
        let frozen = Component::tag("frozen").unwrap();

        // Then
        assert!(frozen.is_tag());
        assert!(frozen.schema().is_none());
        assert_eq!(frozen.name(), "frozen");
    }

    #[test]
    fn schema_component_keeps_declaration_order() {
        // Given
        let position = Component::new(
            "position",
            Schema::new()
                .field("x", ElementKind::F32)
                .field("y", ElementKind::F32),
        )
        .unwrap();

        // Then
        let schema = position.schema().unwrap();
        assert_eq!(schema.len(), 2);
        assert_eq!(schema.fields()[0].0, "x");
        assert_eq!(schema.fields()[1].0, "y");
    }

    #[test]
    fn reserved_names_are_rejected() {
        // Then
        assert!(Component::tag("id").is_err());
        assert!(Component::tag("partition").is_err());
        assert!(Component::tag("init").is_err());
        assert!(Component::tag("destroy").is_err());
        assert!(Component::tag("").is_err());
        assert!(Component::new("pos", Schema::new().field("id", ElementKind::F32)).is_err());
    }

    #[test]
    fn empty_schema_is_rejected() {
        assert!(Component::new("empty", Schema::new()).is_err());
    }

    #[test]
    fn duplicate_fields_are_rejected() {
        let schema = Schema::new()
            .field("x", ElementKind::F32)
            .field("x", ElementKind::F64);
        assert!(Component::new("pos", schema).is_err());
    }

    #[test]
    fn equality_is_identity() {
        // Given - two descriptors with identical shape
        let a = Component::tag("marker").unwrap();
        let b = Component::tag("marker").unwrap();

        // Then
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn capped_records_the_cap() {
        // Given
        let rare = Component::capped("rare", None, 4).unwrap();

        // Then
        assert_eq!(rare.max_entities(), Some(4));
        assert!(rare.is_tag());
    }
}
