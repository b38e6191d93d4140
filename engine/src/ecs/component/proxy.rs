//! Change-tracked field access for one component.

use crate::ecs::{
    bitset::Bitset,
    error::{Error, Result},
    storage::{kind_mismatch, require_field, Element, Layout, Value},
};

/// A cursor-style accessor over one component's storage.
///
/// The proxy addresses one entity at a time: point it with [`select`],
/// then read or write fields. A write stores the new value and sets the
/// component's change bit for the entity only when the value actually
/// differs from what is stored; rewriting an equal value leaves the
/// change bit alone.
///
/// [`select`]: Proxy::select
#[derive(Debug)]
pub struct Proxy<'a> {
    /// Partition-relative storage bytes.
    bytes: &'a mut [u8],

    /// Field placements for the partition.
    layout: &'a Layout,

    /// The component's change bits.
    changed: &'a mut Bitset,

    /// Entity slots per column.
    capacity: u32,

    /// The entity currently addressed.
    entity: u32,
}

impl<'a> Proxy<'a> {
    pub(crate) fn new(
        bytes: &'a mut [u8],
        layout: &'a Layout,
        changed: &'a mut Bitset,
        capacity: u32,
    ) -> Self {
        Self {
            bytes,
            layout,
            changed,
            capacity,
            entity: 0,
        }
    }

    /// Point the proxy at `entity`.
    ///
    /// Fails with [`Error::EntityNotFound`] when the id is out of range.
    pub fn select(&mut self, entity: u32) -> Result<&mut Self> {
        if entity >= self.capacity {
            return Err(Error::EntityNotFound(entity));
        }
        self.entity = entity;
        Ok(self)
    }

    /// The entity currently addressed.
    #[inline]
    pub fn entity(&self) -> u32 {
        self.entity
    }

    /// Read a field as its static type.
    pub fn get<T: Element>(&self, field: &str) -> Result<T> {
        let field = require_field(self.layout, field)?;
        if T::KIND != field.kind() {
            return Err(kind_mismatch(field.name(), field.kind(), T::KIND));
        }
        let view: &[T] = bytemuck::cast_slice(&self.bytes[field.column(self.capacity)]);
        Ok(view[self.entity as usize])
    }

    /// Write a field as its static type, setting the change bit iff the
    /// stored value differs.
    pub fn set<T: Element>(&mut self, field: &str, value: T) -> Result<()> {
        let field = require_field(self.layout, field)?;
        if T::KIND != field.kind() {
            return Err(kind_mismatch(field.name(), field.kind(), T::KIND));
        }
        let view: &mut [T] = bytemuck::cast_slice_mut(&mut self.bytes[field.column(self.capacity)]);
        let slot = &mut view[self.entity as usize];
        if *slot != value {
            *slot = value;
            self.changed.insert(self.entity);
        }
        Ok(())
    }

    /// Read a field as a runtime-tagged [`Value`].
    pub fn read(&self, field: &str) -> Result<Value> {
        let field = require_field(self.layout, field)?;
        Ok(field.load(self.bytes, self.capacity, self.entity))
    }

    /// Write a runtime-tagged [`Value`], setting the change bit iff the
    /// stored value differs.
    pub fn write(&mut self, field: &str, value: Value) -> Result<()> {
        let field = require_field(self.layout, field)?;
        if field.store(self.bytes, self.capacity, self.entity, value)? {
            self.changed.insert(self.entity);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{
        component::{Component, Registry, Schema},
        storage::ElementKind,
    };

    fn position() -> Component {
        Component::new(
            "position",
            Schema::new()
                .field("x", ElementKind::F32)
                .field("y", ElementKind::F32),
        )
        .unwrap()
    }

    #[test]
    fn select_bounds_check() {
        // Given
        let position = position();
        let mut registry = Registry::new(4, &[position.clone()]).unwrap();
        let mut proxy = registry.proxy(&position).unwrap();

        // Then
        assert!(proxy.select(3).is_ok());
        assert!(matches!(proxy.select(4), Err(Error::EntityNotFound(4))));
    }

    #[test]
    fn write_then_read_round_trip() {
        // Given
        let position = position();
        let mut registry = Registry::new(4, &[position.clone()]).unwrap();

        // When
        {
            let mut proxy = registry.proxy(&position).unwrap();
            proxy.select(2).unwrap();
            proxy.set("x", 1.25f32).unwrap();
            proxy.set("y", -4.5f32).unwrap();

            // Then
            assert_eq!(proxy.get::<f32>("x").unwrap(), 1.25);
            assert_eq!(proxy.get::<f32>("y").unwrap(), -4.5);
            assert_eq!(proxy.read("x").unwrap(), Value::F32(1.25));
        }
        assert_eq!(registry.changed(&position).unwrap().collect::<Vec<_>>(), [2]);
    }

    #[test]
    fn equal_write_does_not_mark_changed() {
        // Given
        let position = position();
        let mut registry = Registry::new(4, &[position.clone()]).unwrap();
        registry.add_to_entity(&position, 0, None).unwrap();
        registry.refresh();

        // When - storage starts zeroed, so writing zero changes nothing
        {
            let mut proxy = registry.proxy(&position).unwrap();
            proxy.select(0).unwrap();
            proxy.set("x", 0.0f32).unwrap();
        }

        // Then
        assert_eq!(registry.changed(&position).unwrap().count(), 0);

        // And When
        {
            let mut proxy = registry.proxy(&position).unwrap();
            proxy.select(0).unwrap();
            proxy.set("x", 1.0f32).unwrap();
        }

        // Then
        assert_eq!(registry.changed(&position).unwrap().collect::<Vec<_>>(), [0]);
    }

    #[test]
    fn wrong_type_and_unknown_field_fail() {
        // Given
        let position = position();
        let mut registry = Registry::new(4, &[position.clone()]).unwrap();
        let mut proxy = registry.proxy(&position).unwrap();

        // Then
        assert!(proxy.get::<u32>("x").is_err());
        assert!(proxy.set("x", 1u8).is_err());
        assert!(proxy.get::<f32>("z").is_err());
        assert!(proxy.write("x", Value::F64(0.0)).is_err());
    }

    #[test]
    fn value_write_tracks_like_typed_write() {
        // Given
        let position = position();
        let mut registry = Registry::new(4, &[position.clone()]).unwrap();
        {
            let mut proxy = registry.proxy(&position).unwrap();
            proxy.select(1).unwrap();

            // When
            proxy.write("y", Value::F32(3.0)).unwrap();
            // Rewriting the same value is a no-op for tracking
            proxy.write("y", Value::F32(3.0)).unwrap();
        }

        // Then
        assert_eq!(registry.changed(&position).unwrap().collect::<Vec<_>>(), [1]);
    }
}
