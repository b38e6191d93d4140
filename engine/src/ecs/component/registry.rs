//! Per-world component registration, ownership and change tracking.

use std::collections::HashMap;

use crate::ecs::{
    bitset::Bitset,
    component::{Component, Id, Proxy},
    error::{Error, Result},
    storage::{require_field, Buffer, Element, Layout, PartitionId, Value},
};

/// The world-local binding of one descriptor.
#[derive(Debug)]
struct Entry {
    /// The shared descriptor this entry binds.
    descriptor: Component,

    /// The storage partition, absent for tags.
    partition: Option<PartitionId>,

    /// Bit set per entity that owns this component.
    owners: Bitset,

    /// Bit set per entity whose data changed since the last refresh.
    changed: Bitset,
}

/// Registry of the components a world was built with.
///
/// Assigns each descriptor a dense [`Id`] in registration order, owns the
/// partitioned [`Buffer`] holding all field columns, and tracks per-entity
/// ownership and change bits per component. The registered set is fixed
/// for the lifetime of the world.
#[derive(Debug)]
pub struct Registry {
    /// Entity slots per component.
    capacity: u32,

    /// The backing storage for every non-tag component.
    buffer: Buffer,

    /// The registered components, indexed by [`Id`].
    entries: Vec<Entry>,

    /// Name → dense id.
    by_name: HashMap<String, Id>,

    /// Descriptor identity → dense id.
    by_uid: HashMap<u64, Id>,
}

impl Registry {
    /// Bind the given descriptors to a new registry of `capacity` slots.
    ///
    /// Ids are assigned in the order given. Fails if the list is empty,
    /// contains the same descriptor twice, or contains two descriptors
    /// with the same name.
    pub fn new(capacity: u32, components: &[Component]) -> Result<Self> {
        if components.is_empty() {
            return Err(Error::NoComponentsFound(
                "a world requires at least one component".to_string(),
            ));
        }

        let mut by_name = HashMap::with_capacity(components.len());
        let mut by_uid = HashMap::with_capacity(components.len());
        let mut entries = Vec::with_capacity(components.len());
        let mut layouts = Vec::new();

        for (index, component) in components.iter().enumerate() {
            let id = Id::new(index as u32);
            if by_uid.insert(component.uid(), id).is_some() {
                return Err(Error::Spec(format!(
                    "component `{}` is registered twice",
                    component.name()
                )));
            }
            if by_name.insert(component.name().to_string(), id).is_some() {
                return Err(Error::Spec(format!(
                    "duplicate component name `{}`",
                    component.name()
                )));
            }

            let partition = component.schema().map(|schema| {
                layouts.push(Layout::new(schema.fields().iter().cloned()));
                PartitionId::new(layouts.len() as u32 - 1)
            });

            entries.push(Entry {
                descriptor: component.clone(),
                partition,
                owners: Bitset::new(capacity),
                changed: Bitset::new(capacity),
            });
        }

        Ok(Self {
            capacity,
            buffer: Buffer::new(capacity, layouts),
            entries,
            by_name,
            by_uid,
        })
    }

    /// Number of registered components.
    #[inline]
    pub fn count(&self) -> u32 {
        self.entries.len() as u32
    }

    /// Entity slots per component.
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Resolve a descriptor to its dense id in this world.
    pub fn id_of(&self, component: &Component) -> Result<Id> {
        self.by_uid
            .get(&component.uid())
            .copied()
            .ok_or_else(|| Error::NotRegistered(component.name().to_string()))
    }

    /// Resolve a descriptor to its dense id, if registered.
    #[inline]
    pub fn lookup(&self, component: &Component) -> Option<Id> {
        self.by_uid.get(&component.uid()).copied()
    }

    /// Look up a registered component by name.
    pub fn by_name(&self, name: &str) -> Option<&Component> {
        self.by_name
            .get(name)
            .map(|id| &self.entries[id.index()].descriptor)
    }

    /// The descriptor registered under `id`.
    #[inline]
    pub fn descriptor(&self, id: Id) -> &Component {
        &self.entries[id.index()].descriptor
    }

    /// Iterate the registered descriptors in id order.
    pub fn descriptors(&self) -> impl Iterator<Item = &Component> {
        self.entries.iter().map(|entry| &entry.descriptor)
    }

    /// Give `entity` the component, optionally writing initial field data.
    ///
    /// Sets the ownership and change bits and returns the entity's current
    /// component list, recomputed from the ownership bits.
    pub fn add_to_entity(
        &mut self,
        component: &Component,
        entity: u32,
        data: Option<&[(&str, Value)]>,
    ) -> Result<Vec<Id>> {
        let id = self.id_of(component)?;
        if entity >= self.capacity {
            return Err(Error::EntityNotFound(entity));
        }

        if let Some(values) = data {
            match self.entries[id.index()].partition {
                Some(partition) => {
                    let (bytes, layout) = self.buffer.partition_slot(partition);
                    for (name, value) in values {
                        let field = require_field(layout, name)?;
                        field.store(bytes, self.capacity, entity, *value)?;
                    }
                }
                None => {
                    return Err(Error::Spec(format!(
                        "tag component `{}` stores no data",
                        component.name()
                    )));
                }
            }
        }

        let entry = &mut self.entries[id.index()];
        entry.owners.insert(entity);
        entry.changed.insert(entity);

        if let Some(cap) = entry.descriptor.max_entities() {
            let owned = entry.owners.count_ones();
            if owned > cap {
                log::warn!(
                    "component `{}` now owned by {owned} entities, over its advisory cap of {cap}",
                    entry.descriptor.name()
                );
            }
        }

        Ok(self.components_of(entity))
    }

    /// Take the component away from `entity`.
    ///
    /// Clears the ownership and change bits for this component and returns
    /// the entity's remaining component list. Stored field data is left in
    /// place and reclaimed on the next write.
    pub fn remove_from_entity(&mut self, component: &Component, entity: u32) -> Result<Vec<Id>> {
        let id = self.id_of(component)?;
        if entity >= self.capacity {
            return Err(Error::EntityNotFound(entity));
        }

        let entry = &mut self.entries[id.index()];
        entry.owners.remove(entity);
        entry.changed.remove(entity);

        Ok(self.components_of(entity))
    }

    /// Whether `entity` owns the component. Unknown descriptors own nothing.
    pub fn entity_has(&self, component: &Component, entity: u32) -> bool {
        self.lookup(component)
            .is_some_and(|id| self.entries[id.index()].owners.get(entity))
    }

    /// Entities whose data for the component changed since the last refresh.
    pub fn changed(&self, component: &Component) -> Result<impl Iterator<Item = u32> + '_> {
        let id = self.id_of(component)?;
        Ok(self.entries[id.index()].changed.ones())
    }

    /// Entities owning the component.
    pub fn owners(&self, component: &Component) -> Result<impl Iterator<Item = u32> + '_> {
        let id = self.id_of(component)?;
        Ok(self.entries[id.index()].owners.ones())
    }

    /// The entity's component list, recomputed from the ownership bits.
    ///
    /// This is the slow path; when an up-to-date archetype is at hand its
    /// component list answers the same question without the scan.
    pub fn components_of(&self, entity: u32) -> Vec<Id> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.owners.get(entity))
            .map(|(index, _)| Id::new(index as u32))
            .collect()
    }

    /// Clear ownership and change bits of the given components for `entity`.
    pub fn clear_entity(&mut self, ids: &[Id], entity: u32) {
        for id in ids {
            let entry = &mut self.entries[id.index()];
            entry.owners.remove(entity);
            entry.changed.remove(entity);
        }
    }

    /// Clear every component's change bits.
    pub fn refresh(&mut self) {
        for entry in &mut self.entries {
            entry.changed.clear();
        }
    }

    /// A change-tracking accessor for the component's fields.
    ///
    /// The proxy starts at entity 0; move it with [`Proxy::select`]. Tags
    /// have no storage and cannot be proxied.
    pub fn proxy(&mut self, component: &Component) -> Result<Proxy<'_>> {
        let id = self.id_of(component)?;
        let Some(partition) = self.entries[id.index()].partition else {
            return Err(Error::Spec(format!(
                "tag component `{}` has no storage to proxy",
                component.name()
            )));
        };

        let capacity = self.capacity;
        let entry = &mut self.entries[id.index()];
        let (bytes, layout) = self.buffer.partition_slot(partition);
        Ok(Proxy::new(bytes, layout, &mut entry.changed, capacity))
    }

    /// Read every field value the component stores for `entity`.
    ///
    /// Tags yield an empty list. Field order follows the storage layout.
    pub fn entity_data(&self, component: &Component, entity: u32) -> Result<Vec<(String, Value)>> {
        let id = self.id_of(component)?;
        if entity >= self.capacity {
            return Err(Error::EntityNotFound(entity));
        }

        let Some(partition) = self.entries[id.index()].partition else {
            return Ok(Vec::new());
        };
        let (bytes, layout) = self.buffer.partition_view(partition);
        Ok(layout
            .fields()
            .iter()
            .map(|field| {
                (
                    field.name().to_string(),
                    field.load(bytes, self.capacity, entity),
                )
            })
            .collect())
    }

    /// Write field values for `entity` with proxy semantics: the change
    /// bit is set only if some stored value actually changed.
    ///
    /// Ownership is not required; writing to a slot the entity does not
    /// own is permitted and only touches storage.
    pub fn set_entity_data(
        &mut self,
        component: &Component,
        entity: u32,
        values: &[(&str, Value)],
    ) -> Result<()> {
        let id = self.id_of(component)?;
        if entity >= self.capacity {
            return Err(Error::EntityNotFound(entity));
        }

        let Some(partition) = self.entries[id.index()].partition else {
            return Err(Error::Spec(format!(
                "tag component `{}` stores no data",
                component.name()
            )));
        };

        let (bytes, layout) = self.buffer.partition_slot(partition);
        let mut dirty = false;
        for (name, value) in values {
            let field = require_field(layout, name)?;
            if field.store(bytes, self.capacity, entity, *value)? {
                dirty = true;
            }
        }
        if dirty {
            self.entries[id.index()].changed.insert(entity);
        }
        Ok(())
    }

    /// A typed read view of one field column. Not change-tracked.
    pub fn view<T: Element>(&self, component: &Component, field: &str) -> Result<&[T]> {
        let id = self.id_of(component)?;
        let Some(partition) = self.entries[id.index()].partition else {
            return Err(Error::Spec(format!(
                "tag component `{}` has no storage",
                component.name()
            )));
        };
        self.buffer.view(partition, field)
    }

    /// A typed write view of one field column.
    ///
    /// Writes through the view bypass change tracking. Use [`Registry::proxy`]
    /// when change bits matter.
    pub fn view_mut<T: Element>(&mut self, component: &Component, field: &str) -> Result<&mut [T]> {
        let id = self.id_of(component)?;
        let Some(partition) = self.entries[id.index()].partition else {
            return Err(Error::Spec(format!(
                "tag component `{}` has no storage",
                component.name()
            )));
        };
        self.buffer.view_mut(partition, field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{component::Schema, storage::ElementKind};

    fn position() -> Component {
        Component::new(
            "position",
            Schema::new()
                .field("x", ElementKind::F32)
                .field("y", ElementKind::F32),
        )
        .unwrap()
    }

    fn registry(components: &[Component]) -> Registry {
        Registry::new(8, components).unwrap()
    }

    #[test]
    fn registration_assigns_dense_ids() {
        // Given
        let position = position();
        let frozen = Component::tag("frozen").unwrap();
        let registry = registry(&[position.clone(), frozen.clone()]);

        // Then
        assert_eq!(registry.count(), 2);
        assert_eq!(registry.id_of(&position).unwrap(), Id::new(0));
        assert_eq!(registry.id_of(&frozen).unwrap(), Id::new(1));
        assert_eq!(registry.by_name("frozen").unwrap(), &frozen);
        assert!(registry.by_name("missing").is_none());
    }

    #[test]
    fn unknown_descriptor_is_not_registered() {
        // Given
        let registry = registry(&[position()]);
        let stranger = Component::tag("stranger").unwrap();

        // Then
        assert!(matches!(
            registry.id_of(&stranger),
            Err(Error::NotRegistered(_))
        ));
        assert!(!registry.entity_has(&stranger, 0));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        // Given
        let position = position();

        // Then
        assert!(Registry::new(8, &[position.clone(), position.clone()]).is_err());
        assert!(Registry::new(8, &[]).is_err());
    }

    #[test]
    fn add_sets_owner_and_changed_bits() {
        // Given
        let position = position();
        let mut registry = registry(&[position.clone()]);

        // When
        let current = registry.add_to_entity(&position, 3, None).unwrap();

        // Then
        assert_eq!(current, vec![Id::new(0)]);
        assert!(registry.entity_has(&position, 3));
        assert_eq!(registry.changed(&position).unwrap().collect::<Vec<_>>(), [3]);
        assert_eq!(registry.owners(&position).unwrap().collect::<Vec<_>>(), [3]);
    }

    #[test]
    fn add_with_data_writes_fields() {
        // Given
        let position = position();
        let mut registry = registry(&[position.clone()]);

        // When
        registry
            .add_to_entity(
                &position,
                2,
                Some(&[("x", Value::F32(1.5)), ("y", Value::F32(-2.0))]),
            )
            .unwrap();

        // Then
        let data = registry.entity_data(&position, 2).unwrap();
        assert!(data.contains(&("x".to_string(), Value::F32(1.5))));
        assert!(data.contains(&("y".to_string(), Value::F32(-2.0))));
    }

    #[test]
    fn add_data_to_tag_fails() {
        // Given
        let frozen = Component::tag("frozen").unwrap();
        let mut registry = registry(&[frozen.clone()]);

        // Then
        assert!(registry
            .add_to_entity(&frozen, 0, Some(&[("x", Value::F32(0.0))]))
            .is_err());
        assert!(registry.add_to_entity(&frozen, 0, None).is_ok());
    }

    #[test]
    fn remove_clears_bits_but_not_storage() {
        // Given
        let position = position();
        let mut registry = registry(&[position.clone()]);
        registry
            .add_to_entity(&position, 1, Some(&[("x", Value::F32(4.0))]))
            .unwrap();

        // When
        let remaining = registry.remove_from_entity(&position, 1).unwrap();

        // Then
        assert!(remaining.is_empty());
        assert!(!registry.entity_has(&position, 1));
        assert_eq!(registry.changed(&position).unwrap().count(), 0);
        // Storage is reclaimed lazily, not zeroed
        let data = registry.entity_data(&position, 1).unwrap();
        assert!(data.contains(&("x".to_string(), Value::F32(4.0))));
    }

    #[test]
    fn refresh_clears_change_bits() {
        // Given
        let position = position();
        let mut registry = registry(&[position.clone()]);
        registry.add_to_entity(&position, 0, None).unwrap();
        registry.add_to_entity(&position, 5, None).unwrap();

        // When
        registry.refresh();

        // Then
        assert_eq!(registry.changed(&position).unwrap().count(), 0);
        assert!(registry.entity_has(&position, 0));
    }

    #[test]
    fn set_entity_data_marks_changed_only_on_real_change() {
        // Given
        let position = position();
        let mut registry = registry(&[position.clone()]);
        registry.add_to_entity(&position, 0, None).unwrap();
        registry.refresh();

        // When - write the value already stored
        registry
            .set_entity_data(&position, 0, &[("x", Value::F32(0.0))])
            .unwrap();

        // Then
        assert_eq!(registry.changed(&position).unwrap().count(), 0);

        // And When - an actual change
        registry
            .set_entity_data(&position, 0, &[("x", Value::F32(9.0))])
            .unwrap();

        // Then
        assert_eq!(registry.changed(&position).unwrap().collect::<Vec<_>>(), [0]);
    }

    #[test]
    fn out_of_range_entity_is_rejected() {
        // Given
        let position = position();
        let mut registry = registry(&[position.clone()]);

        // Then
        assert!(matches!(
            registry.add_to_entity(&position, 8, None),
            Err(Error::EntityNotFound(8))
        ));
        assert!(registry.entity_data(&position, 9).is_err());
    }

    #[test]
    fn direct_views_bypass_change_tracking() {
        // Given
        let position = position();
        let mut registry = registry(&[position.clone()]);
        registry.add_to_entity(&position, 0, None).unwrap();
        registry.refresh();

        // When
        registry.view_mut::<f32>(&position, "x").unwrap()[0] = 7.0;

        // Then
        assert_eq!(registry.view::<f32>(&position, "x").unwrap()[0], 7.0);
        assert_eq!(registry.changed(&position).unwrap().count(), 0);
    }

    #[test]
    fn components_of_scans_owner_bits() {
        // Given
        let position = position();
        let frozen = Component::tag("frozen").unwrap();
        let mut registry = registry(&[position.clone(), frozen.clone()]);
        registry.add_to_entity(&position, 4, None).unwrap();
        registry.add_to_entity(&frozen, 4, None).unwrap();
        registry.add_to_entity(&frozen, 2, None).unwrap();

        // Then
        assert_eq!(registry.components_of(4), vec![Id::new(0), Id::new(1)]);
        assert_eq!(registry.components_of(2), vec![Id::new(1)]);
        assert!(registry.components_of(0).is_empty());
    }
}
