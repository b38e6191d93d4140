//! The world's backing byte buffer, split into per-component partitions.

use crate::ecs::{
    error::{Error, Result},
    storage::{kind_mismatch, require_field, Element, Layout},
};

/// Identifier of a partition within a [`Buffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PartitionId(u32);

impl PartitionId {
    /// Construct a new partition Id from a raw u32 value.
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the index of this Id for use in indexable storage.
    #[inline]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// One partition: a byte range of the buffer plus the layout describing it.
#[derive(Debug)]
struct Partition {
    /// Byte offset of this partition within the buffer. Multiple of 8.
    offset: usize,

    /// The field placements inside this partition.
    layout: Layout,
}

/// One contiguous allocation holding every component column of a world.
///
/// Partitions are carved out sequentially at construction; the layout is
/// fixed thereafter. The backing store is a `u64` slice so the base (and,
/// with partition starts rounded to 8, every column) is aligned for any
/// element type.
#[derive(Debug)]
pub struct Buffer {
    /// The backing allocation.
    words: Box<[u64]>,

    /// The carved partitions, indexed by [`PartitionId`].
    partitions: Vec<Partition>,

    /// Entity slots per column.
    capacity: u32,
}

impl Buffer {
    /// Allocate a buffer for `capacity` entity slots holding one partition
    /// per given layout. The returned partition ids follow layout order.
    pub fn new(capacity: u32, layouts: impl IntoIterator<Item = Layout>) -> Self {
        let mut partitions = Vec::new();
        let mut offset = 0;
        for layout in layouts {
            let size = layout.size(capacity).next_multiple_of(8);
            partitions.push(Partition { offset, layout });
            offset += size;
        }

        Self {
            words: vec![0u64; offset / 8].into_boxed_slice(),
            partitions,
            capacity,
        }
    }

    /// Entity slots per column.
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Total size of the backing allocation in bytes.
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.words.len() * 8
    }

    /// Number of partitions.
    #[inline]
    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// The layout of a partition.
    pub fn layout(&self, partition: PartitionId) -> &Layout {
        &self.partitions[partition.index()].layout
    }

    /// A typed read view of one field column, indexed by entity id.
    ///
    /// Fails if the field does not exist or `T` does not match its element
    /// kind. Reads through the returned slice are not change-tracked.
    pub fn view<T: Element>(&self, partition: PartitionId, field: &str) -> Result<&[T]> {
        let part = self.part(partition)?;
        let field = require_field(&part.layout, field)?;
        if T::KIND != field.kind() {
            return Err(kind_mismatch(field.name(), field.kind(), T::KIND));
        }
        let column = field.column(self.capacity);
        let bytes: &[u8] = bytemuck::cast_slice(&self.words);
        Ok(bytemuck::cast_slice(
            &bytes[part.offset + column.start..part.offset + column.end],
        ))
    }

    /// A typed write view of one field column, indexed by entity id.
    ///
    /// Writes through the returned slice bypass change tracking; use the
    /// component proxy when change bits matter.
    pub fn view_mut<T: Element>(&mut self, partition: PartitionId, field: &str) -> Result<&mut [T]> {
        let part = self
            .partitions
            .get(partition.index())
            .ok_or_else(|| Error::Spec(format!("unknown partition {}", partition.0)))?;
        let field = require_field(&part.layout, field)?;
        if T::KIND != field.kind() {
            return Err(kind_mismatch(field.name(), field.kind(), T::KIND));
        }
        let column = field.column(self.capacity);
        let range = part.offset + column.start..part.offset + column.end;
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut self.words);
        Ok(bytemuck::cast_slice_mut(&mut bytes[range]))
    }

    /// Partition-relative bytes plus layout, read-only.
    pub(crate) fn partition_view(&self, partition: PartitionId) -> (&[u8], &Layout) {
        let part = &self.partitions[partition.index()];
        let size = part.layout.size(self.capacity);
        let bytes: &[u8] = bytemuck::cast_slice(&self.words);
        (&bytes[part.offset..part.offset + size], &part.layout)
    }

    /// Partition-relative bytes plus layout, for the proxy write path.
    pub(crate) fn partition_slot(&mut self, partition: PartitionId) -> (&mut [u8], &Layout) {
        let part = &self.partitions[partition.index()];
        let size = part.layout.size(self.capacity);
        let range = part.offset..part.offset + size;
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut self.words);
        (&mut bytes[range], &part.layout)
    }

    fn part(&self, partition: PartitionId) -> Result<&Partition> {
        self.partitions
            .get(partition.index())
            .ok_or_else(|| Error::Spec(format!("unknown partition {}", partition.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::storage::ElementKind;

    fn buffer() -> Buffer {
        Buffer::new(
            8,
            [
                Layout::new([
                    ("x".to_string(), ElementKind::F32),
                    ("y".to_string(), ElementKind::F32),
                ]),
                Layout::new([
                    ("health".to_string(), ElementKind::U16),
                    ("armor".to_string(), ElementKind::U8),
                ]),
            ],
        )
    }

    #[test]
    fn partitions_are_carved_sequentially() {
        // Given
        let buffer = buffer();

        // Then - 2 f32 columns of 8 slots, then u16 + u8 columns rounded to 8
        assert_eq!(buffer.partition_count(), 2);
        assert_eq!(buffer.byte_len(), 64 + 24);
    }

    #[test]
    fn views_are_indexed_by_entity() {
        // Given
        let mut buffer = buffer();

        // When
        buffer.view_mut::<f32>(PartitionId::new(0), "x").unwrap()[3] = 1.5;
        buffer.view_mut::<u16>(PartitionId::new(1), "health").unwrap()[7] = 100;

        // Then
        assert_eq!(buffer.view::<f32>(PartitionId::new(0), "x").unwrap()[3], 1.5);
        assert_eq!(buffer.view::<f32>(PartitionId::new(0), "y").unwrap()[3], 0.0);
        assert_eq!(
            buffer.view::<u16>(PartitionId::new(1), "health").unwrap()[7],
            100
        );
    }

    #[test]
    fn view_rejects_wrong_element_type() {
        // Given
        let buffer = buffer();

        // Then
        assert!(buffer.view::<u32>(PartitionId::new(0), "x").is_err());
        assert!(buffer.view::<f32>(PartitionId::new(0), "missing").is_err());
    }

    #[test]
    fn partition_slot_exposes_layout_relative_bytes() {
        // Given
        let mut buffer = buffer();

        // When
        let (bytes, layout) = buffer.partition_slot(PartitionId::new(1));

        // Then
        assert_eq!(bytes.len(), layout.size(8));
        assert_eq!(layout.field("armor").unwrap().kind(), ElementKind::U8);
    }
}
