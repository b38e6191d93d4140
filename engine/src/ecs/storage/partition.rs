//! Partition layouts: where each schema field lives inside a partition.

use std::ops::Range;

use crate::ecs::{
    error::Result,
    storage::{kind_mismatch, ElementKind, Value},
};

/// One schema field placed inside a partition.
#[derive(Debug, Clone)]
pub struct Field {
    /// The field name.
    name: String,

    /// The element type of the column.
    kind: ElementKind,

    /// Byte offset of this field within one entity's footprint.
    offset: usize,
}

impl Field {
    /// The field name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The element type of the column.
    #[inline]
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Byte offset within one entity's footprint.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Byte range of this field's column within partition-relative bytes,
    /// given the entity capacity of the world.
    #[inline]
    pub(crate) fn column(&self, capacity: u32) -> Range<usize> {
        let start = self.offset * capacity as usize;
        start..start + self.kind.size() * capacity as usize
    }

    /// Read the value stored for `entity` from partition-relative bytes.
    pub(crate) fn load(&self, bytes: &[u8], capacity: u32, entity: u32) -> Value {
        let column = &bytes[self.column(capacity)];
        let index = entity as usize;
        match self.kind {
            ElementKind::I8 => Value::I8(bytemuck::cast_slice(column)[index]),
            ElementKind::U8 => Value::U8(column[index]),
            ElementKind::I16 => Value::I16(bytemuck::cast_slice(column)[index]),
            ElementKind::U16 => Value::U16(bytemuck::cast_slice(column)[index]),
            ElementKind::I32 => Value::I32(bytemuck::cast_slice(column)[index]),
            ElementKind::U32 => Value::U32(bytemuck::cast_slice(column)[index]),
            ElementKind::F32 => Value::F32(bytemuck::cast_slice(column)[index]),
            ElementKind::F64 => Value::F64(bytemuck::cast_slice(column)[index]),
        }
    }

    /// Store `value` for `entity` into partition-relative bytes.
    ///
    /// Returns whether the stored value actually changed, so callers can
    /// maintain change bits. Fails if the value's kind does not match the
    /// field's.
    pub(crate) fn store(
        &self,
        bytes: &mut [u8],
        capacity: u32,
        entity: u32,
        value: Value,
    ) -> Result<bool> {
        if value.kind() != self.kind {
            return Err(kind_mismatch(&self.name, self.kind, value.kind()));
        }
        let column = &mut bytes[self.column(capacity)];
        let index = entity as usize;

        macro_rules! put {
            ($ty:ty, $new:expr) => {{
                let view: &mut [$ty] = bytemuck::cast_slice_mut(column);
                let changed = view[index] != $new;
                view[index] = $new;
                changed
            }};
        }

        Ok(match value {
            Value::I8(v) => put!(i8, v),
            Value::U8(v) => put!(u8, v),
            Value::I16(v) => put!(i16, v),
            Value::U16(v) => put!(u16, v),
            Value::I32(v) => put!(i32, v),
            Value::U32(v) => put!(u32, v),
            Value::F32(v) => put!(f32, v),
            Value::F64(v) => put!(f64, v),
        })
    }
}

/// The layout of one partition: field placements plus the per-entity
/// footprint in bytes.
///
/// Fields are placed widest-first. Since element sizes are powers of two,
/// every field offset (and thus every column start, once multiplied by the
/// capacity) stays aligned for its element type.
#[derive(Debug, Clone)]
pub struct Layout {
    /// Placed fields, widest first.
    fields: Vec<Field>,

    /// Total bytes one entity occupies across all fields.
    footprint: usize,
}

impl Layout {
    /// Compute the layout for the given `(name, kind)` fields.
    ///
    /// Field names must already be validated and unique; order between
    /// fields of equal width follows the given order.
    pub fn new(fields: impl IntoIterator<Item = (String, ElementKind)>) -> Self {
        let mut fields: Vec<(String, ElementKind)> = fields.into_iter().collect();
        fields.sort_by(|a, b| b.1.size().cmp(&a.1.size()));

        let mut placed = Vec::with_capacity(fields.len());
        let mut offset = 0;
        for (name, kind) in fields {
            placed.push(Field { name, kind, offset });
            offset += kind.size();
        }

        Self {
            fields: placed,
            footprint: offset,
        }
    }

    /// The placed fields, widest first.
    #[inline]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Total bytes one entity occupies across all fields.
    #[inline]
    pub fn footprint(&self) -> usize {
        self.footprint
    }

    /// Total bytes this partition occupies for `capacity` entities.
    #[inline]
    pub fn size(&self, capacity: u32) -> usize {
        self.footprint * capacity as usize
    }
}
