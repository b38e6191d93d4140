//! Columnar storage for component field data.
//!
//! All numeric component data in a world lives in one contiguous
//! [`Buffer`], subdivided into per-component partitions. Each partition is
//! laid out struct-of-arrays: one typed column of `capacity` elements per
//! schema field. Columns are exposed as plain slices via [`bytemuck`]
//! casts, so reads and writes are ordinary array indexing by entity id.
//!
//! The module also defines the eight element kinds a schema field may
//! have, the [`Element`] trait tying them to their Rust types, and
//! [`Value`], the runtime-tagged form values take when crossing the
//! dynamic parts of the API.

mod buffer;
mod partition;

pub use buffer::{Buffer, PartitionId};
pub use partition::{Field, Layout};

use bytemuck::Pod;

use crate::ecs::error::{Error, Result};

/// The element type of one schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// Signed 8-bit integer.
    I8,
    /// Unsigned 8-bit integer.
    U8,
    /// Signed 16-bit integer.
    I16,
    /// Unsigned 16-bit integer.
    U16,
    /// Signed 32-bit integer.
    I32,
    /// Unsigned 32-bit integer.
    U32,
    /// 32-bit float.
    F32,
    /// 64-bit float.
    F64,
}

impl ElementKind {
    /// Size of one element in bytes. Also its alignment.
    #[inline]
    pub const fn size(self) -> usize {
        match self {
            ElementKind::I8 | ElementKind::U8 => 1,
            ElementKind::I16 | ElementKind::U16 => 2,
            ElementKind::I32 | ElementKind::U32 | ElementKind::F32 => 4,
            ElementKind::F64 => 8,
        }
    }

    /// The lowercase tag name of this kind.
    pub const fn name(self) -> &'static str {
        match self {
            ElementKind::I8 => "i8",
            ElementKind::U8 => "u8",
            ElementKind::I16 => "i16",
            ElementKind::U16 => "u16",
            ElementKind::I32 => "i32",
            ElementKind::U32 => "u32",
            ElementKind::F32 => "f32",
            ElementKind::F64 => "f64",
        }
    }
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A Rust type usable as a schema field element.
pub trait Element: Pod + PartialEq {
    /// The kind tag corresponding to this type.
    const KIND: ElementKind;
}

macro_rules! element {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const KIND: ElementKind = ElementKind::$kind;
            }
        )*
    };
}

element!(
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    f32 => F32,
    f64 => F64,
);

/// A runtime-tagged field value.
///
/// Used where field types are only known at runtime: initial component
/// data, the whole-component data getters/setters, and the untyped proxy
/// read/write path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// Signed 8-bit integer.
    I8(i8),
    /// Unsigned 8-bit integer.
    U8(u8),
    /// Signed 16-bit integer.
    I16(i16),
    /// Unsigned 16-bit integer.
    U16(u16),
    /// Signed 32-bit integer.
    I32(i32),
    /// Unsigned 32-bit integer.
    U32(u32),
    /// 32-bit float.
    F32(f32),
    /// 64-bit float.
    F64(f64),
}

impl Value {
    /// The kind tag of this value.
    #[inline]
    pub const fn kind(&self) -> ElementKind {
        match self {
            Value::I8(_) => ElementKind::I8,
            Value::U8(_) => ElementKind::U8,
            Value::I16(_) => ElementKind::I16,
            Value::U16(_) => ElementKind::U16,
            Value::I32(_) => ElementKind::I32,
            Value::U32(_) => ElementKind::U32,
            Value::F32(_) => ElementKind::F32,
            Value::F64(_) => ElementKind::F64,
        }
    }
}

/// Build the error for a field accessed with the wrong element type.
pub(crate) fn kind_mismatch(field: &str, expected: ElementKind, actual: ElementKind) -> Error {
    Error::Spec(format!("field `{field}` holds {expected}, not {actual}"))
}

/// Look up `field` in `layout` or fail.
pub(crate) fn require_field<'a>(layout: &'a Layout, field: &str) -> Result<&'a Field> {
    layout
        .field(field)
        .ok_or_else(|| Error::Spec(format!("unknown field `{field}`")))
}
