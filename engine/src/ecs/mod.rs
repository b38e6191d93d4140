pub mod archetype;
pub mod bitset;
pub mod component;
pub mod entity;
pub mod error;
pub mod query;
pub mod storage;
pub mod world;

pub use bitset::Bitset;
pub use component::{Component, Schema};
pub use error::{Error, Result};
pub use query::Query;
pub use storage::{ElementKind, Value};
pub use world::World;
