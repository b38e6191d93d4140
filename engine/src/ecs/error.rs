//! Error types for the ECS.
//!
//! Every fallible operation in the crate returns [`Result`]. The variants map
//! to the distinct failure families of the system: malformed descriptors,
//! out-of-range entities, lifecycle violations, and lookups against
//! components the world was not built with.

use thiserror::Error;

use crate::ecs::world::State;

/// The unified error type for all ECS operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A descriptor or input value violates its construction rules
    /// (reserved names, overlapping query sets, mismatched field types, ...).
    #[error("invalid specification: {0}")]
    Spec(String),

    /// The entity id is outside `[0, capacity)` or does not address an
    /// occupied slot where occupancy is required.
    #[error("entity {0} not found")]
    EntityNotFound(u32),

    /// The world is not in the state the operation requires.
    #[error("world is {actual}, expected {expected}")]
    WorldState {
        /// The state the operation requires.
        expected: State,
        /// The state the world is actually in.
        actual: State,
    },

    /// The named component does not exist in this world.
    #[error("component `{0}` not found")]
    ComponentNotFound(String),

    /// An operation that requires at least one component was given none.
    #[error("no components found: {0}")]
    NoComponentsFound(String),

    /// The component descriptor has no instance registered in this world.
    #[error("component `{0}` is not registered in this world")]
    NotRegistered(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
