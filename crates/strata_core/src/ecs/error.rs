//! # Store Error Types
//!
//! Recoverable failures of the store. Contract violations (reading a
//! component that is not there through the panicking accessors, aliasing
//! mutable query fetches) panic instead.

use thiserror::Error;

use super::Entity;

/// Errors reported by the fallible store accessors and config loading.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// The handle is not alive (never issued, destroyed, or stale).
    #[error("entity {0} is not alive")]
    DeadEntity(Entity),

    /// The entity is alive but does not carry the requested component.
    #[error("entity {entity} has no component {component}")]
    MissingComponent {
        /// The entity that was queried.
        entity: Entity,
        /// Type name of the missing component.
        component: &'static str,
    },

    /// Configuration failed to parse or validate.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for store operations.
pub type EcsResult<T> = Result<T, EcsError>;
