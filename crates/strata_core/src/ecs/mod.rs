//! # Entity Component Store
//!
//! Archetype-based storage: entities with the same exact component set share
//! an archetype, and each archetype keeps its data in fixed-size chunks laid
//! out as Structure of Arrays.
//!
//! ## Design Philosophy
//!
//! - Component bytes are owned by chunks and reached only through the store
//!   or a query
//! - Entity ids carry a generation so stale handles are detected
//! - Structural changes never happen while a query is alive
//! - Archetypes and entity locations live in index-addressed arenas

pub mod archetype;
pub mod chunk;
mod commands;
mod component;
mod entity;
mod error;
pub mod query;
mod signature;
mod store;
mod system;

pub use archetype::{Archetype, ArchetypeId, ArchetypeIndex};
pub use chunk::{Chunk, CHUNK_SIZE};
pub use commands::CommandBuffer;
pub use component::{Component, ComponentInfo, ComponentTypeId, DropFn, TypeRegistry};
pub use entity::{Entity, EntityRegistry};
pub use error::{EcsError, EcsResult};
pub use query::{Access, Fetch, Query, QueryEntityIter, QueryIter};
pub use signature::Signature;
pub use store::{EntityLocation, Store};
pub use system::System;
