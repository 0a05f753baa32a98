//! # STRATA Core
//!
//! Archetype-based entity/component store designed for:
//! - Bulk iteration over entities by component combination
//! - Cache-friendly chunked Structure of Arrays storage
//! - Safe reuse of entity handles through generation counters
//!
//! ## Architecture Rules
//!
//! 1. **Chunks own component bytes** - Nothing else holds pointers into them
//! 2. **No structural change during iteration** - Queries borrow the store;
//!    defer changes with a [`CommandBuffer`]
//! 3. **Stale handles are harmless** - Structural calls on dead entities do nothing
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata_core::{Position, Store, Velocity};
//!
//! let mut store = Store::new();
//! let e = store.create_entity();
//! store.emplace(e, Position::new(0.0, 0.0));
//! store.emplace(e, Velocity::new(1.0, 1.0));
//!
//! store.add_system(|store: &mut Store, dt: f32| {
//!     store
//!         .query()
//!         .for_each::<(&mut Position, &Velocity)>(|(p, v)| v.integrate(p, dt));
//! });
//! store.run_systems(1.0 / 60.0);
//! ```

pub mod components;
pub mod config;
pub mod ecs;

pub use components::{Position, Velocity};
pub use config::StoreConfig;
pub use ecs::{
    Access, Archetype, ArchetypeId, ArchetypeIndex, Chunk, CommandBuffer, Component,
    ComponentInfo, ComponentTypeId, EcsError, EcsResult, Entity, EntityLocation, EntityRegistry,
    Fetch, Query, Signature, Store, System, TypeRegistry, CHUNK_SIZE,
};
