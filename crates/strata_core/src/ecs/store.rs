//! # Store
//!
//! The store ties the pieces together: it issues entities, keeps each
//! entity's location, and moves entities between archetypes when their
//! component set changes.
//!
//! ## Migration
//!
//! Adding or removing a component moves the entity to the archetype of its
//! new signature:
//!
//! 1. Allocate a row in the target archetype
//! 2. Copy the components both archetypes share
//! 3. Remove the entity from the source (the source's last entity fills the hole)
//! 4. Rewrite the location of the entity that filled the hole, then our own
//!
//! The added value is written, or the removed value dropped, around that.

// SAFETY: Typed access to chunk memory goes through the location table,
// which is kept in sync with every structural change.
#![allow(unsafe_code)]

use std::any::type_name;

use super::archetype::{ArchetypeId, ArchetypeIndex};
use super::commands::CommandBuffer;
use super::component::{Component, ComponentTypeId, TypeRegistry};
use super::error::{EcsError, EcsResult};
use super::query::Query;
use super::system::System;
use super::{Entity, EntityRegistry, Signature};
use crate::config::StoreConfig;

/// Where an entity's components live.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntityLocation {
    /// Archetype holding the entity.
    pub archetype: ArchetypeId,
    /// Chunk within the archetype.
    pub chunk: usize,
    /// Row within the chunk.
    pub row: usize,
}

/// Archetype-based entity/component store.
///
/// # Example
///
/// ```rust,ignore
/// use strata_core::{Position, Store, Velocity};
///
/// let mut store = Store::new();
/// let e = store.create_entity();
/// store.emplace(e, Position::new(0.0, 0.0));
/// store.emplace(e, Velocity::new(1.0, 2.0));
///
/// store.query().for_each::<(&mut Position, &Velocity)>(|(p, v)| {
///     p.x += v.x;
///     p.y += v.y;
/// });
/// ```
pub struct Store {
    entities: EntityRegistry,
    registry: TypeRegistry,
    archetypes: ArchetypeIndex,
    /// Indexed by entity index. Entries of dead entities are stale.
    locations: Vec<EntityLocation>,
    systems: Vec<Box<dyn System>>,
    empty_archetype: ArchetypeId,
    config: StoreConfig,
}

impl Store {
    /// Creates a store with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Creates a store with the given configuration.
    ///
    /// # Panics
    ///
    /// Panics if the configuration fails [`StoreConfig::validate`]. Use
    /// [`try_with_config`](Self::try_with_config) for configurations that
    /// are not known to be valid.
    #[must_use]
    pub fn with_config(config: StoreConfig) -> Self {
        Self::with_registry(TypeRegistry::new(), config)
    }

    /// Creates a store with the given configuration, if it is valid.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidConfig`] if the configuration fails
    /// [`StoreConfig::validate`].
    pub fn try_with_config(config: StoreConfig) -> EcsResult<Self> {
        config.validate()?;
        Ok(Self::with_registry(TypeRegistry::new(), config))
    }

    /// Creates a store around an existing type registry, keeping its
    /// component identities.
    ///
    /// # Panics
    ///
    /// Panics if the configuration fails [`StoreConfig::validate`].
    #[must_use]
    pub fn with_registry(registry: TypeRegistry, config: StoreConfig) -> Self {
        if let Err(err) = config.validate() {
            panic!("{err}");
        }
        let mut archetypes = ArchetypeIndex::new(config.chunk_bytes);
        let empty_archetype = archetypes.get_or_create(&Signature::new(), &registry);
        Self {
            entities: EntityRegistry::with_capacity(config.initial_entity_capacity),
            registry,
            archetypes,
            locations: Vec::with_capacity(config.initial_entity_capacity),
            systems: Vec::new(),
            empty_archetype,
            config,
        }
    }

    // =========================================================================
    // Entities
    // =========================================================================

    /// Creates an entity with no components.
    pub fn create_entity(&mut self) -> Entity {
        let entity = self.entities.create();
        let (chunk, row) = self
            .archetypes
            .archetype_mut(self.empty_archetype)
            .add_entity(entity);
        self.set_location(
            entity,
            EntityLocation {
                archetype: self.empty_archetype,
                chunk,
                row,
            },
        );
        entity
    }

    /// Destroys an entity and drops its components.
    ///
    /// Returns `false` (and does nothing) if the handle is not alive.
    pub fn destroy_entity(&mut self, entity: Entity) -> bool {
        let Some(location) = self.location(entity) else {
            return false;
        };

        let archetype = self.archetypes.archetype_mut(location.archetype);
        // SAFETY: the location is current, so the row is live; it is released
        // right below without being read.
        unsafe { archetype.chunk_mut(location.chunk).drop_row(location.row) };
        let moved = archetype.remove_entity(location.chunk, location.row);
        self.relocate(moved, location);

        self.entities.destroy(entity)
    }

    /// Checks if a handle refers to a live entity.
    #[inline]
    #[must_use]
    pub fn alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    /// Number of live entities.
    #[inline]
    #[must_use]
    pub fn alive_count(&self) -> u32 {
        self.entities.alive_count()
    }

    /// Current location of a live entity.
    #[must_use]
    pub fn location(&self, entity: Entity) -> Option<EntityLocation> {
        if !self.entities.is_alive(entity) {
            return None;
        }
        self.locations.get(entity.index() as usize).copied()
    }

    // =========================================================================
    // Components
    // =========================================================================

    /// Attaches `T::default()` to `entity`.
    ///
    /// Does nothing if the entity already has a `T` or is not alive.
    pub fn add<T: Component + Default>(&mut self, entity: Entity) {
        let Some(location) = self.structural_target(entity, "add") else {
            return;
        };
        let id = self.registry.type_id::<T>();
        if self.has_id(location, id) {
            return;
        }
        self.attach(entity, location, id, T::default());
    }

    /// Sets `entity`'s `T` to `value`, attaching it if missing.
    ///
    /// An existing value is dropped and replaced. Does nothing if the entity
    /// is not alive.
    pub fn emplace<T: Component>(&mut self, entity: Entity, value: T) {
        let Some(location) = self.structural_target(entity, "emplace") else {
            return;
        };
        let id = self.registry.type_id::<T>();
        if self.has_id(location, id) {
            let ptr = self.slot_ptr(location, id);
            // SAFETY: the slot holds a live T owned by this store.
            unsafe { *ptr.cast::<T>() = value };
            return;
        }
        self.attach(entity, location, id, value);
    }

    /// Detaches and drops `entity`'s `T`.
    ///
    /// Does nothing if the entity has no `T` or is not alive.
    pub fn remove<T: Component>(&mut self, entity: Entity) {
        let Some(location) = self.structural_target(entity, "remove") else {
            return;
        };
        let Some(id) = self.registry.lookup::<T>() else {
            return;
        };
        if !self.has_id(location, id) {
            return;
        }

        // SAFETY: the slot holds a live T. Migration leaves its bytes behind,
        // so ownership moves to `value`.
        let value = unsafe { self.slot_ptr(location, id).cast::<T>().read() };
        let target = self
            .archetypes
            .archetype(location.archetype)
            .signature()
            .without(id);
        let target = self.archetypes.get_or_create(&target, &self.registry);
        self.migrate(entity, location, target);
        drop(value);
    }

    /// Checks if `entity` is alive and has a `T`.
    #[must_use]
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        match (self.location(entity), self.registry.lookup::<T>()) {
            (Some(location), Some(id)) => self.has_id(location, id),
            _ => false,
        }
    }

    /// Borrows `entity`'s `T`.
    ///
    /// # Panics
    ///
    /// Panics if the entity is not alive or has no `T`.
    #[must_use]
    pub fn get<T: Component>(&self, entity: Entity) -> &T {
        self.try_get(entity).unwrap_or_else(|err| panic!("{err}"))
    }

    /// Mutably borrows `entity`'s `T`.
    ///
    /// # Panics
    ///
    /// Panics if the entity is not alive or has no `T`.
    #[must_use]
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> &mut T {
        self.try_get_mut(entity).unwrap_or_else(|err| panic!("{err}"))
    }

    /// Borrows `entity`'s `T`, reporting why it is unavailable.
    ///
    /// # Errors
    ///
    /// [`EcsError::DeadEntity`] or [`EcsError::MissingComponent`].
    pub fn try_get<T: Component>(&self, entity: Entity) -> EcsResult<&T> {
        let ptr = self.component_ptr::<T>(entity)?;
        // SAFETY: the slot holds a live T; the borrow is tied to `self`.
        Ok(unsafe { &*ptr.cast::<T>() })
    }

    /// Mutably borrows `entity`'s `T`, reporting why it is unavailable.
    ///
    /// # Errors
    ///
    /// [`EcsError::DeadEntity`] or [`EcsError::MissingComponent`].
    pub fn try_get_mut<T: Component>(&mut self, entity: Entity) -> EcsResult<&mut T> {
        let ptr = self.component_ptr::<T>(entity)?;
        // SAFETY: the slot holds a live T; `&mut self` makes the borrow unique.
        Ok(unsafe { &mut *ptr.cast::<T>() })
    }

    /// Identity of `T`, registering it on first use.
    pub fn component_id<T: Component>(&mut self) -> ComponentTypeId {
        self.registry.type_id::<T>()
    }

    // =========================================================================
    // Queries and systems
    // =========================================================================

    /// Queries every archetype that currently holds entities.
    pub fn query(&mut self) -> Query<'_> {
        let matched = self.archetypes.get_all();
        Query::new(&mut self.archetypes, &self.registry, matched)
    }

    /// Queries every archetype whose signature contains `required`.
    pub fn query_with(&mut self, required: &Signature) -> Query<'_> {
        let matched = self.archetypes.query(required);
        Query::new(&mut self.archetypes, &self.registry, matched)
    }

    /// Registers a system to run after the existing ones.
    pub fn add_system<S: System + 'static>(&mut self, system: S) {
        self.systems.push(Box::new(system));
    }

    /// Runs every registered system once, in registration order.
    ///
    /// Systems registered during the run start on the next call.
    pub fn run_systems(&mut self, delta_time: f32) {
        let mut systems = std::mem::take(&mut self.systems);
        for system in &mut systems {
            let _span = tracing::trace_span!("system", system = system.name()).entered();
            system.run(self, delta_time);
        }
        systems.append(&mut self.systems);
        self.systems = systems;
    }

    /// Number of registered systems.
    #[inline]
    #[must_use]
    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// Applies and drains a command buffer. Returns the entities it created.
    pub fn apply_commands(&mut self, commands: &mut CommandBuffer) -> Vec<Entity> {
        commands.apply(self)
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Number of archetypes created so far, the empty one included.
    #[inline]
    #[must_use]
    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    /// Read access to the archetype index.
    #[inline]
    #[must_use]
    pub fn archetypes(&self) -> &ArchetypeIndex {
        &self.archetypes
    }

    /// The component type registry.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// The configuration the store was built with.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Logs every archetype at debug level.
    pub fn debug_archetypes(&self) {
        for archetype in self.archetypes.iter() {
            let components: Vec<&str> = archetype
                .component_infos()
                .iter()
                .map(|info| info.name)
                .collect();
            tracing::debug!(
                archetype = archetype.id().0,
                ?components,
                entities = archetype.entity_count(),
                chunks = archetype.chunks().len(),
                "archetype"
            );
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn set_location(&mut self, entity: Entity, location: EntityLocation) {
        let index = entity.index() as usize;
        if index >= self.locations.len() {
            self.locations.resize(index + 1, location);
        }
        self.locations[index] = location;
    }

    /// Points the entity that filled a swap-remove hole at its new row.
    fn relocate(&mut self, moved: Entity, location: EntityLocation) {
        if !moved.is_null() {
            self.locations[moved.index() as usize] = location;
        }
    }

    fn structural_target(&self, entity: Entity, operation: &str) -> Option<EntityLocation> {
        let location = self.location(entity);
        if location.is_none() {
            tracing::debug!(%entity, operation, "ignored structural change on dead entity");
        }
        location
    }

    fn has_id(&self, location: EntityLocation, id: ComponentTypeId) -> bool {
        self.archetypes
            .archetype(location.archetype)
            .signature()
            .contains(id)
    }

    fn slot_ptr(&self, location: EntityLocation, id: ComponentTypeId) -> *mut u8 {
        self.archetypes.archetype(location.archetype).chunks()[location.chunk]
            .component_ptr(id, location.row)
    }

    fn component_ptr<T: Component>(&self, entity: Entity) -> EcsResult<*mut u8> {
        let location = self.location(entity).ok_or(EcsError::DeadEntity(entity))?;
        let missing = || EcsError::MissingComponent {
            entity,
            component: type_name::<T>(),
        };
        let id = self.registry.lookup::<T>().ok_or_else(missing)?;
        if !self.has_id(location, id) {
            return Err(missing());
        }
        Ok(self.slot_ptr(location, id))
    }

    /// Moves `entity` to the archetype of its signature plus `id`, then
    /// writes `value` into the new slot.
    fn attach<T: Component>(
        &mut self,
        entity: Entity,
        from: EntityLocation,
        id: ComponentTypeId,
        value: T,
    ) {
        let target = self
            .archetypes
            .archetype(from.archetype)
            .signature()
            .with(id);
        let target = self.archetypes.get_or_create(&target, &self.registry);
        let to = self.migrate(entity, from, target);
        // SAFETY: the slot was allocated by the migration and is
        // uninitialised; nothing else copied into it.
        unsafe { self.slot_ptr(to, id).cast::<T>().write(value) };
    }

    fn migrate(&mut self, entity: Entity, from: EntityLocation, target: ArchetypeId) -> EntityLocation {
        let (source, destination) = self.archetypes.pair_mut(from.archetype, target);

        let (chunk, row) = destination.add_entity(entity);
        // SAFETY: `from` is current, the destination row was just allocated,
        // and the source row is released right below without dropping.
        unsafe {
            source.chunks()[from.chunk].move_entity(from.row, destination.chunk_mut(chunk), row);
        }
        let moved = source.remove_entity(from.chunk, from.row);

        let to = EntityLocation {
            archetype: target,
            chunk,
            row,
        };
        self.relocate(moved, from);
        self.set_location(entity, to);
        to
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("alive", &self.alive_count())
            .field("archetypes", &self.archetypes.len())
            .field("systems", &self.systems.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
