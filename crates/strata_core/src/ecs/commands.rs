//! # Command Buffers
//!
//! Structural changes cannot happen while a [`Query`](super::Query) borrows
//! the store. Record them in a [`CommandBuffer`] instead and apply the
//! buffer once iteration is over:
//!
//! ```rust,ignore
//! let mut commands = CommandBuffer::new();
//! store.query().for_each_entity::<&Health>(|entity, health| {
//!     if health.0 == 0 {
//!         commands.destroy(entity);
//!     }
//! });
//! store.apply_commands(&mut commands);
//! ```
//!
//! Commands run in recording order. Commands aimed at an entity that died in
//! the meantime do nothing, like the matching store calls.

use std::fmt;

use super::component::Component;
use super::{Entity, Store};

type Mutation = Box<dyn FnOnce(&mut Store)>;
type Spawn = Box<dyn FnOnce(&mut Store, Entity)>;

/// One deferred structural change.
enum Command {
    /// Creates an entity, then optionally initialises it.
    Create(Option<Spawn>),
    /// Destroys an entity.
    Destroy(Entity),
    /// Adds, emplaces or removes a component.
    Mutate(Mutation),
}

/// Ordered list of deferred structural changes.
#[derive(Default)]
pub struct CommandBuffer {
    commands: Vec<Command>,
}

impl CommandBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an entity creation.
    pub fn create(&mut self) {
        self.commands.push(Command::Create(None));
    }

    /// Records an entity creation followed by `init` on the new entity.
    pub fn create_with(&mut self, init: impl FnOnce(&mut Store, Entity) + 'static) {
        self.commands.push(Command::Create(Some(Box::new(init))));
    }

    /// Records an entity destruction.
    pub fn destroy(&mut self, entity: Entity) {
        self.commands.push(Command::Destroy(entity));
    }

    /// Records [`Store::add`].
    pub fn add<T: Component + Default>(&mut self, entity: Entity) {
        self.commands
            .push(Command::Mutate(Box::new(move |store: &mut Store| store.add::<T>(entity))));
    }

    /// Records [`Store::emplace`].
    pub fn emplace<T: Component>(&mut self, entity: Entity, value: T) {
        self.commands
            .push(Command::Mutate(Box::new(move |store: &mut Store| store.emplace(entity, value))));
    }

    /// Records [`Store::remove`].
    pub fn remove<T: Component>(&mut self, entity: Entity) {
        self.commands
            .push(Command::Mutate(Box::new(move |store: &mut Store| store.remove::<T>(entity))));
    }

    /// Number of pending commands.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Checks if nothing is pending.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Drops every pending command without applying it.
    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Applies and drains every command in recording order.
    ///
    /// Returns the entities created, in order.
    pub fn apply(&mut self, store: &mut Store) -> Vec<Entity> {
        let mut created = Vec::new();
        for command in self.commands.drain(..) {
            match command {
                Command::Create(init) => {
                    let entity = store.create_entity();
                    if let Some(init) = init {
                        init(store, entity);
                    }
                    created.push(entity);
                }
                Command::Destroy(entity) => {
                    store.destroy_entity(entity);
                }
                Command::Mutate(mutation) => mutation(store),
            }
        }
        created
    }
}

impl fmt::Debug for CommandBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandBuffer")
            .field("pending", &self.commands.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Clone, Copy, PartialEq)]
    struct Health(u32);

    #[test]
    fn test_commands_apply_in_order() {
        let mut store = Store::new();
        let e = store.create_entity();

        let mut commands = CommandBuffer::new();
        commands.emplace(e, Health(5));
        commands.remove::<Health>(e);
        commands.add::<Health>(e);
        assert_eq!(commands.len(), 3);

        commands.apply(&mut store);
        assert!(commands.is_empty());
        assert_eq!(*store.get::<Health>(e), Health(0));
    }

    #[test]
    fn test_create_with_initialises() {
        let mut store = Store::new();
        let mut commands = CommandBuffer::new();
        commands.create();
        commands.create_with(|store, entity| store.emplace(entity, Health(9)));

        let created = store.apply_commands(&mut commands);
        assert_eq!(created.len(), 2);
        assert!(!store.has::<Health>(created[0]));
        assert_eq!(*store.get::<Health>(created[1]), Health(9));
    }

    #[test]
    fn test_destroy_during_iteration() {
        let mut store = Store::new();
        for i in 0..6 {
            let e = store.create_entity();
            store.emplace(e, Health(i % 3));
        }

        let mut commands = CommandBuffer::new();
        store.query().for_each_entity::<&Health>(|entity, health| {
            if health.0 == 0 {
                commands.destroy(entity);
            }
        });
        store.apply_commands(&mut commands);

        assert_eq!(store.alive_count(), 4);
        assert_eq!(store.query().count::<&Health>(), 4);
    }

    #[test]
    fn test_commands_on_dead_entity_are_noops() {
        let mut store = Store::new();
        let e = store.create_entity();
        let mut commands = CommandBuffer::new();
        commands.destroy(e);
        commands.emplace(e, Health(1));
        commands.destroy(e);

        store.apply_commands(&mut commands);
        assert!(!store.alive(e));
        assert_eq!(store.alive_count(), 0);
    }

    #[test]
    fn test_clear_discards() {
        let mut store = Store::new();
        let mut commands = CommandBuffer::new();
        commands.create();
        commands.clear();
        assert!(commands.apply(&mut store).is_empty());
        assert_eq!(store.alive_count(), 0);
    }
}
