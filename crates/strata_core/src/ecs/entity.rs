//! # Entity Management
//!
//! Entities are lightweight handles consisting of:
//! - An index into the registry's slot table
//! - A generation counter for safe reuse
//!
//! Entities own no data. They are keys into the store's location table.

use std::fmt;

/// Handle identifying one logical object in a [`Store`](super::Store).
///
/// The handle is split into two parts:
/// - Lower 32 bits: dense slot index
/// - Upper 32 bits: generation counter for detecting stale handles
///
/// Two handles are equal iff both parts match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Entity(u64);

impl Entity {
    /// Sentinel meaning "no entity".
    ///
    /// Its index is `u32::MAX`, which the registry never hands out.
    pub const NULL: Self = Self::new(u32::MAX, 0);

    /// Creates a handle from index and generation.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | (index as u64))
    }

    /// Returns the slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    /// Returns the generation.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Checks if this is the [`Entity::NULL`] sentinel.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.index() == u32::MAX
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return f.write_str("null");
        }
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

/// Per-index bookkeeping.
#[derive(Clone, Copy, Debug)]
struct Slot {
    generation: u32,
    alive: bool,
}

/// Issues and recycles entity handles.
///
/// Destroying a handle bumps its slot's generation, so every handle issued
/// before the destroy stays dead forever, even after the index is reused.
/// A slot whose generation reaches `u32::MAX` is retired instead of recycled.
///
/// No operation here fails: destroying a dead or stale handle does nothing.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    /// One slot per index ever issued.
    slots: Vec<Slot>,
    /// Indices available for reuse (LIFO).
    free_list: Vec<u32>,
    /// Number of currently alive entities.
    alive_count: u32,
}

impl EntityRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty registry with room for `capacity` slots.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_list: Vec::new(),
            alive_count: 0,
        }
    }

    /// Issues a live handle, reusing a freed index when one is available.
    ///
    /// # Panics
    ///
    /// Panics if all `u32::MAX` indices are in use.
    pub fn create(&mut self) -> Entity {
        let index = if let Some(index) = self.free_list.pop() {
            self.slots[index as usize].alive = true;
            index
        } else {
            assert!(
                self.slots.len() < u32::MAX as usize,
                "entity index space exhausted"
            );
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                alive: true,
            });
            index
        };

        self.alive_count += 1;
        Entity::new(index, self.slots[index as usize].generation)
    }

    /// Destroys a handle.
    ///
    /// Returns `false` (and does nothing) if the handle is not alive, which
    /// covers double destroys and stale handles.
    pub fn destroy(&mut self, entity: Entity) -> bool {
        let Some(slot) = self.slots.get_mut(entity.index() as usize) else {
            return false;
        };
        if !slot.alive || slot.generation != entity.generation() {
            return false;
        }

        slot.alive = false;
        self.alive_count -= 1;

        // A wrapped generation would resurrect old handles.
        if slot.generation < u32::MAX {
            slot.generation += 1;
            self.free_list.push(entity.index());
        }
        true
    }

    /// Checks if a handle refers to a live entity.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.slots
            .get(entity.index() as usize)
            .is_some_and(|slot| slot.alive && slot.generation == entity.generation())
    }

    /// Returns the number of live entities.
    #[inline]
    #[must_use]
    pub const fn alive_count(&self) -> u32 {
        self.alive_count
    }

    /// Returns the number of slots ever issued (alive, free or retired).
    #[inline]
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_roundtrip() {
        let entity = Entity::new(12345, 67890);
        assert_eq!(entity.index(), 12345);
        assert_eq!(entity.generation(), 67890);
    }

    #[test]
    fn test_entity_equality_needs_both_parts() {
        assert_eq!(Entity::new(3, 1), Entity::new(3, 1));
        assert_ne!(Entity::new(3, 1), Entity::new(3, 2));
        assert_ne!(Entity::new(3, 1), Entity::new(4, 1));
    }

    #[test]
    fn test_null_sentinel() {
        assert!(Entity::NULL.is_null());
        assert!(Entity::default().is_null());
        assert!(!Entity::new(0, 0).is_null());
        assert_eq!(Entity::NULL.to_string(), "null");
        assert_eq!(Entity::new(7, 2).to_string(), "7v2");
    }

    #[test]
    fn test_create_destroy() {
        let mut registry = EntityRegistry::new();

        let a = registry.create();
        let b = registry.create();
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(registry.alive_count(), 2);

        assert!(registry.destroy(a));
        assert!(!registry.is_alive(a));
        assert!(registry.is_alive(b));
        assert_eq!(registry.alive_count(), 1);
    }

    #[test]
    fn test_reuse_bumps_generation() {
        let mut registry = EntityRegistry::new();

        let old = registry.create();
        registry.destroy(old);

        let new = registry.create();
        assert_eq!(new.index(), old.index()); // Same slot
        assert_ne!(new.generation(), old.generation()); // Different generation
        assert!(registry.is_alive(new));
        assert!(!registry.is_alive(old));
    }

    #[test]
    fn test_double_destroy_is_noop() {
        let mut registry = EntityRegistry::new();
        let e = registry.create();
        let _other = registry.create();

        assert!(registry.destroy(e));
        assert!(!registry.destroy(e));
        assert_eq!(registry.alive_count(), 1);

        // Only one copy of the index went to the free list.
        let reused = registry.create();
        let fresh = registry.create();
        assert_eq!(reused.index(), e.index());
        assert_eq!(fresh.index(), 2);
    }

    #[test]
    fn test_stale_handle_cannot_destroy_new_occupant() {
        let mut registry = EntityRegistry::new();
        let stale = registry.create();
        registry.destroy(stale);
        let occupant = registry.create();

        assert!(!registry.destroy(stale));
        assert!(registry.is_alive(occupant));
    }

    #[test]
    fn test_out_of_range_and_null_are_dead() {
        let registry = EntityRegistry::new();
        assert!(!registry.is_alive(Entity::new(10, 0)));
        assert!(!registry.is_alive(Entity::NULL));
    }

    #[test]
    fn test_exhausted_generation_retires_slot() {
        let mut registry = EntityRegistry::new();
        let _ = registry.create();
        registry.slots[0].generation = u32::MAX;
        let last = Entity::new(0, u32::MAX);

        assert!(registry.destroy(last));
        assert!(!registry.is_alive(last));

        let next = registry.create();
        assert_eq!(next.index(), 1);
        assert_eq!(registry.slot_count(), 2);
    }
}
