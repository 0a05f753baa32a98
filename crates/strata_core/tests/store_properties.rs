//! # Store Property Tests
//!
//! End-to-end checks of the store's guarantees through the public API:
//! handle safety, data surviving migration, swap-remove bookkeeping,
//! query completeness and drop accounting.

use std::cell::Cell;
use std::collections::HashSet;
use std::rc::Rc;

use strata_core::{
    CommandBuffer, Entity, Position, Signature, Store, StoreConfig, Velocity, CHUNK_SIZE,
};

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct Health(u32);

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct Frozen;

/// Counts live instances through a shared counter.
#[derive(Debug)]
struct Tracked(Rc<Cell<i32>>);

impl Tracked {
    fn new(live: &Rc<Cell<i32>>) -> Self {
        live.set(live.get() + 1);
        Self(Rc::clone(live))
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.0.set(self.0.get() - 1);
    }
}

fn small_chunks() -> Store {
    Store::with_config(StoreConfig {
        chunk_bytes: 64,
        initial_entity_capacity: 16,
    })
}

// =============================================================================
// HANDLES
// =============================================================================

#[test]
fn test_stale_handle_never_revives() {
    let mut store = Store::new();
    let first = store.create_entity();
    store.emplace(first, Health(1));
    assert!(store.destroy_entity(first));

    // Cycle the same slot many times; the first handle stays dead throughout.
    let mut previous = HashSet::from([first]);
    for round in 0..50 {
        let current = store.create_entity();
        assert_eq!(current.index(), first.index());
        assert!(previous.insert(current), "handle {current} issued twice");

        assert!(!store.alive(first));
        assert!(!store.has::<Health>(first));
        store.emplace(first, Health(99));
        assert!(!store.has::<Health>(current));
        assert!(!store.destroy_entity(first));
        assert!(store.alive(current));

        store.emplace(current, Health(round));
        assert!(store.destroy_entity(current));
    }
    assert_eq!(store.alive_count(), 0);
}

#[test]
fn test_double_destroy_is_idempotent() {
    let mut store = Store::new();
    let a = store.create_entity();
    let b = store.create_entity();

    assert!(store.destroy_entity(a));
    assert!(!store.destroy_entity(a));
    assert_eq!(store.alive_count(), 1);
    assert!(store.alive(b));
    assert!(!store.destroy_entity(Entity::NULL));
}

// =============================================================================
// MIGRATION
// =============================================================================

#[test]
fn test_values_survive_migrations() {
    let mut store = small_chunks();
    let entities: Vec<Entity> = (0..40).map(|_| store.create_entity()).collect();

    for (i, &e) in entities.iter().enumerate() {
        store.emplace(e, Position::new(i as f32, -(i as f32)));
    }
    for &e in entities.iter().step_by(3) {
        store.add::<Frozen>(e);
    }
    for (i, &e) in entities.iter().enumerate() {
        store.emplace(e, Health(i as u32));
    }
    for &e in entities.iter().step_by(3) {
        store.remove::<Frozen>(e);
    }

    for (i, &e) in entities.iter().enumerate() {
        assert_eq!(*store.get::<Position>(e), Position::new(i as f32, -(i as f32)));
        assert_eq!(*store.get::<Health>(e), Health(i as u32));
        assert!(!store.has::<Frozen>(e));
    }
}

#[test]
fn test_swap_remove_keeps_locations_consistent() {
    let mut store = small_chunks();
    let mut live: Vec<(Entity, u32)> = Vec::new();
    for i in 0..50 {
        let e = store.create_entity();
        store.emplace(e, Health(i));
        live.push((e, i));
    }

    // Destroy from the front, the middle and the back across several chunks.
    for victim in [0, 17, 5, 30, 1, 44, 2] {
        let position = live.iter().position(|&(_, v)| v == victim).unwrap();
        let (entity, _) = live.remove(position);
        assert!(store.destroy_entity(entity));
    }

    for &(entity, value) in &live {
        assert_eq!(*store.get::<Health>(entity), Health(value));
        let location = store.location(entity).unwrap();
        let chunk = &store.archetypes().archetype(location.archetype).chunks()[location.chunk];
        assert_eq!(chunk.entities()[location.row], entity);
    }

    // Only the last chunk of an archetype may have room.
    for archetype in store.archetypes().iter() {
        let chunks = archetype.chunks();
        if let Some((_, full)) = chunks.split_last() {
            assert!(full.iter().all(|chunk| chunk.is_full()));
        }
        let rows: usize = chunks.iter().map(|chunk| chunk.len()).sum();
        assert_eq!(rows, archetype.entity_count());
    }
}

#[test]
fn test_migration_fixes_displaced_entity() {
    let mut store = Store::new();
    let a = store.create_entity();
    let b = store.create_entity();
    let c = store.create_entity();
    for (e, v) in [(a, 1), (b, 2), (c, 3)] {
        store.emplace(e, Health(v));
    }

    // `a` leaves {Health}; `c` fills its row.
    store.add::<Frozen>(a);
    assert_eq!(store.location(c).unwrap().row, 0);
    assert_eq!(*store.get::<Health>(c), Health(3));
    assert_eq!(*store.get::<Health>(a), Health(1));
    assert_eq!(*store.get::<Health>(b), Health(2));
}

// =============================================================================
// QUERIES
// =============================================================================

#[test]
fn test_query_visits_exactly_the_matching_entities() {
    let mut store = small_chunks();
    let mut expected = HashSet::new();
    for i in 0..100 {
        let e = store.create_entity();
        store.emplace(e, Position::new(i as f32, 0.0));
        if i % 3 == 0 {
            store.emplace(e, Velocity::new(1.0, 0.0));
            expected.insert(e);
        }
        if i % 5 == 0 {
            store.add::<Frozen>(e);
        }
    }

    let mut seen = HashSet::new();
    store
        .query()
        .for_each_entity::<(&Position, &Velocity)>(|entity, _| {
            assert!(seen.insert(entity), "entity {entity} visited twice");
        });
    assert_eq!(seen, expected);
}

#[test]
fn test_query_with_signature() {
    let mut store = Store::new();
    for i in 0..10 {
        let e = store.create_entity();
        store.emplace(e, Health(i));
        if i < 4 {
            store.add::<Frozen>(e);
        }
    }

    let frozen = store.component_id::<Frozen>();
    let required: Signature = [frozen].into_iter().collect();
    let mut total = 0;
    store
        .query_with(&required)
        .for_each::<&Health>(|health| total += health.0);
    assert_eq!(total, 1 + 2 + 3);
}

#[test]
fn test_oversized_component_gets_one_row_chunks() {
    let mut store = Store::new();
    let a = store.create_entity();
    let b = store.create_entity();
    store.emplace(a, [7_u8; CHUNK_SIZE + 1]);
    store.emplace(b, [9_u8; CHUNK_SIZE + 1]);

    let location = store.location(b).unwrap();
    let archetype = store.archetypes().archetype(location.archetype);
    assert_eq!(archetype.chunks().len(), 2);
    assert_eq!(archetype.chunks()[0].capacity(), 1);
    assert_eq!(store.get::<[u8; CHUNK_SIZE + 1]>(a)[CHUNK_SIZE], 7);
    assert_eq!(store.get::<[u8; CHUNK_SIZE + 1]>(b)[0], 9);
}

// =============================================================================
// END TO END
// =============================================================================

#[test]
fn test_position_velocity_frame() {
    let mut store = Store::new();
    let moving = store.create_entity();
    let still = store.create_entity();
    store.emplace(moving, Position::new(0.0, 0.0));
    store.emplace(moving, Velocity::new(1.0, 2.0));
    store.emplace(still, Position::new(5.0, 5.0));

    store.add_system(|store: &mut Store, dt: f32| {
        store
            .query()
            .for_each::<(&mut Position, &Velocity)>(|(p, v)| v.integrate(p, dt));
    });
    store.run_systems(1.0);
    store.run_systems(0.5);

    assert_eq!(*store.get::<Position>(moving), Position::new(1.5, 3.0));
    assert_eq!(*store.get::<Position>(still), Position::new(5.0, 5.0));
}

#[test]
fn test_commands_defer_structural_changes() {
    let mut store = Store::new();
    for i in 0..8 {
        let e = store.create_entity();
        store.emplace(e, Health(i));
    }

    let mut commands = CommandBuffer::new();
    store.query().for_each_entity::<&Health>(|entity, health| {
        if health.0 % 2 == 0 {
            commands.add::<Frozen>(entity);
        } else {
            commands.destroy(entity);
        }
    });
    commands.create_with(|store, entity| store.emplace(entity, Health(100)));
    let created = store.apply_commands(&mut commands);

    assert_eq!(created.len(), 1);
    assert_eq!(store.alive_count(), 5);
    assert_eq!(store.query().count::<(&Health, &Frozen)>(), 4);
    assert_eq!(*store.get::<Health>(created[0]), Health(100));
}

// =============================================================================
// DROP ACCOUNTING
// =============================================================================

#[test]
fn test_every_value_is_dropped_exactly_once() {
    let live = Rc::new(Cell::new(0));
    {
        let mut store = small_chunks();
        let mut entities = Vec::new();
        for i in 0..30 {
            let e = store.create_entity();
            store.emplace(e, Tracked::new(&live));
            if i % 2 == 0 {
                store.emplace(e, Health(i));
            }
            entities.push(e);
        }
        assert_eq!(live.get(), 30);

        // Replacing drops the old value.
        store.emplace(entities[0], Tracked::new(&live));
        assert_eq!(live.get(), 30);

        // Removing drops; migrating the others does not.
        store.remove::<Tracked>(entities[1]);
        assert_eq!(live.get(), 29);
        store.remove::<Health>(entities[2]);
        assert_eq!(live.get(), 29);

        // Destroying drops.
        for &e in &entities[3..10] {
            store.destroy_entity(e);
        }
        assert_eq!(live.get(), 22);
    }
    // The rest go with the store.
    assert_eq!(live.get(), 0);
}
