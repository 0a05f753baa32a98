//! # Archetypes
//!
//! An archetype stores every entity whose component set equals its
//! signature, spread over a list of fixed-size chunks:
//!
//! ```text
//! Archetype {Position, Velocity}
//!   chunk 0: [full .................]
//!   chunk 1: [full .................]
//!   chunk 2: [e e e e e ...         ]   <- only the last chunk has room
//! ```
//!
//! Removal swaps the archetype's last entity into the hole, even across
//! chunks, so every chunk but the last stays full.
//!
//! The [`ArchetypeIndex`] owns all archetypes in an arena addressed by
//! [`ArchetypeId`]. Archetypes are never destroyed, so ids stay valid for
//! the lifetime of the store.

use std::collections::HashMap;

use super::chunk::Chunk;
use super::component::{ComponentInfo, TypeRegistry};
use super::{Entity, Signature};

/// Index of an archetype in its [`ArchetypeIndex`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArchetypeId(pub u32);

/// Storage for all entities sharing one exact component set.
///
/// Only the owning store adds or removes rows; callers outside the crate get
/// read access:
///
/// ```compile_fail
/// use strata_core::{ArchetypeIndex, Entity, Signature, TypeRegistry};
///
/// let registry = TypeRegistry::new();
/// let mut index = ArchetypeIndex::new(1024);
/// let id = index.get_or_create(&Signature::new(), &registry);
/// index.archetype_mut(id).add_entity(Entity::new(0, 0));
/// ```
#[derive(Debug)]
pub struct Archetype {
    id: ArchetypeId,
    signature: Signature,
    /// Signature order.
    infos: Vec<ComponentInfo>,
    chunks: Vec<Chunk>,
    entity_count: usize,
    chunk_bytes: usize,
}

impl Archetype {
    /// Creates an empty archetype. `infos` must follow signature order.
    pub(crate) fn new(
        id: ArchetypeId,
        signature: Signature,
        infos: Vec<ComponentInfo>,
        chunk_bytes: usize,
    ) -> Self {
        debug_assert!(infos
            .iter()
            .map(|info| info.id)
            .eq(signature.components().iter().copied()));
        Self {
            id,
            signature,
            infos,
            chunks: Vec::new(),
            entity_count: 0,
            chunk_bytes,
        }
    }

    /// Places `entity` in the last chunk, opening a new chunk when it is full.
    ///
    /// Returns `(chunk_index, row)`. Component bytes of the new row are
    /// uninitialised until the caller writes them.
    pub(crate) fn add_entity(&mut self, entity: Entity) -> (usize, usize) {
        if self.chunks.last().map_or(true, Chunk::is_full) {
            self.chunks.push(Chunk::new(&self.infos, self.chunk_bytes));
        }
        let chunk_index = self.chunks.len() - 1;
        let row = self.chunks[chunk_index].allocate(entity);
        self.entity_count += 1;
        (chunk_index, row)
    }

    /// Releases `(chunk_index, row)` by moving the archetype's last entity
    /// into it.
    ///
    /// Returns the entity that now lives at `(chunk_index, row)`, or
    /// [`Entity::NULL`] if the removed entity was the last one. The values in
    /// the row must already be dropped or moved out.
    ///
    /// # Panics
    ///
    /// Panics if the position is not live.
    pub(crate) fn remove_entity(&mut self, chunk_index: usize, row: usize) -> Entity {
        let last = self.chunks.len() - 1;
        let moved = if chunk_index == last {
            self.chunks[last].deallocate(row)
        } else {
            let (head, tail) = self.chunks.split_at_mut(last);
            head[chunk_index].fill_from_last(row, &mut tail[0])
        };
        self.entity_count -= 1;

        if self.chunks.len() > 1 && self.chunks.last().is_some_and(Chunk::is_empty) {
            self.chunks.pop();
        }
        moved
    }

    /// Position in the arena.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ArchetypeId {
        self.id
    }

    /// The exact component set stored here.
    #[inline]
    #[must_use]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Component layouts in signature order.
    #[inline]
    #[must_use]
    pub fn component_infos(&self) -> &[ComponentInfo] {
        &self.infos
    }

    /// All chunks, full ones first.
    #[inline]
    #[must_use]
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Mutable access to one chunk.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    #[inline]
    pub(crate) fn chunk_mut(&mut self, index: usize) -> &mut Chunk {
        &mut self.chunks[index]
    }

    /// Number of entities across all chunks.
    #[inline]
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entity_count
    }

    /// Checks if no entity lives here.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entity_count == 0
    }
}

/// Arena of archetypes keyed by signature.
#[derive(Debug)]
pub struct ArchetypeIndex {
    archetypes: Vec<Archetype>,
    by_signature: HashMap<Signature, ArchetypeId>,
    chunk_bytes: usize,
}

impl ArchetypeIndex {
    /// Creates an empty index whose chunks use `chunk_bytes` each.
    #[must_use]
    pub fn new(chunk_bytes: usize) -> Self {
        Self {
            archetypes: Vec::new(),
            by_signature: HashMap::new(),
            chunk_bytes,
        }
    }

    /// Returns the archetype for `signature`, creating it on first use.
    ///
    /// # Panics
    ///
    /// Panics if the signature names a type `registry` does not know.
    pub fn get_or_create(&mut self, signature: &Signature, registry: &TypeRegistry) -> ArchetypeId {
        if let Some(&id) = self.by_signature.get(signature) {
            return id;
        }

        let id = ArchetypeId(self.archetypes.len() as u32);
        let infos: Vec<ComponentInfo> = signature
            .components()
            .iter()
            .map(|&type_id| *registry.info(type_id))
            .collect();

        tracing::debug!(
            archetype = id.0,
            components = ?infos.iter().map(|info| info.name).collect::<Vec<_>>(),
            "created archetype"
        );

        self.archetypes.push(Archetype::new(
            id,
            signature.clone(),
            infos,
            self.chunk_bytes,
        ));
        self.by_signature.insert(signature.clone(), id);
        id
    }

    /// Looks up an existing archetype.
    #[must_use]
    pub fn find(&self, signature: &Signature) -> Option<ArchetypeId> {
        self.by_signature.get(signature).copied()
    }

    /// Every archetype whose signature contains `required`, empty ones
    /// included.
    #[must_use]
    pub fn query(&self, required: &Signature) -> Vec<ArchetypeId> {
        self.archetypes
            .iter()
            .filter(|archetype| archetype.signature.is_superset_of(required))
            .map(Archetype::id)
            .collect()
    }

    /// Every archetype that currently holds entities.
    #[must_use]
    pub fn get_all(&self) -> Vec<ArchetypeId> {
        self.archetypes
            .iter()
            .filter(|archetype| !archetype.is_empty())
            .map(Archetype::id)
            .collect()
    }

    /// Borrows an archetype.
    ///
    /// # Panics
    ///
    /// Panics if `id` did not come from this index.
    #[inline]
    #[must_use]
    pub fn archetype(&self, id: ArchetypeId) -> &Archetype {
        &self.archetypes[id.0 as usize]
    }

    /// Mutably borrows an archetype.
    ///
    /// # Panics
    ///
    /// Panics if `id` did not come from this index.
    #[inline]
    pub(crate) fn archetype_mut(&mut self, id: ArchetypeId) -> &mut Archetype {
        &mut self.archetypes[id.0 as usize]
    }

    /// Mutably borrows two distinct archetypes at once.
    ///
    /// # Panics
    ///
    /// Panics if `a == b` or either id is out of range.
    pub(crate) fn pair_mut(&mut self, a: ArchetypeId, b: ArchetypeId) -> (&mut Archetype, &mut Archetype) {
        let (a, b) = (a.0 as usize, b.0 as usize);
        assert_ne!(a, b, "pair_mut needs two distinct archetypes");
        if a < b {
            let (left, right) = self.archetypes.split_at_mut(b);
            (&mut left[a], &mut right[0])
        } else {
            let (left, right) = self.archetypes.split_at_mut(a);
            (&mut right[0], &mut left[b])
        }
    }

    /// Number of archetypes ever created.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.archetypes.len()
    }

    /// Checks if no archetype exists yet.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.archetypes.is_empty()
    }

    /// All archetypes in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Archetype> {
        self.archetypes.iter()
    }
}
