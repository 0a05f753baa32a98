//! # Chunked Component Storage
//!
//! A chunk is one raw allocation holding a fixed number of entities of a
//! single archetype, laid out as Structure of Arrays:
//!
//! ```text
//! base ─┬─ Position[0..capacity]
//!       ├─ (pad to align_of::<Velocity>)
//!       ├─ Velocity[0..capacity]
//!       └─ ...
//! ```
//!
//! Columns follow signature order. The base is aligned to at least a cache
//! line so every column start is aligned for its type.
//!
//! Chunks treat component values as relocatable byte blobs. Dropping values
//! that leave the store is the caller's job, except on chunk teardown where
//! every live row is dropped here.

// SAFETY: This module owns raw component memory.
// Every unsafe block states the invariant it relies on.
#![allow(unsafe_code)]

use std::alloc::{self, Layout};
use std::ptr::{self, NonNull};

use super::component::{ComponentInfo, ComponentTypeId, DropFn};
use super::Entity;

/// Default byte budget of one chunk.
pub const CHUNK_SIZE: usize = 16 * 1024;

/// Minimum alignment of a chunk allocation (one cache line).
const MIN_CHUNK_ALIGN: usize = 64;

/// Where one component type lives inside the allocation.
#[derive(Clone, Copy, Debug)]
struct Column {
    type_id: ComponentTypeId,
    offset: usize,
    /// Distance between consecutive rows, equal to the type's size.
    stride: usize,
    drop_fn: Option<DropFn>,
}

#[inline]
const fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

/// Returns the end of the column layout for `capacity` rows.
fn layout_end(infos: &[ComponentInfo], capacity: usize) -> usize {
    infos.iter().fold(0, |cursor, info| {
        align_up(cursor, info.align) + info.size * capacity
    })
}

/// Number of rows that fit in `budget` bytes, never less than one.
///
/// With no sized components the chunk is pure tag storage and holds
/// `budget` entities.
#[must_use]
pub fn compute_capacity(infos: &[ComponentInfo], budget: usize) -> usize {
    let per_entity: usize = infos.iter().map(|info| info.size).sum();
    if per_entity == 0 {
        return budget.max(1);
    }

    let mut capacity = (budget / per_entity).max(1);
    // Alignment padding can push the naive estimate over budget.
    while capacity > 1 && layout_end(infos, capacity) > budget {
        capacity -= 1;
    }
    capacity
}

/// Fixed-capacity SoA block for one archetype.
///
/// Outside the crate a chunk is read-only. Rows are claimed and released by
/// the owning [`Archetype`](super::Archetype) only, so every live row always
/// holds initialised values:
///
/// ```compile_fail
/// use strata_core::{Chunk, Entity, TypeRegistry};
///
/// let mut registry = TypeRegistry::new();
/// let id = registry.type_id::<String>();
/// let mut chunk = Chunk::new(&[*registry.info(id)], 1024);
/// chunk.allocate(Entity::new(0, 0));
/// ```
pub struct Chunk {
    memory: NonNull<u8>,
    memory_layout: Layout,
    /// Sorted by `type_id`.
    columns: Vec<Column>,
    /// `entities[row]` owns row `row`. Its length is the live row count.
    entities: Vec<Entity>,
    capacity: usize,
}

impl Chunk {
    /// Allocates a chunk for the given component infos (signature order)
    /// within a byte budget.
    ///
    /// # Panics
    ///
    /// Panics if the layout overflows `isize`.
    #[must_use]
    pub fn new(infos: &[ComponentInfo], budget: usize) -> Self {
        let capacity = compute_capacity(infos, budget);

        let mut cursor = 0;
        let mut columns = Vec::with_capacity(infos.len());
        for info in infos {
            cursor = align_up(cursor, info.align);
            columns.push(Column {
                type_id: info.id,
                offset: cursor,
                stride: info.size,
                drop_fn: info.drop_fn,
            });
            cursor += info.size * capacity;
        }
        columns.sort_unstable_by_key(|column| column.type_id);

        let align = infos
            .iter()
            .map(|info| info.align)
            .fold(MIN_CHUNK_ALIGN, usize::max);
        let memory_layout = Layout::from_size_align(cursor.max(1), align)
            .unwrap_or_else(|_| panic!("chunk layout of {cursor} bytes overflows"));

        // SAFETY: the layout has a non-zero size.
        let raw = unsafe { alloc::alloc(memory_layout) };
        let Some(memory) = NonNull::new(raw) else {
            alloc::handle_alloc_error(memory_layout)
        };

        tracing::trace!(
            capacity,
            bytes = memory_layout.size(),
            columns = columns.len(),
            "allocated chunk"
        );

        Self {
            memory,
            memory_layout,
            columns,
            entities: Vec::new(),
            capacity,
        }
    }

    /// Maximum number of rows.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live rows.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Checks if no rows are live.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Checks if every row is taken.
    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.entities.len() == self.capacity
    }

    /// Entity owning each live row.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Checks if the chunk stores `type_id`.
    #[inline]
    #[must_use]
    pub fn has_column(&self, type_id: ComponentTypeId) -> bool {
        self.column(type_id).is_some()
    }

    #[inline]
    fn column(&self, type_id: ComponentTypeId) -> Option<&Column> {
        self.columns
            .binary_search_by_key(&type_id, |column| column.type_id)
            .ok()
            .map(|pos| &self.columns[pos])
    }

    #[inline]
    fn slot(&self, column: &Column, row: usize) -> *mut u8 {
        // SAFETY: row <= capacity keeps the pointer inside the allocation
        // (or one past a zero-sized column).
        unsafe {
            self.memory
                .as_ptr()
                .add(column.offset + column.stride * row)
        }
    }

    /// Claims the next free row for `entity`.
    ///
    /// The row's component bytes are uninitialised until the caller writes them.
    ///
    /// # Panics
    ///
    /// Panics if the chunk is full.
    pub(crate) fn allocate(&mut self, entity: Entity) -> usize {
        assert!(
            !self.is_full(),
            "allocate into a full chunk (capacity {})",
            self.capacity
        );
        self.entities.push(entity);
        self.entities.len() - 1
    }

    /// Swap-removes `row`.
    ///
    /// If `row` was not the last row, the last row's bytes are copied into it
    /// and the entity that owned the last row is returned. Otherwise returns
    /// [`Entity::NULL`]. The values that were in `row` must already have been
    /// dropped or moved out; they are overwritten, not dropped.
    ///
    /// # Panics
    ///
    /// Panics if `row` is not live.
    pub(crate) fn deallocate(&mut self, row: usize) -> Entity {
        let len = self.entities.len();
        assert!(row < len, "deallocate row {row} of {len}");

        let last = len - 1;
        if row == last {
            self.entities.pop();
            return Entity::NULL;
        }

        for column in &self.columns {
            let src = self.slot(column, last);
            let dst = self.slot(column, row);
            // SAFETY: both rows are in bounds and distinct.
            unsafe { ptr::copy_nonoverlapping(src, dst, column.stride) };
        }
        self.entities.swap_remove(row);
        self.entities[row]
    }

    /// Moves the donor's last row into `row` of this chunk and returns the
    /// moved entity. Both chunks must belong to the same archetype.
    ///
    /// Like [`deallocate`](Self::deallocate), the values in `row` are
    /// overwritten without being dropped.
    ///
    /// # Panics
    ///
    /// Panics if `row` is not live, the donor is empty, or the two column
    /// layouts differ.
    pub(crate) fn fill_from_last(&mut self, row: usize, donor: &mut Chunk) -> Entity {
        assert!(row < self.len(), "fill row {row} of {}", self.len());
        assert!(
            self.columns.len() == donor.columns.len()
                && self
                    .columns
                    .iter()
                    .zip(&donor.columns)
                    .all(|(mine, theirs)| {
                        mine.type_id == theirs.type_id && mine.stride == theirs.stride
                    }),
            "fill from a chunk with a different column layout"
        );
        let Some(moved) = donor.entities.pop() else {
            panic!("fill from an empty chunk");
        };
        let last = donor.entities.len();

        for (mine, theirs) in self.columns.iter().zip(&donor.columns) {
            let src = donor.slot(theirs, last);
            let dst = self.slot(mine, row);
            // SAFETY: separate allocations, both rows in bounds, equal strides.
            unsafe { ptr::copy_nonoverlapping(src, dst, mine.stride) };
        }
        self.entities[row] = moved;
        moved
    }

    /// Pointer to the `type_id` value of `row`.
    ///
    /// # Panics
    ///
    /// Panics if the chunk has no such column or `row >= capacity`.
    #[inline]
    #[must_use]
    pub fn component_ptr(&self, type_id: ComponentTypeId, row: usize) -> *mut u8 {
        assert!(
            row < self.capacity,
            "row {row} out of chunk capacity {}",
            self.capacity
        );
        let Some(column) = self.column(type_id) else {
            panic!("chunk has no column for component type {}", type_id.0);
        };
        self.slot(column, row)
    }

    /// Pointer to row 0 of the `type_id` column.
    ///
    /// # Panics
    ///
    /// Panics if the chunk has no such column.
    #[inline]
    #[must_use]
    pub fn column_ptr(&self, type_id: ComponentTypeId) -> *mut u8 {
        self.component_ptr(type_id, 0)
    }

    /// Copies every column `dst` shares with this chunk from `src_row` into
    /// `dst_row`. Columns only in `dst` are left untouched. The source row is
    /// not released.
    ///
    /// # Safety
    ///
    /// `src_row` must be live here and `dst_row` allocated in `dst`. After the
    /// call the copied values are owned by `dst`; the caller must release
    /// `src_row` without dropping them.
    pub(crate) unsafe fn move_entity(&self, src_row: usize, dst: &mut Chunk, dst_row: usize) {
        debug_assert!(src_row < self.len());
        debug_assert!(dst_row < dst.len());
        for column in &dst.columns {
            let Some(source) = self.column(column.type_id) else {
                continue;
            };
            let src = self.slot(source, src_row);
            let to = dst.slot(column, dst_row);
            // SAFETY: distinct chunks, both rows in bounds.
            unsafe { ptr::copy_nonoverlapping(src, to, column.stride) };
        }
    }

    /// Drops every value in `row` in place.
    ///
    /// # Safety
    ///
    /// `row` must be live and its values initialised. Afterwards they are
    /// dead and the row must be released without being read.
    pub(crate) unsafe fn drop_row(&mut self, row: usize) {
        for column in &self.columns {
            if let Some(drop_fn) = column.drop_fn {
                // SAFETY: the caller guarantees the value is live.
                unsafe { drop_fn(self.slot(column, row)) };
            }
        }
    }

    /// Drops one value in place.
    ///
    /// # Safety
    ///
    /// Same contract as [`drop_row`](Self::drop_row) for a single column.
    ///
    /// # Panics
    ///
    /// Panics if the chunk has no such column.
    pub(crate) unsafe fn drop_component(&mut self, type_id: ComponentTypeId, row: usize) {
        let Some(column) = self.column(type_id) else {
            panic!("chunk has no column for component type {}", type_id.0);
        };
        if let Some(drop_fn) = column.drop_fn {
            // SAFETY: the caller guarantees the value is live.
            unsafe { drop_fn(self.slot(column, row)) };
        }
    }
}

impl Drop for Chunk {
    fn drop(&mut self) {
        for row in 0..self.entities.len() {
            // SAFETY: every row below len holds initialised values.
            unsafe { self.drop_row(row) };
        }
        // SAFETY: allocated in `new` with this exact layout.
        unsafe { alloc::dealloc(self.memory.as_ptr(), self.memory_layout) };
    }
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .field("columns", &self.columns.len())
            .finish()
    }
}
