//! # Queries
//!
//! A [`Query`] iterates every entity whose archetype holds all requested
//! component types. What to fetch is spelled as a type:
//!
//! ```rust,ignore
//! store.query().for_each::<(&mut Position, &Velocity)>(|(pos, vel)| {
//!     pos.x += vel.x;
//!     pos.y += vel.y;
//! });
//! ```
//!
//! The query holds an exclusive borrow of the store's archetypes, so the
//! store cannot be structurally changed while it is alive. Defer such
//! changes through a [`CommandBuffer`](super::CommandBuffer).
//!
//! Iteration order is chunk order then row order inside each archetype.
//! Order across archetypes is unspecified.

// SAFETY: Fetches hand out references into raw chunk memory.
// Aliasing is ruled out by the access check in `Query::plan`.
#![allow(unsafe_code)]

use std::marker::PhantomData;

use super::archetype::{ArchetypeId, ArchetypeIndex};
use super::chunk::Chunk;
use super::component::{Component, ComponentTypeId, TypeRegistry};
use super::{Entity, Signature};

/// How a fetch touches a component column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    /// Shared reference.
    Read,
    /// Exclusive reference.
    Write,
}

/// Describes what a query yields per entity.
///
/// Implemented for `&T`, `&mut T` and tuples of up to eight fetches.
///
/// # Safety
///
/// `visit_ids` must report every column `fetch` touches, with the access it
/// uses. The query relies on it to reject aliasing mutable borrows.
pub unsafe trait Fetch<'q> {
    /// Value produced per entity.
    type Item;
    /// Resolved component identities.
    type Ids: Copy;
    /// Column base pointers of one chunk.
    type Columns: Copy;

    /// Resolves identities, or `None` if some type was never registered.
    fn ids(registry: &TypeRegistry) -> Option<Self::Ids>;

    /// Reports every accessed component.
    fn visit_ids(ids: Self::Ids, visit: &mut dyn FnMut(ComponentTypeId, Access));

    /// Reads the column pointers of `chunk`.
    ///
    /// # Safety
    ///
    /// `chunk` must contain every column in `ids`.
    unsafe fn columns(chunk: &Chunk, ids: Self::Ids) -> Self::Columns;

    /// Produces the item for `row`.
    ///
    /// # Safety
    ///
    /// `row` must be live in the chunk `columns` came from, the chunk must
    /// outlive `'q`, and no other live reference may alias a written column.
    unsafe fn fetch(columns: Self::Columns, row: usize) -> Self::Item;
}

// SAFETY: reports its single column as a read.
unsafe impl<'q, T: Component> Fetch<'q> for &'q T {
    type Item = &'q T;
    type Ids = ComponentTypeId;
    type Columns = *const T;

    fn ids(registry: &TypeRegistry) -> Option<Self::Ids> {
        registry.lookup::<T>()
    }

    fn visit_ids(ids: Self::Ids, visit: &mut dyn FnMut(ComponentTypeId, Access)) {
        visit(ids, Access::Read);
    }

    unsafe fn columns(chunk: &Chunk, ids: Self::Ids) -> Self::Columns {
        chunk.column_ptr(ids).cast::<T>()
    }

    unsafe fn fetch(columns: Self::Columns, row: usize) -> Self::Item {
        // SAFETY: the caller guarantees the row is live.
        unsafe { &*columns.add(row) }
    }
}

// SAFETY: reports its single column as a write.
unsafe impl<'q, T: Component> Fetch<'q> for &'q mut T {
    type Item = &'q mut T;
    type Ids = ComponentTypeId;
    type Columns = *mut T;

    fn ids(registry: &TypeRegistry) -> Option<Self::Ids> {
        registry.lookup::<T>()
    }

    fn visit_ids(ids: Self::Ids, visit: &mut dyn FnMut(ComponentTypeId, Access)) {
        visit(ids, Access::Write);
    }

    unsafe fn columns(chunk: &Chunk, ids: Self::Ids) -> Self::Columns {
        chunk.column_ptr(ids).cast::<T>()
    }

    unsafe fn fetch(columns: Self::Columns, row: usize) -> Self::Item {
        // SAFETY: the caller guarantees the row is live and unaliased.
        unsafe { &mut *columns.add(row) }
    }
}

macro_rules! impl_fetch_tuple {
    ($($name:ident),+) => {
        // SAFETY: forwards to every member.
        #[allow(non_snake_case)]
        unsafe impl<'q, $($name: Fetch<'q>),+> Fetch<'q> for ($($name,)+) {
            type Item = ($($name::Item,)+);
            type Ids = ($($name::Ids,)+);
            type Columns = ($($name::Columns,)+);

            fn ids(registry: &TypeRegistry) -> Option<Self::Ids> {
                Some(($($name::ids(registry)?,)+))
            }

            fn visit_ids(ids: Self::Ids, visit: &mut dyn FnMut(ComponentTypeId, Access)) {
                let ($($name,)+) = ids;
                $($name::visit_ids($name, visit);)+
            }

            unsafe fn columns(chunk: &Chunk, ids: Self::Ids) -> Self::Columns {
                let ($($name,)+) = ids;
                // SAFETY: forwarded contract.
                unsafe { ($($name::columns(chunk, $name),)+) }
            }

            unsafe fn fetch(columns: Self::Columns, row: usize) -> Self::Item {
                let ($($name,)+) = columns;
                // SAFETY: forwarded contract.
                unsafe { ($($name::fetch($name, row),)+) }
            }
        }
    };
}

impl_fetch_tuple!(A);
impl_fetch_tuple!(A, B);
impl_fetch_tuple!(A, B, C);
impl_fetch_tuple!(A, B, C, D);
impl_fetch_tuple!(A, B, C, D, E);
impl_fetch_tuple!(A, B, C, D, E, F);
impl_fetch_tuple!(A, B, C, D, E, F, G);
impl_fetch_tuple!(A, B, C, D, E, F, G, H);

/// Snapshot of candidate archetypes plus exclusive access to their storage.
pub struct Query<'w> {
    index: &'w mut ArchetypeIndex,
    registry: &'w TypeRegistry,
    matched: Vec<ArchetypeId>,
}

impl<'w> Query<'w> {
    pub(crate) fn new(
        index: &'w mut ArchetypeIndex,
        registry: &'w TypeRegistry,
        matched: Vec<ArchetypeId>,
    ) -> Self {
        Self {
            index,
            registry,
            matched,
        }
    }

    /// Number of archetypes captured by this query.
    #[inline]
    #[must_use]
    pub fn archetype_count(&self) -> usize {
        self.matched.len()
    }

    /// Resolves `Q` and narrows the snapshot to archetypes that hold it.
    ///
    /// Returns `None` if some requested type was never registered.
    ///
    /// # Panics
    ///
    /// Panics if `Q` borrows a component mutably more than once, or both
    /// mutably and immutably.
    fn plan<'q, Q: Fetch<'q>>(&self) -> Option<(Q::Ids, Vec<ArchetypeId>)> {
        let ids = Q::ids(self.registry)?;

        let mut seen: Vec<(ComponentTypeId, Access)> = Vec::new();
        Q::visit_ids(ids, &mut |id: ComponentTypeId, access: Access| {
            let conflict = seen.iter().any(|&(other, other_access)| {
                other == id && (access == Access::Write || other_access == Access::Write)
            });
            assert!(
                !conflict,
                "query borrows {} mutably more than once",
                self.registry.info(id).name
            );
            seen.push((id, access));
        });

        let required: Signature = seen.iter().map(|&(id, _)| id).collect();
        let archetypes = self
            .matched
            .iter()
            .copied()
            .filter(|&id| self.index.archetype(id).signature().is_superset_of(&required))
            .collect();
        Some((ids, archetypes))
    }

    /// Iterates items of every matching entity.
    pub fn iter<'q, Q: Fetch<'q>>(&'q mut self) -> QueryIter<'q, Q> {
        QueryIter {
            rows: self.rows::<Q>(),
        }
    }

    /// Iterates `(entity, item)` pairs of every matching entity.
    pub fn iter_with_entity<'q, Q: Fetch<'q>>(&'q mut self) -> QueryEntityIter<'q, Q> {
        QueryEntityIter {
            rows: self.rows::<Q>(),
        }
    }

    /// Calls `f` with the items of every matching entity.
    pub fn for_each<'q, Q: Fetch<'q>>(&'q mut self, mut f: impl FnMut(Q::Item)) {
        for item in self.iter::<Q>() {
            f(item);
        }
    }

    /// Calls `f` with each matching entity and its items.
    pub fn for_each_entity<'q, Q: Fetch<'q>>(&'q mut self, mut f: impl FnMut(Entity, Q::Item)) {
        for (entity, item) in self.iter_with_entity::<Q>() {
            f(entity, item);
        }
    }

    /// Number of entities `Q` would visit.
    pub fn count<'q, Q: Fetch<'q>>(&'q mut self) -> usize {
        self.plan::<Q>().map_or(0, |(_, archetypes)| {
            archetypes
                .iter()
                .map(|&id| self.index.archetype(id).entity_count())
                .sum()
        })
    }

    fn rows<'q, Q: Fetch<'q>>(&'q mut self) -> Rows<'q, Q> {
        let (ids, archetypes) = match self.plan::<Q>() {
            Some((ids, archetypes)) => (Some(ids), archetypes),
            None => (None, Vec::new()),
        };
        Rows {
            index: &*self.index,
            ids,
            archetypes: archetypes.into_iter(),
            chunks: <&[Chunk]>::default().iter(),
            current: None,
            row: 0,
            _marker: PhantomData,
        }
    }
}

/// Shared cursor over archetypes, chunks and rows.
struct Rows<'q, Q: Fetch<'q>> {
    index: &'q ArchetypeIndex,
    ids: Option<Q::Ids>,
    archetypes: std::vec::IntoIter<ArchetypeId>,
    chunks: std::slice::Iter<'q, Chunk>,
    current: Option<(&'q [Entity], Q::Columns)>,
    row: usize,
    _marker: PhantomData<&'q mut ()>,
}

impl<'q, Q: Fetch<'q>> Iterator for Rows<'q, Q> {
    type Item = (Entity, Q::Item);

    fn next(&mut self) -> Option<Self::Item> {
        let ids = self.ids?;
        loop {
            if let Some((entities, columns)) = self.current {
                if let Some(&entity) = entities.get(self.row) {
                    let row = self.row;
                    self.row += 1;
                    // SAFETY: the row is live, the chunk is borrowed for 'q
                    // through the query's exclusive borrow, and `plan`
                    // rejected aliasing accesses.
                    let item = unsafe { Q::fetch(columns, row) };
                    return Some((entity, item));
                }
            }

            let chunk = loop {
                if let Some(chunk) = self.chunks.next() {
                    break chunk;
                }
                let id = self.archetypes.next()?;
                self.chunks = self.index.archetype(id).chunks().iter();
            };
            // SAFETY: the archetype holds every column in `ids`.
            let columns = unsafe { Q::columns(chunk, ids) };
            self.current = Some((chunk.entities(), columns));
            self.row = 0;
        }
    }
}

/// Iterator returned by [`Query::iter`].
pub struct QueryIter<'q, Q: Fetch<'q>> {
    rows: Rows<'q, Q>,
}

impl<'q, Q: Fetch<'q>> Iterator for QueryIter<'q, Q> {
    type Item = Q::Item;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next().map(|(_, item)| item)
    }
}

/// Iterator returned by [`Query::iter_with_entity`].
pub struct QueryEntityIter<'q, Q: Fetch<'q>> {
    rows: Rows<'q, Q>,
}

impl<'q, Q: Fetch<'q>> Iterator for QueryEntityIter<'q, Q> {
    type Item = (Entity, Q::Item);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next()
    }
}
