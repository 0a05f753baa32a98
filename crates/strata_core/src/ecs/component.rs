//! # Component Type Registry
//!
//! Components are plain Rust values. The registry gives every component type
//! a small numeric identity plus the layout facts chunks need to store it as
//! raw bytes: size, alignment and how to drop it.
//!
//! The registry is an ordinary value owned by a [`Store`](super::Store).
//! Two stores never share identities unless built from the same registry.

// SAFETY: Type-erased drop glue. `drop_ptr::<T>` is only stored next to
// the `TypeId` of `T` and only called on initialised `T` slots.
#![allow(unsafe_code)]

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::mem;

/// Marker trait for anything that can be attached to an entity.
///
/// Every `'static` type qualifies.
pub trait Component: 'static {}

impl<T: 'static> Component for T {}

/// Numeric identity of a component type within one [`TypeRegistry`].
///
/// Assigned sequentially from 0 in first-registration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentTypeId(pub u32);

/// Drops a value of the erased type in place.
pub type DropFn = unsafe fn(*mut u8);

/// Layout and lifecycle facts for one registered component type.
#[derive(Clone, Copy, Debug)]
pub struct ComponentInfo {
    /// Identity within the owning registry.
    pub id: ComponentTypeId,
    /// Rust type name, for diagnostics.
    pub name: &'static str,
    /// `size_of::<T>()`.
    pub size: usize,
    /// `align_of::<T>()`.
    pub align: usize,
    /// `None` when the type has no drop glue.
    pub drop_fn: Option<DropFn>,
}

impl ComponentInfo {
    /// Builds the info for `T`.
    #[must_use]
    pub fn of<T: Component>(id: ComponentTypeId) -> Self {
        Self {
            id,
            name: type_name::<T>(),
            size: mem::size_of::<T>(),
            align: mem::align_of::<T>(),
            drop_fn: mem::needs_drop::<T>().then_some(drop_ptr::<T> as DropFn),
        }
    }
}

/// # Safety
///
/// `ptr` must point to a live, properly aligned `T` that is never used again.
unsafe fn drop_ptr<T>(ptr: *mut u8) {
    // SAFETY: guaranteed by the caller.
    unsafe { ptr.cast::<T>().drop_in_place() };
}

/// Maps Rust types to [`ComponentTypeId`]s.
///
/// Registration is idempotent: asking twice for the same type returns the
/// same identity.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    by_type: HashMap<TypeId, ComponentTypeId>,
    infos: Vec<ComponentInfo>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the identity of `T`, registering it on first use.
    pub fn type_id<T: Component>(&mut self) -> ComponentTypeId {
        if let Some(&id) = self.by_type.get(&TypeId::of::<T>()) {
            return id;
        }

        let id = ComponentTypeId(self.infos.len() as u32);
        let info = ComponentInfo::of::<T>(id);
        tracing::trace!(
            id = id.0,
            component = info.name,
            size = info.size,
            align = info.align,
            "registered component type"
        );
        self.infos.push(info);
        self.by_type.insert(TypeId::of::<T>(), id);
        id
    }

    /// Returns the identity of `T` without registering it.
    #[inline]
    #[must_use]
    pub fn lookup<T: Component>(&self) -> Option<ComponentTypeId> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Returns the info for a registered identity.
    ///
    /// # Panics
    ///
    /// Panics if `id` was never issued by this registry.
    #[inline]
    #[must_use]
    pub fn info(&self, id: ComponentTypeId) -> &ComponentInfo {
        self.get(id)
            .unwrap_or_else(|| panic!("component type {} is not registered", id.0))
    }

    /// Returns the info for `id`, if registered.
    #[inline]
    #[must_use]
    pub fn get(&self, id: ComponentTypeId) -> Option<&ComponentInfo> {
        self.infos.get(id.0 as usize)
    }

    /// Number of registered types.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    /// Returns true if nothing is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }
}
