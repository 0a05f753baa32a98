//! # Systems
//!
//! Per-frame logic run by [`Store::run_systems`](super::Store::run_systems)
//! in registration order.

use super::Store;

/// Logic executed once per frame against the store.
pub trait System {
    /// Runs one frame.
    fn run(&mut self, store: &mut Store, delta_time: f32);

    /// Name used in trace spans.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<F> System for F
where
    F: FnMut(&mut Store, f32),
{
    #[inline]
    fn run(&mut self, store: &mut Store, delta_time: f32) {
        self(store, delta_time);
    }
}
