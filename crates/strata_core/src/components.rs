//! # Common Components
//!
//! Plain data components shared by simulation code and downstream
//! consumers. Both are `Pod`, so slices of them can be viewed as bytes for
//! GPU upload.

use bytemuck::{Pod, Zeroable};

/// Position in world space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Position {
    /// X coordinate.
    pub x: f32,
    /// Y coordinate.
    pub y: f32,
}

impl Position {
    /// Creates a new position.
    #[inline]
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Squared distance to another position.
    ///
    /// Avoids the sqrt for distance comparisons.
    #[inline]
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

/// Velocity in units per second.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Velocity {
    /// X velocity.
    pub x: f32,
    /// Y velocity.
    pub y: f32,
}

impl Velocity {
    /// Creates a new velocity.
    #[inline]
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Advances `position` by this velocity over `delta_time` seconds.
    #[inline]
    pub fn integrate(self, position: &mut Position, delta_time: f32) {
        position.x += self.x * delta_time;
        position.y += self.y * delta_time;
    }
}
