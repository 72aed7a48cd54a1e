// position.rs -- self-player facing and location
//
// Fed from outbound movement notifies and our own synthetic packets. During
// a reaction the proxy ticks the position along the reaction animation so
// the corrective instant-move at its end starts from a sane spot.

use rival_common::geom::{apply_distance, Vec3};

#[derive(Debug, Default)]
pub struct PositionTracker {
    pub loc: Vec3,
    pub w: f32,
    pub updated_at: i64,
}

impl PositionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn update(&mut self, loc: Vec3, w: f32, now: i64) {
        self.loc = loc;
        self.w = w;
        self.updated_at = now;
    }

    /// Advance along the current facing, used by reaction ticks.
    pub fn step_along(&mut self, dist: f32, now: i64) {
        self.loc = apply_distance(self.loc, self.w, dist);
        self.updated_at = now;
    }
}
