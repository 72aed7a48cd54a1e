// geom.rs -- world-space vectors and facing math

use serde::{Deserialize, Serialize};

/// A world-space position. Distances are in game units, `z` is up.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Horizontal-plane distance. Height differences are ignored because
    /// skill displacement is authored in the ground plane.
    pub fn dist2d(&self, other: &Vec3) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn dist(&self, other: &Vec3) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Offset `loc` by `dist` along the facing angle `w` (radians, ground plane).
/// Negative distances step backwards; `apply_distance(apply_distance(l, w, d), w, -d)`
/// returns `l` within float epsilon.
pub fn apply_distance(loc: Vec3, w: f32, dist: f32) -> Vec3 {
    Vec3 {
        x: loc.x + dist * w.cos(),
        y: loc.y + dist * w.sin(),
        z: loc.z,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dist2d_ignores_height() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(3.0, 4.0, 100.0);
        assert_eq!(a.dist2d(&b), 5.0);
    }

    #[test]
    fn test_apply_distance_round_trip() {
        let loc = Vec3::new(120.0, -40.0, 8.0);
        let out = apply_distance(apply_distance(loc, 1.25, 150.0), 1.25, -150.0);
        assert!((out.x - loc.x).abs() < 1e-3);
        assert!((out.y - loc.y).abs() < 1e-3);
        assert_eq!(out.z, loc.z);
    }

    #[test]
    fn test_apply_distance_along_x() {
        let out = apply_distance(Vec3::ZERO, 0.0, 150.0);
        assert!((out.x - 150.0).abs() < 1e-3);
        assert!(out.y.abs() < 1e-3);
    }
}
