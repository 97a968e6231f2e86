//! The gently swaying camera.

use glam::Vec3;

/// Where the scene is looked at from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewpoint {
    pub eye:    Vec3,
    pub target: Vec3,
}

impl Viewpoint {
    /// Camera pose at `elapsed` seconds: a slow sideways and vertical sway in
    /// front of the origin.
    pub fn at(elapsed: f32) -> Self {
        Viewpoint {
            eye: Vec3::new(
                4.0 * (elapsed * 0.18).sin(),
                10.0 + 1.2 * (elapsed * 0.12).sin(),
                110.0,
            ),
            target: Vec3::ZERO,
        }
    }

    /// Unit vector from `from` toward the eye, or zero if they coincide.
    pub fn facing_from(&self, from: Vec3) -> Vec3 {
        (self.eye - from).normalize_or_zero()
    }
}

impl Default for Viewpoint {
    fn default() -> Self { Self::at(0.0) }
}
