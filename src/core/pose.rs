//! Dead-reckoned robot pose.

use super::math::normalize_heading;
use super::point::Vec2;

/// Position in centimetres plus heading in radians, heading kept in
/// [0, 2*pi). Heading 0 points along +x, pi/2 along +y.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec2,
    pub heading: f32,
}

impl Pose {
    pub fn new(position: Vec2, heading: f32) -> Self {
        Pose {
            position,
            heading: normalize_heading(heading),
        }
    }

    /// Translate along the current heading. Negative distance backs up.
    pub fn advance(&mut self, distance: f32) {
        self.position = self.position.point_at(self.heading, distance);
    }

    /// Turn in place by a signed delta, counter-clockwise positive.
    pub fn rotate(&mut self, delta: f32) {
        self.heading = normalize_heading(self.heading + delta);
    }
}

impl Default for Pose {
    fn default() -> Self {
        Pose::new(Vec2::ZERO, 0.0)
    }
}
