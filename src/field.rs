//! Potential-field steering.
//!
//! The circling pass moves through a field of point charges: the head
//! waypoint attracts, reported obstacles repel. Each tick sums the
//! contributions at the robot's position and caps the result at one
//! step of travel.

use crate::core::Vec2;

/// Distance under which a force point stops contributing. Inside this
/// radius the direction is numerically meaningless.
pub const EPSILON: f32 = 0.1;

/// A point charge in the scan plane. Positive magnitude pulls the robot
/// toward `position`, negative pushes it away, with strength falling
/// off as distance^falloff_order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForcePoint {
    pub position: Vec2,
    pub magnitude: f32,
    pub falloff_order: i32,
}

impl ForcePoint {
    pub fn new(position: Vec2, magnitude: f32, falloff_order: i32) -> Self {
        ForcePoint {
            position,
            magnitude,
            falloff_order,
        }
    }

    /// Field contribution at `at`.
    pub fn contribution(&self, at: Vec2) -> Vec2 {
        let offset = self.position - at;
        let dist = offset.length();
        if dist < EPSILON {
            return Vec2::ZERO;
        }
        offset.normalized() * (self.magnitude / dist.powi(self.falloff_order))
    }
}

/// Resultant displacement at `at`: the head waypoint's pull plus every
/// obstacle's push, capped at `step` length. The cap only ever shortens
/// the vector, a weak field stays weak.
pub fn resultant(head: &ForcePoint, obstacles: &[ForcePoint], at: Vec2, step: f32) -> Vec2 {
    let mut total = head.contribution(at);
    for obstacle in obstacles {
        total = total + obstacle.contribution(at);
    }
    let norm = total.length();
    if norm > step {
        total * (step / norm)
    } else {
        total
    }
}
