//! Core geometry types shared across the crate.

mod math;
mod point;
mod pose;

pub use math::{TWO_PI, angle_diff, normalize_degrees, normalize_heading};
pub use point::Vec2;
pub use pose::Pose;
