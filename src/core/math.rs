//! Angle helpers shared by motion, trajectory and gimbal code.
//!
//! Body headings live in [0, 2*pi) because the circling pass compares
//! bearings that grow counter-clockwise from the positive x axis.
//! Gimbal axes live in degrees in (-180, 180] because that is what the
//! device endpoints accept.

use std::f32::consts::PI;

pub const TWO_PI: f32 = 2.0 * PI;

/// Normalize a heading in radians to [0, 2*pi).
pub fn normalize_heading(angle: f32) -> f32 {
    let mut a = angle % TWO_PI;
    if a < 0.0 {
        a += TWO_PI;
    }
    if a >= TWO_PI {
        a = 0.0;
    }
    a
}

/// Normalize a gimbal axis in degrees to (-180, 180].
pub fn normalize_degrees(deg: f32) -> f32 {
    let mut d = deg % 360.0;
    if d > 180.0 {
        d -= 360.0;
    } else if d <= -180.0 {
        d += 360.0;
    }
    d
}

/// Signed shortest rotation from one angle to another, in [-pi, pi).
pub fn angle_diff(from: f32, to: f32) -> f32 {
    let mut a = (to - from) % TWO_PI;
    if a >= PI {
        a -= TWO_PI;
    } else if a < -PI {
        a += TWO_PI;
    }
    a
}
