//! Arm elevation path.
//!
//! The capture arm sweeps the camera from just above the deck to the
//! top of the object: a vertical run close to the mast, then a slanted
//! run that arcs out and over. Elevations are spread across the two
//! runs in proportion to their length, and the sweep always ends at the
//! top position looking straight down.

use crate::core::Vec2;

const VERTICAL_START: Vec2 = Vec2::new(-10.0, -2.0);
const VERTICAL_END: Vec2 = Vec2::new(-10.0, 20.0);
const SLANT_END: Vec2 = Vec2::new(-40.0, 69.0);
/// Final elevation: camera centered over the object.
const TOP: Vec2 = Vec2::new(0.0, 80.0);

/// `n` arm targets in capture order, lowest first, top position last.
/// Coordinates are rounded to a millimetre, the arm cannot do better.
pub fn arm_path(n: usize) -> Vec<Vec2> {
    if n == 0 {
        return Vec::new();
    }
    let mut path = Vec::with_capacity(n);
    if n > 1 {
        let len_a = VERTICAL_START.distance(&VERTICAL_END);
        let len_b = VERTICAL_END.distance(&SLANT_END);
        let spread = n - 1;
        let count_a = (spread as f32 * len_a / (len_a + len_b)).round() as usize;
        let count_b = spread - count_a;
        // sampled from each segment's low end, so the sweep anchors at
        // the bottom and the joint lands once, opening the slanted run;
        // the vertical run spreads over one spare slot
        path.extend(line_points(VERTICAL_START, VERTICAL_END, count_a, count_a + 1));
        path.extend(line_points(VERTICAL_END, SLANT_END, count_b, count_b));
    }
    path.push(TOP);
    path
}

/// `count` evenly spaced points from `start`, each one `slots`-th of
/// the segment further along; the far endpoint is never emitted.
fn line_points(start: Vec2, end: Vec2, count: usize, slots: usize) -> Vec<Vec2> {
    (0..count)
        .map(|k| {
            let t = k as f32 / slots as f32;
            Vec2::new(
                round_mm(start.x + (end.x - start.x) * t),
                round_mm(start.y + (end.y - start.y) * t),
            )
        })
        .collect()
}

fn round_mm(v: f32) -> f32 {
    (v * 10.0).round() / 10.0
}
