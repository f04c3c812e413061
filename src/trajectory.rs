//! Circular capture trajectory, consumed waypoint by waypoint.
//!
//! A ring of waypoints surrounds the scanned object. The head waypoint
//! is the only attractor; once the robot reaches it (or its bearing
//! around the pivot walks past it) the waypoint pops and the caller
//! takes a picture. One call pops at most one waypoint, so every
//! waypoint produces exactly one capture, in ring order.

use std::collections::VecDeque;

use crate::core::{TWO_PI, Vec2, angle_diff, normalize_heading};
use crate::field::{self, ForcePoint};

/// Pull of the head waypoint. Strong enough to saturate the step cap
/// anywhere inside the scan area, so the robot strides rather than
/// creeps.
const WAYPOINT_MAGNITUDE: f32 = 1000.0;
const WAYPOINT_FALLOFF: i32 = 1;

/// A capture position on the ring.
#[derive(Debug, Clone, Copy)]
pub struct Waypoint {
    pub point: ForcePoint,
    /// Bearing around the pivot at which this waypoint sits, in [0, 2*pi).
    pub target_angle: f32,
}

/// Outcome of one trajectory tick.
#[derive(Debug, Clone, Copy)]
pub enum TrajectoryStep {
    /// Head waypoint consumed; capture here.
    Reached(Waypoint),
    /// Keep moving by this displacement.
    Move(Vec2),
    /// Every waypoint has been consumed.
    Complete,
}

pub struct Trajectory {
    waypoints: VecDeque<Waypoint>,
    pivot: Vec2,
    step_distance: f32,
}

impl Trajectory {
    /// Ring of `step_nbr` waypoints of the given radius around `pivot`,
    /// starting at bearing 0 and walking counter-clockwise.
    pub fn circle(pivot: Vec2, radius: f32, step_nbr: usize, step_distance: f32) -> Self {
        let mut waypoints = VecDeque::with_capacity(step_nbr);
        for k in 0..step_nbr {
            let angle = k as f32 * TWO_PI / step_nbr as f32;
            let position = pivot.point_at(angle, radius);
            waypoints.push_back(Waypoint {
                point: ForcePoint::new(position, WAYPOINT_MAGNITUDE, WAYPOINT_FALLOFF),
                target_angle: angle,
            });
        }
        Self {
            waypoints,
            pivot,
            step_distance,
        }
    }

    pub fn pivot(&self) -> Vec2 {
        self.pivot
    }

    pub fn remaining(&self) -> usize {
        self.waypoints.len()
    }

    /// Bearing of `position` around the pivot, in [0, 2*pi).
    fn bearing(&self, position: Vec2) -> f32 {
        normalize_heading(self.pivot.angle_to(&position))
    }

    /// One tick of the circling pass from `position`.
    pub fn advance(&mut self, position: Vec2, obstacles: &[ForcePoint]) -> TrajectoryStep {
        let head = match self.waypoints.front() {
            Some(w) => *w,
            None => return TrajectoryStep::Complete,
        };

        let close = position.distance(&head.point.position) <= self.step_distance / 2.0;
        // passed-by counts only within half a turn of the target,
        // otherwise a bearing just shy of the seam would flush the ring
        let bearing = self.bearing(position);
        let passed = angle_diff(head.target_angle, bearing) >= 0.0;

        if close || passed {
            self.waypoints.pop_front();
            return TrajectoryStep::Reached(head);
        }

        TrajectoryStep::Move(field::resultant(
            &head.point,
            obstacles,
            position,
            self.step_distance,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::{FRAC_PI_2, PI};

    fn quarter_ring() -> Trajectory {
        Trajectory::circle(Vec2::new(-50.0, 0.0), 50.0, 4, 5.0)
    }

    #[test]
    fn test_circle_positions_and_angles() {
        let traj = quarter_ring();
        assert_eq!(traj.remaining(), 4);
        assert_relative_eq!(traj.pivot().x, -50.0);

        let expected = [
            (Vec2::new(0.0, 0.0), 0.0),
            (Vec2::new(-50.0, 50.0), FRAC_PI_2),
            (Vec2::new(-100.0, 0.0), PI),
            (Vec2::new(-50.0, -50.0), 3.0 * FRAC_PI_2),
        ];
        let mut traj = traj;
        let mut popped = Vec::new();
        // pop everything by standing on each waypoint in turn
        for (pos, _) in expected {
            match traj.advance(pos, &[]) {
                TrajectoryStep::Reached(w) => popped.push(w),
                other => panic!("expected Reached, got {:?}", other),
            }
        }
        for ((pos, angle), w) in expected.iter().zip(&popped) {
            assert_relative_eq!(w.point.position.x, pos.x, epsilon = 1e-3);
            assert_relative_eq!(w.point.position.y, pos.y, epsilon = 1e-3);
            assert_relative_eq!(w.target_angle, angle, epsilon = 1e-6);
        }
        // ring order is strictly increasing bearings
        for pair in popped.windows(2) {
            assert!(pair[0].target_angle < pair[1].target_angle);
        }
    }

    #[test]
    fn test_start_waypoint_pops_once() {
        let mut traj = quarter_ring();
        let start = Vec2::ZERO;
        assert!(matches!(
            traj.advance(start, &[]),
            TrajectoryStep::Reached(w) if w.target_angle == 0.0
        ));
        // same position again: the next head is far away, so we move
        assert!(matches!(traj.advance(start, &[]), TrajectoryStep::Move(_)));
        assert_eq!(traj.remaining(), 3);
    }

    #[test]
    fn test_bearing_overshoot_pops_head() {
        let mut traj = quarter_ring();
        traj.advance(Vec2::ZERO, &[]);
        // bearing ~1.65 rad, past pi/2, but 11 cm away from the waypoint
        let pos = Vec2::new(-55.0, 60.0);
        match traj.advance(pos, &[]) {
            TrajectoryStep::Reached(w) => assert_relative_eq!(w.target_angle, FRAC_PI_2),
            other => panic!("expected Reached, got {:?}", other),
        }
    }

    #[test]
    fn test_bearing_wrap_does_not_flush_ring() {
        let mut traj = quarter_ring();
        // bearing just below the seam (~ 2*pi - 0.2), far from waypoint 0
        let pos = traj.pivot().point_at(-0.2, 48.0);
        assert!(matches!(traj.advance(pos, &[]), TrajectoryStep::Move(_)));
        assert_eq!(traj.remaining(), 4);
    }

    #[test]
    fn test_move_heads_for_waypoint_at_full_stride() {
        let mut traj = quarter_ring();
        traj.advance(Vec2::ZERO, &[]);
        match traj.advance(Vec2::ZERO, &[]) {
            TrajectoryStep::Move(v) => {
                assert_relative_eq!(v.length(), 5.0, epsilon = 1e-3);
                let toward = Vec2::ZERO.angle_to(&Vec2::new(-50.0, 50.0));
                assert_relative_eq!(v.angle(), toward, epsilon = 1e-3);
            }
            other => panic!("expected Move, got {:?}", other),
        }
    }

    #[test]
    fn test_walking_the_field_consumes_ring_in_order() {
        let mut traj = quarter_ring();
        let mut pos = Vec2::ZERO;
        let mut reached = Vec::new();
        for _ in 0..500 {
            match traj.advance(pos, &[]) {
                TrajectoryStep::Reached(w) => reached.push(w.target_angle),
                TrajectoryStep::Move(v) => pos = pos + v,
                TrajectoryStep::Complete => break,
            }
        }
        assert_eq!(reached.len(), 4);
        let expected = [0.0, FRAC_PI_2, PI, 3.0 * FRAC_PI_2];
        for (got, want) in reached.iter().zip(expected) {
            assert_relative_eq!(*got, want, epsilon = 1e-5);
        }
        assert!(matches!(traj.advance(pos, &[]), TrajectoryStep::Complete));
    }

    #[test]
    fn test_empty_ring_is_complete() {
        let mut traj = Trajectory::circle(Vec2::ZERO, 50.0, 0, 5.0);
        assert!(matches!(traj.advance(Vec2::ZERO, &[]), TrajectoryStep::Complete));
    }
}
