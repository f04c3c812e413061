//! Scan orchestration state machine.
//!
//! A scan is a stack of rings, one per arm elevation. Each ring starts
//! with a radius calibration, raises the arm to its elevation, then
//! walks a circle of capture waypoints around the object. The machine
//! advances one blocking step at a time and re-checks the abort flag
//! between steps, so a Ctrl-C lands at the next step boundary instead
//! of mid-ring.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::align::{AlignMode, AlignmentController};
use crate::calibration::Calibrator;
use crate::core::Vec2;
use crate::field::{self, ForcePoint};
use crate::motion::MotionDriver;
use crate::shared::ScanStatus;
use crate::trajectory::{Trajectory, TrajectoryStep, Waypoint};
use crate::vision::stream::{self, SharedFrame};
use crate::vision::CaptureStore;

use super::arm::arm_path;

#[derive(Debug, Clone)]
pub struct NavigatorConfig {
    /// Captures per ring.
    pub ring_size: usize,
    /// Arm elevations, one ring each.
    pub elevations: usize,
    /// Longest displacement one circling tick may command, in cm.
    pub step_distance: f32,
    /// Reported obstacles closer than this merge into one, in cm.
    pub min_obstacle_separation: f32,
    /// Field magnitude of a unit-size obstacle.
    pub obstacle_magnitude: f32,
    /// Distance falloff exponent for obstacles.
    pub obstacle_falloff: i32,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            ring_size: 12,
            elevations: 4,
            step_distance: 5.0,
            min_obstacle_separation: 10.0,
            obstacle_magnitude: -1.0e4,
            obstacle_falloff: 2,
        }
    }
}

/// Phase of the running scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Calibrating,
    Circling,
    Capturing,
    ArmAdvance,
    Finishing,
    Done,
}

impl ScanState {
    pub fn name(&self) -> &'static str {
        match self {
            ScanState::Idle => "idle",
            ScanState::Calibrating => "calibrating",
            ScanState::Circling => "circling",
            ScanState::Capturing => "capturing",
            ScanState::ArmAdvance => "arm-advance",
            ScanState::Finishing => "finishing",
            ScanState::Done => "done",
        }
    }
}

/// What a finished scan looked like.
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub pictures_taken: u32,
    pub pictures_total: u32,
    pub aborted: bool,
    pub session_dir: Option<PathBuf>,
}

pub struct Navigator {
    config: NavigatorConfig,
    driver: MotionDriver,
    aligner: AlignmentController,
    calibrator: Calibrator,
    frames: SharedFrame,
    store: Option<CaptureStore>,
    status: Arc<ScanStatus>,
    state: ScanState,
    trajectory: Option<Trajectory>,
    pending: Option<Waypoint>,
    obstacles: Vec<ForcePoint>,
    elevations: Vec<Vec2>,
    pass: usize,
    pictures_taken: u32,
    pictures_total: u32,
    aborted: bool,
}

impl Navigator {
    pub fn new(
        config: NavigatorConfig,
        driver: MotionDriver,
        aligner: AlignmentController,
        calibrator: Calibrator,
        frames: SharedFrame,
        store: Option<CaptureStore>,
        status: Arc<ScanStatus>,
    ) -> Self {
        Self {
            config,
            driver,
            aligner,
            calibrator,
            frames,
            store,
            status,
            state: ScanState::Idle,
            trajectory: None,
            pending: None,
            obstacles: Vec::new(),
            elevations: Vec::new(),
            pass: 0,
            pictures_taken: 0,
            pictures_total: 0,
            aborted: false,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Register a repeller for the circling field. Rejected when an
    /// obstacle is already known within the separation radius.
    pub fn add_obstacle(&mut self, position: Vec2, size: f32) -> bool {
        let known = self
            .obstacles
            .iter()
            .any(|o| o.position.distance(&position) < self.config.min_obstacle_separation);
        if known {
            tracing::debug!(
                "obstacle at ({:.1}, {:.1}) merged into a known one",
                position.x,
                position.y
            );
            return false;
        }
        self.obstacles.push(ForcePoint::new(
            position,
            self.config.obstacle_magnitude * size,
            self.config.obstacle_falloff,
        ));
        tracing::info!(
            "obstacle registered at ({:.1}, {:.1}), size {:.1}",
            position.x,
            position.y,
            size
        );
        true
    }

    /// Reset tracking and arm the first ring.
    fn start(&mut self) {
        self.elevations = arm_path(self.config.elevations);
        self.pictures_total = (self.elevations.len() * self.config.ring_size) as u32;
        self.pass = 0;
        self.pictures_taken = 0;
        self.aborted = false;
        self.trajectory = None;
        self.pending = None;
        self.status.begin(self.pictures_total);

        self.state = if self.elevations.is_empty() {
            ScanState::Finishing
        } else {
            ScanState::Calibrating
        };
        self.status.store_state(self.state);

        let pose = self.driver.pose();
        tracing::info!(
            "Scan started at ({:.1}, {:.1}): {} rings of {} captures",
            pose.position.x,
            pose.position.y,
            self.elevations.len(),
            self.config.ring_size
        );
    }

    /// Run the whole scan to completion, abort or failure.
    pub fn run(&mut self) -> crate::error::Result<ScanReport> {
        self.start();
        if let Err(e) = self.drive() {
            let _ = self.driver.stop();
            let _ = self.driver.device().led_set(255, 0, 0);
            self.status.fail(format!("{} while {}", e, self.state.name()));
            return Err(e);
        }
        let report = self.report();
        tracing::info!(
            "Scan over: {}/{} pictures{}",
            report.pictures_taken,
            report.pictures_total,
            if report.aborted { " (aborted)" } else { "" }
        );
        Ok(report)
    }

    fn drive(&mut self) -> crate::error::Result<()> {
        // body leds tint captures in dim rooms
        self.driver.device().led_set(0, 0, 0)?;
        self.driver.device().display_lines(
            "Scanning",
            &format!("{} rings of {}", self.elevations.len(), self.config.ring_size),
        )?;
        while self.state != ScanState::Done {
            self.step()?;
        }
        Ok(())
    }

    pub fn report(&self) -> ScanReport {
        ScanReport {
            pictures_taken: self.pictures_taken,
            pictures_total: self.pictures_total,
            aborted: self.aborted,
            session_dir: self.store.as_ref().map(|s| s.dir().to_path_buf()),
        }
    }

    /// Advance the machine by one blocking step.
    fn step(&mut self) -> crate::error::Result<()> {
        if self.status.abort_requested()
            && !matches!(self.state, ScanState::Done)
        {
            // halt where we stand, leave the arm in place
            tracing::warn!("scan aborted while {}", self.state.name());
            let _ = self.driver.stop();
            self.aborted = true;
            self.state = ScanState::Done;
            self.status.store_state(self.state);
            return Ok(());
        }

        match self.state {
            ScanState::Idle => self.start(),
            ScanState::Calibrating => self.calibrate_ring()?,
            ScanState::Circling => self.circle()?,
            ScanState::Capturing => self.capture()?,
            ScanState::ArmAdvance => self.next_ring(),
            ScanState::Finishing => self.finish()?,
            ScanState::Done => {}
        }
        self.status.store_state(self.state);
        Ok(())
    }

    /// Measure the radius, raise the arm, lay out the ring.
    fn calibrate_ring(&mut self) -> crate::error::Result<()> {
        let radius = self.calibrator.run(&mut self.driver, &self.aligner)?;
        let elevation = self.elevations[self.pass];
        self.driver.arm_goto(elevation, true)?;

        // the object sits to the robot's left at scan start
        let pose = self.driver.pose();
        let pivot = pose.position - Vec2::new(radius, 0.0);
        self.trajectory = Some(Trajectory::circle(
            pivot,
            radius,
            self.config.ring_size,
            self.config.step_distance,
        ));
        tracing::info!(
            "ring {}/{}: radius {:.1} cm, arm at ({:.1}, {:.1}), pivot ({:.1}, {:.1})",
            self.pass + 1,
            self.elevations.len(),
            radius,
            elevation.x,
            elevation.y,
            pivot.x,
            pivot.y
        );
        self.state = ScanState::Circling;
        Ok(())
    }

    /// One tick of the circling pass.
    fn circle(&mut self) -> crate::error::Result<()> {
        let trajectory = match self.trajectory.as_mut() {
            Some(t) => t,
            None => {
                self.state = ScanState::ArmAdvance;
                return Ok(());
            }
        };
        let pose = self.driver.pose();
        match trajectory.advance(pose.position, &self.obstacles) {
            TrajectoryStep::Reached(waypoint) => {
                tracing::debug!("waypoint reached, {} left in the ring", trajectory.remaining());
                self.pending = Some(waypoint);
                self.state = ScanState::Capturing;
            }
            TrajectoryStep::Move(v) => {
                let norm = v.length();
                if norm < field::EPSILON {
                    // field cancelled out here; hold and let the
                    // operator abort or an obstacle update free us
                    thread::sleep(Duration::from_millis(50));
                    return Ok(());
                }
                self.driver.rotate_by(v.angle() - pose.heading, true)?;
                self.driver.forward(norm, true)?;
            }
            TrajectoryStep::Complete => {
                self.state = ScanState::ArmAdvance;
            }
        }
        Ok(())
    }

    /// Stop, face the object, take the picture.
    fn capture(&mut self) -> crate::error::Result<()> {
        let waypoint = match self.pending.take() {
            Some(w) => w,
            None => {
                self.state = ScanState::Circling;
                return Ok(());
            }
        };
        self.driver.stop()?;

        // point the camera side at the pivot, then let the camera
        // correct the open-loop residue
        let pose = self.driver.pose();
        let correction = waypoint.target_angle - pose.heading + std::f32::consts::FRAC_PI_2;
        self.driver.rotate_by(correction, true)?;
        self.aligner.run(&mut self.driver, AlignMode::RotateBody)?;

        self.save_capture()?;
        self.pictures_taken += 1;
        self.status.add_picture();

        // flash after the grab so the light is not in the frame
        self.driver.device().led_flash(0, 255, 0, 150)?;
        let text = format!(
            "{}/{} pictures taken",
            self.pictures_taken, self.pictures_total
        );
        let percent = (self.pictures_taken * 100 / self.pictures_total.max(1)) as u8;
        self.driver.device().display_progress(&text, percent)?;
        tracing::info!(
            "capture {}/{} at bearing {:.2}",
            self.pictures_taken,
            self.pictures_total,
            waypoint.target_angle
        );

        self.state = ScanState::Circling;
        Ok(())
    }

    fn save_capture(&mut self) -> crate::error::Result<()> {
        match (stream::latest(&self.frames), self.store.as_mut()) {
            (Some(frame), Some(store)) => {
                let path = store.save(&frame)?;
                tracing::debug!("saved {}", path.display());
            }
            (None, Some(_)) => {
                tracing::warn!("no frame available, capture {} skipped", self.pictures_taken + 1);
            }
            (_, None) => {}
        }
        Ok(())
    }

    fn next_ring(&mut self) {
        self.pass += 1;
        self.trajectory = None;
        self.state = if self.pass >= self.elevations.len() {
            ScanState::Finishing
        } else {
            ScanState::Calibrating
        };
    }

    /// Park the arm and tell the operator we are done.
    fn finish(&mut self) -> crate::error::Result<()> {
        self.driver.arm_home(true)?;
        let text = format!("Scan complete: {} pictures", self.pictures_taken);
        self.driver.device().display_text(&text)?;
        self.driver.device().led_rainbow()?;
        if let Some(store) = &self.store {
            tracing::info!("{} captures in {}", store.count(), store.dir().display());
        }
        self.state = ScanState::Done;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::AlignConfig;
    use crate::calibration::CalibrationConfig;
    use crate::client::testing::RecordingDevice;
    use crate::error::ParikramaError;
    use crate::motion::DriverConfig;
    use crate::vision::segment::testing::ScriptedSegmenter;
    use crate::vision::stream::Frame;
    use approx::assert_relative_eq;

    struct Rig {
        navigator: Navigator,
        device: RecordingDevice,
        status: Arc<ScanStatus>,
    }

    /// Scan rig with calibration and cameras off: pure dead-reckoned
    /// geometry, no sleeps.
    fn blind_rig(ring_size: usize, elevations: usize, store: Option<CaptureStore>) -> Rig {
        let device = RecordingDevice::new();
        let driver = MotionDriver::new(
            Box::new(device.clone()),
            DriverConfig {
                distance_to_ms: 0.0,
                angle_to_ms: 0.0,
                gimbal_angle_to_ms: 0.0,
                arm_settle_ms: 0,
            },
        );
        let status = Arc::new(ScanStatus::new());
        let frames = stream::shared_frame();
        let aligner = AlignmentController::new(
            AlignConfig {
                enabled: false,
                ..AlignConfig::default()
            },
            Box::new(ScriptedSegmenter::blind()),
            Arc::clone(&frames),
            Arc::clone(&status),
        );
        let calibrator = Calibrator::new(CalibrationConfig {
            enabled: false,
            default_radius: 50.0,
            ..CalibrationConfig::default()
        });
        let navigator = Navigator::new(
            NavigatorConfig {
                ring_size,
                elevations,
                ..NavigatorConfig::default()
            },
            driver,
            aligner,
            calibrator,
            frames,
            store,
            status.clone(),
        );
        Rig {
            navigator,
            device,
            status,
        }
    }

    #[test]
    fn test_single_ring_scan_end_to_end() {
        let mut rig = blind_rig(4, 1, None);
        let report = rig.navigator.run().unwrap();

        assert_eq!(report.pictures_taken, 4);
        assert_eq!(report.pictures_total, 4);
        assert!(!report.aborted);
        assert_eq!(rig.navigator.state(), ScanState::Done);
        assert_eq!(rig.status.pictures(), (4, 4));
        assert_eq!(rig.status.state(), ScanState::Done);

        let commands = rig.device.commands();
        // one elevation: the arm goes to the top position, then home
        assert_eq!(
            commands.iter().filter(|c| c.contains("arm goto")).count(),
            1
        );
        assert!(commands.iter().any(|c| c == &"arm goto 0.0 80.0"));
        assert_eq!(commands.last().unwrap(), "led rainbow");
        assert_eq!(commands.iter().filter(|c| c == &"arm home").count(), 1);
        // a progress update per capture
        let progress: Vec<_> = commands.iter().filter(|c| c.starts_with("progress")).collect();
        assert_eq!(progress.len(), 4);
        assert_eq!(progress[0], &"progress 1/4 pictures taken 25");
        assert_eq!(progress[3], &"progress 4/4 pictures taken 100");
    }

    #[test]
    fn test_ring_walks_a_quarter_circle_per_capture() {
        let mut rig = blind_rig(4, 1, None);
        // drive the machine manually and sample poses at captures
        rig.navigator.start();
        let mut capture_positions = Vec::new();
        for _ in 0..2000 {
            if rig.navigator.state() == ScanState::Capturing {
                capture_positions.push(rig.navigator.driver.pose().position);
            }
            if rig.navigator.state() == ScanState::Done {
                break;
            }
            rig.navigator.step().unwrap();
        }
        assert_eq!(capture_positions.len(), 4);
        // captures land near the ring waypoints around pivot (-50, 0)
        let pivot = Vec2::new(-50.0, 0.0);
        let expected = [
            Vec2::new(0.0, 0.0),
            Vec2::new(-50.0, 50.0),
            Vec2::new(-100.0, 0.0),
            Vec2::new(-50.0, -50.0),
        ];
        for (got, want) in capture_positions.iter().zip(expected) {
            assert!(
                got.distance(&want) <= 6.0,
                "capture at ({:.1}, {:.1}), wanted near ({:.1}, {:.1})",
                got.x,
                got.y,
                want.x,
                want.y
            );
            // and roughly on the circle itself
            assert_relative_eq!(pivot.distance(got), 50.0, epsilon = 6.0);
        }
    }

    #[test]
    fn test_abort_unwinds_without_parking_arm() {
        let mut rig = blind_rig(4, 2, None);
        rig.status.request_abort();
        let report = rig.navigator.run().unwrap();

        assert!(report.aborted);
        assert_eq!(report.pictures_taken, 0);
        assert_eq!(rig.navigator.state(), ScanState::Done);
        let commands = rig.device.commands();
        // motors halted, arm left where it was
        assert_eq!(
            commands,
            vec!["led 0 0 0", "display Scanning / 2 rings of 4", "halt"]
        );
    }

    #[test]
    fn test_connection_loss_fails_the_scan() {
        let mut rig = blind_rig(4, 1, None);
        rig.device.fail_after(3);
        let err = rig.navigator.run().unwrap_err();
        assert!(matches!(err, ParikramaError::Connection(_)));
        assert!(rig.status.is_failed());
        assert!(rig.status.fail_reason().unwrap().contains("Connection"));
    }

    #[test]
    fn test_captures_land_in_the_store() {
        let root = tempfile::tempdir().unwrap();
        let store = CaptureStore::create(root.path()).unwrap();
        let mut rig = blind_rig(1, 1, Some(store));
        *rig.navigator.frames.write().unwrap() = Some(Arc::new(Frame {
            jpeg: b"jpegbytes".to_vec(),
            width: 64,
            height: 48,
        }));

        let report = rig.navigator.run().unwrap();
        assert_eq!(report.pictures_taken, 1);
        let dir = report.session_dir.unwrap();
        let saved = dir.join("capture_0001.jpg");
        assert_eq!(std::fs::read(&saved).unwrap(), b"jpegbytes");
    }

    #[test]
    fn test_obstacles_merge_within_separation() {
        let mut rig = blind_rig(4, 1, None);
        assert!(rig.navigator.add_obstacle(Vec2::new(30.0, 0.0), 1.0));
        assert!(!rig.navigator.add_obstacle(Vec2::new(34.0, 3.0), 1.0));
        assert!(rig.navigator.add_obstacle(Vec2::new(30.0, 20.0), 2.0));
        assert_eq!(rig.navigator.obstacles.len(), 2);
        assert_relative_eq!(rig.navigator.obstacles[1].magnitude, -2.0e4);
        // obstacles registered before the scan survive the start reset
        rig.navigator.start();
        assert_eq!(rig.navigator.obstacles.len(), 2);
    }

    #[test]
    fn test_zero_elevations_still_parks_and_reports() {
        let mut rig = blind_rig(4, 0, None);
        let report = rig.navigator.run().unwrap();
        assert_eq!(report.pictures_total, 0);
        assert_eq!(report.pictures_taken, 0);
        assert!(!report.aborted);
        assert!(rig.device.commands().iter().any(|c| c == "arm home"));
    }
}
