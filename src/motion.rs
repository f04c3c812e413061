//! Motion driver: physical amounts in, timed device commands out.
//!
//! The scanner has no encoders. Every move is open loop: distance and
//! angle convert to a motor run time through measured constants, the
//! device runs for that long, and the pose is updated optimistically
//! once the command is accepted. A rejected command leaves the pose
//! untouched.

use std::f32::consts::PI;
use std::thread;
use std::time::Duration;

use crate::client::{DeviceApi, DriveCommand};
use crate::core::{Pose, TWO_PI, Vec2, normalize_degrees, normalize_heading};
use crate::error::Result;

/// Conversion constants between physical amounts and motor run time.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// ms of wheel run time per cm of travel
    pub distance_to_ms: f32,
    /// ms of wheel run time per radian of body rotation
    pub angle_to_ms: f32,
    /// ms of gimbal run time per degree of axis travel
    pub gimbal_angle_to_ms: f32,
    /// settle time after an arm move, in ms
    pub arm_settle_ms: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            distance_to_ms: 66.0,
            angle_to_ms: 1591.55,
            gimbal_angle_to_ms: 1.0,
            arm_settle_ms: 2000,
        }
    }
}

/// Gimbal axes in device degrees, each kept in (-180, 180]. Alpha pans,
/// beta tilts, beta 0 is level and positive tilts up.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GimbalAngles {
    pub alpha: f32,
    pub beta: f32,
}

pub struct MotionDriver {
    device: Box<dyn DeviceApi>,
    config: DriverConfig,
    pose: Pose,
    gimbal: GimbalAngles,
}

impl MotionDriver {
    /// Scan-start convention: the robot sits at the origin facing +y,
    /// with the object off to its left along -x.
    pub fn new(device: Box<dyn DeviceApi>, config: DriverConfig) -> Self {
        Self {
            device,
            config,
            pose: Pose::new(Vec2::ZERO, PI / 2.0),
            gimbal: GimbalAngles::default(),
        }
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn gimbal(&self) -> GimbalAngles {
        self.gimbal
    }

    pub fn device(&self) -> &dyn DeviceApi {
        self.device.as_ref()
    }

    /// Drive forward by `cm`. With `wait` the call blocks until the
    /// motors have run their course.
    pub fn forward(&mut self, cm: f32, wait: bool) -> Result<()> {
        let cm = cm.max(0.0);
        let ms = (cm * self.config.distance_to_ms).round() as u32;
        self.device.drive(DriveCommand::Forward, ms)?;
        self.pose.advance(cm);
        tracing::debug!("forward {:.1} cm ({} ms)", cm, ms);
        self.pause(ms, wait);
        Ok(())
    }

    pub fn backward(&mut self, cm: f32, wait: bool) -> Result<()> {
        let cm = cm.max(0.0);
        let ms = (cm * self.config.distance_to_ms).round() as u32;
        self.device.drive(DriveCommand::Backward, ms)?;
        self.pose.advance(-cm);
        tracing::debug!("backward {:.1} cm ({} ms)", cm, ms);
        self.pause(ms, wait);
        Ok(())
    }

    /// Spin counter-clockwise by `rad`.
    pub fn rotate_left(&mut self, rad: f32, wait: bool) -> Result<()> {
        let rad = rad.max(0.0);
        let ms = (rad * self.config.angle_to_ms).round() as u32;
        self.device.drive(DriveCommand::SpinLeft, ms)?;
        self.pose.rotate(rad);
        tracing::debug!("rotate left {:.3} rad ({} ms)", rad, ms);
        self.pause(ms, wait);
        Ok(())
    }

    /// Spin clockwise by `rad`.
    pub fn rotate_right(&mut self, rad: f32, wait: bool) -> Result<()> {
        let rad = rad.max(0.0);
        let ms = (rad * self.config.angle_to_ms).round() as u32;
        self.device.drive(DriveCommand::SpinRight, ms)?;
        self.pose.rotate(-rad);
        tracing::debug!("rotate right {:.3} rad ({} ms)", rad, ms);
        self.pause(ms, wait);
        Ok(())
    }

    /// Rotate by a signed delta, spinning whichever way is shorter.
    pub fn rotate_by(&mut self, delta: f32, wait: bool) -> Result<()> {
        let delta = normalize_heading(delta);
        if delta == 0.0 {
            return Ok(());
        }
        if delta <= PI {
            self.rotate_left(delta, wait)
        } else {
            self.rotate_right(TWO_PI - delta, wait)
        }
    }

    pub fn stop(&mut self) -> Result<()> {
        self.device.halt()
    }

    pub fn arm_goto(&mut self, target: Vec2, wait: bool) -> Result<()> {
        self.device.arm_goto(target.x, target.y, false)?;
        tracing::debug!("arm to ({:.1}, {:.1})", target.x, target.y);
        self.pause(self.config.arm_settle_ms as u32, wait);
        Ok(())
    }

    pub fn arm_home(&mut self, wait: bool) -> Result<()> {
        self.device.arm_goto(0.0, 0.0, true)?;
        tracing::debug!("arm homing");
        self.pause(self.config.arm_settle_ms as u32, wait);
        Ok(())
    }

    /// Point the gimbal at absolute axis angles in degrees.
    pub fn gimbal_goto(&mut self, alpha: f32, beta: f32, wait: bool) -> Result<()> {
        let alpha = normalize_degrees(alpha);
        let beta = normalize_degrees(beta);
        // run time follows the larger axis travel, short way around
        let travel = normalize_degrees(alpha - self.gimbal.alpha)
            .abs()
            .max(normalize_degrees(beta - self.gimbal.beta).abs());
        let ms = (travel * self.config.gimbal_angle_to_ms).round() as u32;
        self.device.gimbal_goto(alpha, beta)?;
        self.gimbal = GimbalAngles { alpha, beta };
        self.pause(ms, wait);
        Ok(())
    }

    /// Nudge the gimbal by degree deltas.
    pub fn gimbal_adjust(&mut self, d_alpha: f32, d_beta: f32, wait: bool) -> Result<()> {
        self.gimbal_goto(self.gimbal.alpha + d_alpha, self.gimbal.beta + d_beta, wait)
    }

    fn pause(&self, ms: u32, wait: bool) {
        if wait && ms > 0 {
            thread::sleep(Duration::from_millis(ms as u64));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::RecordingDevice;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    /// Zero conversion constants keep tests free of real sleeps.
    fn instant_config() -> DriverConfig {
        DriverConfig {
            distance_to_ms: 0.0,
            angle_to_ms: 0.0,
            gimbal_angle_to_ms: 0.0,
            arm_settle_ms: 0,
        }
    }

    fn driver() -> (MotionDriver, RecordingDevice) {
        let device = RecordingDevice::new();
        let driver = MotionDriver::new(Box::new(device.clone()), instant_config());
        (driver, device)
    }

    #[test]
    fn test_dead_reckoning_sums_displacements() {
        let (mut driver, _) = driver();
        driver.forward(10.0, true).unwrap();
        driver.rotate_right(FRAC_PI_2, true).unwrap();
        driver.forward(4.0, true).unwrap();
        driver.backward(1.0, true).unwrap();
        let pose = driver.pose();
        // up 10, then right (heading 0) 3 net
        assert_relative_eq!(pose.position.x, 3.0, epsilon = 1e-4);
        assert_relative_eq!(pose.position.y, 10.0, epsilon = 1e-4);
        assert_relative_eq!(pose.heading, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_heading_stays_normalized() {
        let (mut driver, _) = driver();
        for _ in 0..5 {
            driver.rotate_left(2.0, true).unwrap();
        }
        let heading = driver.pose().heading;
        assert!((0.0..TWO_PI).contains(&heading));
        assert_relative_eq!(heading, normalize_heading(FRAC_PI_2 + 10.0), epsilon = 1e-4);
    }

    #[test]
    fn test_wire_milliseconds_are_rounded() {
        let device = RecordingDevice::new();
        let mut driver = MotionDriver::new(
            Box::new(device.clone()),
            DriverConfig {
                distance_to_ms: 66.0,
                angle_to_ms: 0.0,
                gimbal_angle_to_ms: 0.0,
                arm_settle_ms: 0,
            },
        );
        driver.forward(5.0, false).unwrap();
        assert_eq!(device.commands(), vec!["drive Forward 330"]);
    }

    #[test]
    fn test_rotate_by_takes_shortest_way() {
        let (mut driver, device) = driver();
        // 3/2 pi left is 1/2 pi right
        driver.rotate_by(3.0 * FRAC_PI_2, true).unwrap();
        assert_eq!(device.commands(), vec!["drive SpinRight 0"]);
        assert_relative_eq!(driver.pose().heading, 0.0, epsilon = 1e-5);

        driver.rotate_by(FRAC_PI_2, true).unwrap();
        assert_relative_eq!(driver.pose().heading, FRAC_PI_2, epsilon = 1e-5);
        assert_eq!(device.commands().len(), 2);

        // a full turn is a no-op
        driver.rotate_by(TWO_PI, true).unwrap();
        assert_eq!(device.commands().len(), 2);
    }

    #[test]
    fn test_gimbal_angles_normalize() {
        let (mut driver, device) = driver();
        driver.gimbal_goto(190.0, -270.0, true).unwrap();
        let gimbal = driver.gimbal();
        assert_relative_eq!(gimbal.alpha, -170.0, epsilon = 1e-4);
        assert_relative_eq!(gimbal.beta, 90.0, epsilon = 1e-4);
        assert_eq!(device.commands(), vec!["gimbal goto -170.0 90.0"]);

        driver.gimbal_adjust(0.0, -10.0, true).unwrap();
        assert_relative_eq!(driver.gimbal().beta, 80.0, epsilon = 1e-4);
    }

    #[test]
    fn test_rejected_command_leaves_pose_untouched() {
        let (mut driver, device) = driver();
        device.fail_after(0);
        let before = driver.pose();
        assert!(driver.forward(10.0, true).is_err());
        assert_eq!(driver.pose(), before);
        assert!(device.commands().is_empty());
    }
}
