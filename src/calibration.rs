//! Orbit radius calibration.
//!
//! The scanner does not know how far away the object sits, so before
//! each ring it measures: back away in fixed steps, re-center the
//! gimbal on the object after each step, and triangulate the radius
//! from the tilt angle and the distance traveled. The robot returns to
//! its starting spot before the ring begins.

use crate::align::{AlignMode, AlignmentController};
use crate::error::Result;
use crate::motion::MotionDriver;

#[derive(Debug, Clone)]
pub struct CalibrationConfig {
    /// Back-away samples per calibration run.
    pub iterations: usize,
    /// Distance backed up between samples, in cm.
    pub step_cm: f32,
    /// Radius used when calibration is unavailable, in cm.
    pub default_radius: f32,
    /// False when the gimbal camera or the movement API is missing.
    pub enabled: bool,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            iterations: 4,
            step_cm: 10.0,
            default_radius: 50.0,
            enabled: true,
        }
    }
}

pub struct Calibrator {
    config: CalibrationConfig,
}

impl Calibrator {
    pub fn new(config: CalibrationConfig) -> Self {
        Self { config }
    }

    /// Measure the orbit radius, or fall back to the default when the
    /// hardware for measuring is not there. Net displacement is zero.
    pub fn run(&self, driver: &mut MotionDriver, aligner: &AlignmentController) -> Result<f32> {
        if !self.config.enabled || self.config.iterations == 0 {
            tracing::info!(
                "calibration unavailable, using default radius {:.1} cm",
                self.config.default_radius
            );
            return Ok(self.config.default_radius);
        }

        let mut samples = Vec::with_capacity(self.config.iterations);
        let mut traveled = 0.0_f32;
        for _ in 0..self.config.iterations {
            driver.backward(self.config.step_cm, true)?;
            traveled += self.config.step_cm;
            let outcome = aligner.run(driver, AlignMode::RotateGimbal)?;
            if !outcome.centered {
                // aborted or stopped mid-run: walk back and bail out
                driver.forward(traveled, true)?;
                tracing::warn!("calibration interrupted, using default radius");
                return Ok(self.config.default_radius);
            }
            samples.push((traveled, outcome.gimbal_beta));
        }
        driver.forward(traveled, true)?;

        let radius = estimate_radius(&samples);
        if !radius.is_finite() || radius <= 0.0 {
            tracing::warn!(
                "calibration produced radius {:.1}, using default {:.1} cm",
                radius,
                self.config.default_radius
            );
            return Ok(self.config.default_radius);
        }
        tracing::info!(
            "calibrated orbit radius {:.1} cm from {} samples",
            radius,
            samples.len()
        );
        Ok(radius)
    }
}

/// Mean of the per-sample triangulations. Each sample is (distance
/// traveled from the object, gimbal tilt in degrees looking at it);
/// the horizontal range is tan(tilt) * distance.
pub fn estimate_radius(samples: &[(f32, f32)]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples
        .iter()
        .map(|(dist, beta)| beta.to_radians().tan().abs() * dist)
        .sum();
    sum / samples.len() as f32
}
