//! Camera-feedback alignment.
//!
//! Keeps the scanned object centered in the gimbal camera frame by
//! issuing small damped corrections. Corrections scale with the square
//! root of the pixel offset, gentle near the center and still quick
//! from the frame edge. When the object is out of view the loop holds
//! position and waits for it to come back rather than guessing.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::error::Result;
use crate::motion::MotionDriver;
use crate::shared::ScanStatus;
use crate::vision::ObjectSegmenter;
use crate::vision::stream::{self, SharedFrame};

/// Which actuator absorbs the pixel offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignMode {
    /// Frame-x offset corrected by driving forward or backward.
    Translate,
    /// Frame-x offset corrected by yawing the body.
    RotateBody,
    /// Frame-y offset corrected by tilting the gimbal.
    RotateGimbal,
}

#[derive(Debug, Clone)]
pub struct AlignConfig {
    /// Pixel offset under which the object counts as centered.
    pub center_threshold: f32,
    /// Delay between correction ticks.
    pub tick_interval: Duration,
    /// cm of travel per sqrt-pixel of offset.
    pub translate_gain: f32,
    /// rad of yaw per sqrt-pixel of offset.
    pub rotate_gain: f32,
    /// deg of tilt per sqrt-pixel of offset.
    pub gimbal_gain: f32,
    /// False when the gimbal camera is not attached; alignment then
    /// reports back immediately instead of waiting for frames.
    pub enabled: bool,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            center_threshold: 20.0,
            tick_interval: Duration::from_millis(300),
            translate_gain: 0.5,
            rotate_gain: 0.02,
            gimbal_gain: 0.8,
            enabled: true,
        }
    }
}

/// Result of one alignment tick.
#[derive(Debug, Clone, Copy)]
pub enum AlignTick {
    /// Offset within threshold; carries the gimbal tilt at that moment.
    Centered(f32),
    /// One correction was issued.
    Corrected,
    /// No frame yet, or the object is not in view. Nothing commanded.
    NoTarget,
}

/// Terminal state of a blocking alignment.
#[derive(Debug, Clone, Copy)]
pub struct AlignOutcome {
    /// True when the loop ended with the object centered. False means
    /// the alignment was skipped, stopped or aborted.
    pub centered: bool,
    /// Gimbal tilt in degrees when the loop ended. For RotateGimbal on
    /// a centered object this is the triangulation angle.
    pub gimbal_beta: f32,
}

pub struct AlignmentController {
    config: AlignConfig,
    segmenter: Box<dyn ObjectSegmenter>,
    frames: SharedFrame,
    status: Arc<ScanStatus>,
    aligning: Arc<AtomicBool>,
}

impl AlignmentController {
    pub fn new(
        config: AlignConfig,
        segmenter: Box<dyn ObjectSegmenter>,
        frames: SharedFrame,
        status: Arc<ScanStatus>,
    ) -> Self {
        Self {
            config,
            segmenter,
            frames,
            status,
            aligning: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_aligning(&self) -> bool {
        self.aligning.load(Ordering::Acquire)
    }

    /// Cancel a running blocking alignment at its next tick.
    pub fn stop(&self) {
        self.aligning.store(false, Ordering::Release);
    }

    /// One correction tick against the newest frame.
    pub fn tick(&self, driver: &mut MotionDriver, mode: AlignMode) -> Result<AlignTick> {
        let frame = match stream::latest(&self.frames) {
            Some(frame) => frame,
            None => return Ok(AlignTick::NoTarget),
        };
        let centroid = match self.segmenter.locate(&frame)? {
            Some(centroid) => centroid,
            None => return Ok(AlignTick::NoTarget),
        };

        let diff = centroid - frame.center();
        let offset = match mode {
            AlignMode::Translate | AlignMode::RotateBody => diff.x,
            AlignMode::RotateGimbal => diff.y,
        };
        if offset.abs() <= self.config.center_threshold {
            return Ok(AlignTick::Centered(driver.gimbal().beta));
        }

        let step = offset.abs().sqrt();
        match mode {
            AlignMode::Translate => {
                let cm = step * self.config.translate_gain;
                if offset > 0.0 {
                    driver.forward(cm, true)?;
                } else {
                    driver.backward(cm, true)?;
                }
            }
            AlignMode::RotateBody => {
                let rad = step * self.config.rotate_gain;
                if offset > 0.0 {
                    driver.rotate_right(rad, true)?;
                } else {
                    driver.rotate_left(rad, true)?;
                }
            }
            AlignMode::RotateGimbal => {
                // image y grows downward: object below center tilts down
                let deg = step * self.config.gimbal_gain;
                let delta = if offset > 0.0 { -deg } else { deg };
                driver.gimbal_adjust(0.0, delta, true)?;
            }
        }
        Ok(AlignTick::Corrected)
    }

    /// Block until the object is centered, the scan aborts, or `stop`
    /// is called.
    pub fn run(&self, driver: &mut MotionDriver, mode: AlignMode) -> Result<AlignOutcome> {
        if !self.config.enabled {
            tracing::debug!("alignment skipped: no gimbal camera");
            return Ok(AlignOutcome {
                centered: false,
                gimbal_beta: driver.gimbal().beta,
            });
        }

        self.aligning.store(true, Ordering::Release);
        loop {
            if self.status.abort_requested() || !self.aligning.load(Ordering::Acquire) {
                self.aligning.store(false, Ordering::Release);
                tracing::debug!("alignment stopped before centering");
                return Ok(AlignOutcome {
                    centered: false,
                    gimbal_beta: driver.gimbal().beta,
                });
            }
            match self.tick(driver, mode) {
                Ok(AlignTick::Centered(gimbal_beta)) => {
                    self.aligning.store(false, Ordering::Release);
                    return Ok(AlignOutcome {
                        centered: true,
                        gimbal_beta,
                    });
                }
                Ok(AlignTick::Corrected | AlignTick::NoTarget) => {}
                Err(e) => {
                    // flag down on every exit, errors included
                    self.aligning.store(false, Ordering::Release);
                    return Err(e);
                }
            }
            thread::sleep(self.config.tick_interval);
        }
    }
}
