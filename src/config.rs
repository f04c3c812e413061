//! Configuration loading for Parikrama.
//!
//! Everything has a usable default so a bare `parikrama` invocation can
//! drive the stock scanner. A TOML file overrides per section.

use serde::Deserialize;
use std::path::Path;

use crate::error::{ParikramaError, Result};

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ParikramaConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub motion: MotionConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub alignment: AlignmentConfig,
    #[serde(default)]
    pub vision: VisionConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Which hardware is attached and where to reach it.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Base URL of the scanner's command API (default http://superscanner8000:80)
    #[serde(default = "default_device_url")]
    pub device_url: String,

    /// Request timeout in milliseconds (default 3000)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Movement API attached (default true)
    #[serde(default = "default_true")]
    pub movement_enabled: bool,

    /// Arm-mounted gimbal camera attached (default true)
    #[serde(default = "default_true")]
    pub gimbal_cam_enabled: bool,

    /// Forward navigation camera attached (default false)
    #[serde(default = "default_false")]
    pub front_cam_enabled: bool,

    /// Log device commands instead of sending them (default false)
    #[serde(default = "default_false")]
    pub simulation: bool,
}

/// Open-loop motion conversion constants, measured on the hardware.
#[derive(Debug, Clone, Deserialize)]
pub struct MotionConfig {
    /// Motor run time per centimetre of travel, in ms (default 66.0)
    #[serde(default = "default_distance_to_ms")]
    pub distance_to_ms: f32,

    /// Motor run time per radian of body rotation, in ms (default 1591.55)
    #[serde(default = "default_angle_to_ms")]
    pub angle_to_ms: f32,

    /// Gimbal run time per degree of axis travel, in ms (default 1.0)
    #[serde(default = "default_gimbal_angle_to_ms")]
    pub gimbal_angle_to_ms: f32,

    /// Settle time after an arm move, in ms (default 2000)
    #[serde(default = "default_arm_settle_ms")]
    pub arm_settle_ms: u64,

    /// Longest displacement one circling tick may command, in cm (default 5.0)
    #[serde(default = "default_step_distance")]
    pub step_distance: f32,
}

/// Scan shape and calibration.
#[derive(Debug, Clone, Deserialize)]
pub struct ScanConfig {
    /// Pictures taken per ring (default 12)
    #[serde(default = "default_horizontal_precision")]
    pub horizontal_precision: usize,

    /// Arm elevations, one ring each (default 4)
    #[serde(default = "default_vertical_precision")]
    pub vertical_precision: usize,

    /// Orbit radius when calibration is unavailable, in cm (default 50.0)
    #[serde(default = "default_radius")]
    pub default_radius: f32,

    /// Measure the orbit radius before each ring (default true)
    #[serde(default = "default_true")]
    pub calibrate: bool,

    /// Calibration samples per ring (default 4)
    #[serde(default = "default_calibration_iterations")]
    pub calibration_iterations: usize,

    /// Distance backed up between calibration samples, in cm (default 10.0)
    #[serde(default = "default_calibration_step")]
    pub calibration_step: f32,

    /// Reported obstacles closer than this merge into one, in cm (default 10.0)
    #[serde(default = "default_min_obstacle_separation")]
    pub min_obstacle_separation: f32,

    /// Field magnitude of a unit-size obstacle (default -1e4)
    #[serde(default = "default_obstacle_magnitude")]
    pub obstacle_magnitude: f32,

    /// Distance falloff exponent for obstacles (default 2)
    #[serde(default = "default_obstacle_falloff")]
    pub obstacle_falloff: i32,

    /// Obstacles known up front, registered before the scan starts
    #[serde(default)]
    pub obstacles: Vec<ObstacleConfig>,
}

/// A fixed obstacle the circling pass must steer around.
#[derive(Debug, Clone, Deserialize)]
pub struct ObstacleConfig {
    /// Position in the scan frame, in cm
    pub x: f32,
    pub y: f32,

    /// Relative size, scales the repulsion (default 1.0)
    #[serde(default = "default_obstacle_size")]
    pub size: f32,
}

/// Camera-feedback alignment loop.
#[derive(Debug, Clone, Deserialize)]
pub struct AlignmentConfig {
    /// Pixel offset under which the object counts as centered (default 20.0)
    #[serde(default = "default_center_threshold")]
    pub center_threshold: f32,

    /// Delay between correction ticks, in ms (default 300)
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Translation gain in cm per sqrt-pixel (default 0.5)
    #[serde(default = "default_translate_gain")]
    pub translate_gain: f32,

    /// Body rotation gain in rad per sqrt-pixel (default 0.02)
    #[serde(default = "default_rotate_gain")]
    pub rotate_gain: f32,

    /// Gimbal tilt gain in deg per sqrt-pixel (default 0.8)
    #[serde(default = "default_gimbal_gain")]
    pub gimbal_gain: f32,
}

/// Video streams and the segmentation sidecar.
#[derive(Debug, Clone, Deserialize)]
pub struct VisionConfig {
    /// UDP port of the gimbal camera stream (default 12346)
    #[serde(default = "default_gimbal_cam_port")]
    pub gimbal_cam_port: u16,

    /// UDP port of the front camera stream (default 22222)
    #[serde(default = "default_front_cam_port")]
    pub front_cam_port: u16,

    /// Segmentation service endpoint (default http://127.0.0.1:8090/segment)
    #[serde(default = "default_segmenter_url")]
    pub segmenter_url: String,

    /// Segmentation request timeout in ms (default 10000)
    #[serde(default = "default_segmenter_timeout_ms")]
    pub segmenter_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory that scan session folders are created under (default "captures")
    #[serde(default = "default_capture_dir")]
    pub capture_dir: String,
}

impl ParikramaConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ParikramaError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: ParikramaConfig = toml::from_str(&content)?;
        Ok(config)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            device_url: default_device_url(),
            timeout_ms: default_timeout_ms(),
            movement_enabled: default_true(),
            gimbal_cam_enabled: default_true(),
            front_cam_enabled: default_false(),
            simulation: default_false(),
        }
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            distance_to_ms: default_distance_to_ms(),
            angle_to_ms: default_angle_to_ms(),
            gimbal_angle_to_ms: default_gimbal_angle_to_ms(),
            arm_settle_ms: default_arm_settle_ms(),
            step_distance: default_step_distance(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            horizontal_precision: default_horizontal_precision(),
            vertical_precision: default_vertical_precision(),
            default_radius: default_radius(),
            calibrate: default_true(),
            calibration_iterations: default_calibration_iterations(),
            calibration_step: default_calibration_step(),
            min_obstacle_separation: default_min_obstacle_separation(),
            obstacle_magnitude: default_obstacle_magnitude(),
            obstacle_falloff: default_obstacle_falloff(),
            obstacles: Vec::new(),
        }
    }
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            center_threshold: default_center_threshold(),
            tick_interval_ms: default_tick_interval_ms(),
            translate_gain: default_translate_gain(),
            rotate_gain: default_rotate_gain(),
            gimbal_gain: default_gimbal_gain(),
        }
    }
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            gimbal_cam_port: default_gimbal_cam_port(),
            front_cam_port: default_front_cam_port(),
            segmenter_url: default_segmenter_url(),
            segmenter_timeout_ms: default_segmenter_timeout_ms(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            capture_dir: default_capture_dir(),
        }
    }
}

// Connection defaults

fn default_device_url() -> String {
    "http://superscanner8000:80".to_string()
}

fn default_timeout_ms() -> u64 {
    3000
}

fn default_true() -> bool {
    true
}

fn default_false() -> bool {
    false
}

// Motion defaults

fn default_distance_to_ms() -> f32 {
    66.0
}

fn default_angle_to_ms() -> f32 {
    1591.55
}

fn default_gimbal_angle_to_ms() -> f32 {
    1.0
}

fn default_arm_settle_ms() -> u64 {
    2000
}

fn default_step_distance() -> f32 {
    5.0
}

// Scan defaults

fn default_horizontal_precision() -> usize {
    12
}

fn default_vertical_precision() -> usize {
    4
}

fn default_radius() -> f32 {
    50.0
}

fn default_calibration_iterations() -> usize {
    4
}

fn default_calibration_step() -> f32 {
    10.0
}

fn default_min_obstacle_separation() -> f32 {
    10.0
}

fn default_obstacle_magnitude() -> f32 {
    -1.0e4
}

fn default_obstacle_falloff() -> i32 {
    2
}

fn default_obstacle_size() -> f32 {
    1.0
}

// Alignment defaults

fn default_center_threshold() -> f32 {
    20.0
}

fn default_tick_interval_ms() -> u64 {
    300
}

fn default_translate_gain() -> f32 {
    0.5
}

fn default_rotate_gain() -> f32 {
    0.02
}

fn default_gimbal_gain() -> f32 {
    0.8
}

// Vision defaults

fn default_gimbal_cam_port() -> u16 {
    12346
}

fn default_front_cam_port() -> u16 {
    22222
}

fn default_segmenter_url() -> String {
    "http://127.0.0.1:8090/segment".to_string()
}

fn default_segmenter_timeout_ms() -> u64 {
    10_000
}

// Output defaults

fn default_capture_dir() -> String {
    "captures".to_string()
}
