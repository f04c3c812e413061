//! Parikrama - orbit-scan controller for the SuperScanner photogrammetry rig.
//!
//! Drives the scanner over its onboard HTTP API: dead-reckoned motion,
//! potential-field circling around the object, camera-feedback
//! alignment, and ordered JPEG captures for the photogrammetry
//! pipeline.
//!
//! ## Threads
//!
//! - **Scan worker**: runs the blocking scan state machine
//! - **Video listeners**: reassemble the UDP JPEG streams into
//!   current-frame slots, one per camera
//! - **Main thread**: loads config, monitors progress, handles Ctrl-C

mod align;
mod calibration;
mod client;
mod config;
mod core;
mod error;
mod field;
mod motion;
mod scan;
mod shared;
mod trajectory;
mod vision;

use std::env;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::align::{AlignConfig, AlignmentController};
use crate::calibration::{CalibrationConfig, Calibrator};
use crate::client::{DeviceApi, HttpDevice, SimDevice};
use crate::config::ParikramaConfig;
use crate::core::Vec2;
use crate::error::{ParikramaError, Result};
use crate::motion::{DriverConfig, MotionDriver};
use crate::scan::{Navigator, NavigatorConfig, ScanState};
use crate::shared::ScanStatus;
use crate::vision::{CaptureStore, RemoteSegmenter, VideoStream};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("parikrama=info".parse().unwrap()),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let mut config = load_config(&args)?;
    apply_overrides(&mut config, &args);

    info!("Parikrama v{}", env!("CARGO_PKG_VERSION"));

    // Device: HTTP against the hardware, or a dry run when flagged off
    let device: Box<dyn DeviceApi> =
        if config.connection.simulation || !config.connection.movement_enabled {
            info!("simulation: device commands are logged, not sent");
            Box::new(SimDevice)
        } else {
            let device = HttpDevice::new(
                &config.connection.device_url,
                Duration::from_millis(config.connection.timeout_ms),
            )?;
            device.check()?;
            info!("scanner reachable at {}", config.connection.device_url);
            Box::new(device)
        };

    // Video listeners fill one frame slot per camera
    let gimbal_frames = vision::shared_frame();
    let front_frames = vision::shared_frame();
    let mut streams = Vec::new();
    if config.connection.gimbal_cam_enabled {
        streams.push(VideoStream::spawn(
            "gimbal",
            config.vision.gimbal_cam_port,
            Arc::clone(&gimbal_frames),
        )?);
    }
    if config.connection.front_cam_enabled {
        streams.push(VideoStream::spawn(
            "front",
            config.vision.front_cam_port,
            Arc::clone(&front_frames),
        )?);
    }

    let status = Arc::new(ScanStatus::new());

    let driver = MotionDriver::new(
        device,
        DriverConfig {
            distance_to_ms: config.motion.distance_to_ms,
            angle_to_ms: config.motion.angle_to_ms,
            gimbal_angle_to_ms: config.motion.gimbal_angle_to_ms,
            arm_settle_ms: config.motion.arm_settle_ms,
        },
    );

    let segmenter = RemoteSegmenter::new(
        &config.vision.segmenter_url,
        Duration::from_millis(config.vision.segmenter_timeout_ms),
    )?;
    let aligner = AlignmentController::new(
        AlignConfig {
            center_threshold: config.alignment.center_threshold,
            tick_interval: Duration::from_millis(config.alignment.tick_interval_ms),
            translate_gain: config.alignment.translate_gain,
            rotate_gain: config.alignment.rotate_gain,
            gimbal_gain: config.alignment.gimbal_gain,
            enabled: config.connection.gimbal_cam_enabled,
        },
        Box::new(segmenter),
        Arc::clone(&gimbal_frames),
        Arc::clone(&status),
    );

    let calibrator = Calibrator::new(CalibrationConfig {
        iterations: config.scan.calibration_iterations,
        step_cm: config.scan.calibration_step,
        default_radius: config.scan.default_radius,
        enabled: config.scan.calibrate
            && config.connection.gimbal_cam_enabled
            && config.connection.movement_enabled,
    });

    let store = CaptureStore::create(Path::new(&config.output.capture_dir))?;

    let mut navigator = Navigator::new(
        NavigatorConfig {
            ring_size: config.scan.horizontal_precision,
            elevations: config.scan.vertical_precision,
            step_distance: config.motion.step_distance,
            min_obstacle_separation: config.scan.min_obstacle_separation,
            obstacle_magnitude: config.scan.obstacle_magnitude,
            obstacle_falloff: config.scan.obstacle_falloff,
        },
        driver,
        aligner,
        calibrator,
        Arc::clone(&gimbal_frames),
        Some(store),
        Arc::clone(&status),
    );
    for obstacle in &config.scan.obstacles {
        if navigator.add_obstacle(Vec2::new(obstacle.x, obstacle.y), obstacle.size) {
            info!("obstacle registered at ({:.1}, {:.1})", obstacle.x, obstacle.y);
        }
    }

    // Ctrl-C aborts at the next step boundary
    let ctrlc_status = Arc::clone(&status);
    ctrlc::set_handler(move || {
        warn!("abort requested, stopping at the next step");
        ctrlc_status.request_abort();
    })
    .map_err(|e| ParikramaError::Config(format!("Error setting Ctrl-C handler: {}", e)))?;

    let worker = thread::Builder::new()
        .name("scan-worker".to_string())
        .spawn(move || {
            if let Err(e) = navigator.run() {
                error!("Scan failed: {}", e);
            }
        })
        .expect("Failed to spawn scan worker");

    // Monitor until the scan ends one way or another
    let check_interval = Duration::from_millis(500);
    let status_interval = Duration::from_secs(3);
    let mut last_status = Instant::now();
    let mut front_seen = false;
    loop {
        thread::sleep(check_interval);

        if config.connection.front_cam_enabled
            && !front_seen
            && let Some(frame) = vision::latest(&front_frames)
        {
            info!("front camera online: {}x{}", frame.width, frame.height);
            front_seen = true;
        }

        if status.is_failed() {
            error!(
                "scan failed: {}",
                status.fail_reason().unwrap_or_else(|| "unknown".to_string())
            );
            break;
        }
        if status.state() == ScanState::Done || worker.is_finished() {
            break;
        }

        if last_status.elapsed() >= status_interval {
            let (taken, total) = status.pictures();
            info!("{} - {}/{} pictures", status.state().name(), taken, total);
            last_status = Instant::now();
        }
    }

    if let Err(e) = worker.join() {
        error!("scan worker panicked: {:?}", e);
    }
    for stream in streams {
        stream.stop();
    }
    info!("Parikrama finished");
    Ok(())
}

/// Config comes from the first positional argument, then from
/// ./parikrama.toml, then from built-in defaults.
fn load_config(args: &[String]) -> Result<ParikramaConfig> {
    if args.len() > 1 && !args[1].starts_with("--") {
        let path = Path::new(&args[1]);
        info!("loading config from {}", path.display());
        return ParikramaConfig::load(path);
    }
    let default_path = Path::new("parikrama.toml");
    if default_path.exists() {
        info!("loading config from {}", default_path.display());
        return ParikramaConfig::load(default_path);
    }
    info!("no config file, using defaults");
    Ok(ParikramaConfig::default())
}

fn apply_overrides(config: &mut ParikramaConfig, args: &[String]) {
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--device" => {
                if let Some(url) = iter.next() {
                    config.connection.device_url = url.clone();
                }
            }
            "--simulate" => config.connection.simulation = true,
            _ => {}
        }
    }
}
