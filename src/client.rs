//! HTTP client for the scanner's onboard command API.
//!
//! The robot runs a small REST server on its ESP32: movement endpoints
//! take a motor run time in milliseconds, arm and gimbal endpoints take
//! target coordinates, display and LED endpoints drive the operator
//! panel. Every command either gets a 2xx back or the error surfaces to
//! the caller.

use serde_json::json;
use std::time::Duration;

use crate::error::{ParikramaError, Result};

/// Wheel commands understood by the movement endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveCommand {
    Forward,
    Backward,
    SpinLeft,
    SpinRight,
}

impl DriveCommand {
    fn endpoint(self) -> &'static str {
        match self {
            DriveCommand::Forward => "/fwd",
            DriveCommand::Backward => "/bwd",
            DriveCommand::SpinLeft => "/hlft",
            DriveCommand::SpinRight => "/hrgt",
        }
    }
}

/// Command surface of the scanner hardware.
///
/// The motion driver only talks to this trait, so tests and dry runs
/// swap the HTTP transport for an in-memory device.
pub trait DeviceApi: Send {
    /// Run the wheels in the given direction for `ms` milliseconds.
    fn drive(&self, cmd: DriveCommand, ms: u32) -> Result<()>;

    /// Cut wheel power immediately.
    fn halt(&self) -> Result<()>;

    /// Send the arm to a target, or to its homing switches when `home`.
    fn arm_goto(&self, x: f32, y: f32, home: bool) -> Result<()>;

    fn arm_stop(&self) -> Result<()>;

    /// Point the gimbal at absolute axis angles in degrees.
    fn gimbal_goto(&self, alpha: f32, beta: f32) -> Result<()>;

    fn gimbal_stop(&self) -> Result<()>;

    /// Show a message on the operator LCD.
    fn display_text(&self, text: &str) -> Result<()>;

    /// Show a label and a progress bar on the operator LCD.
    fn display_progress(&self, text: &str, percent: u8) -> Result<()>;

    /// Show two fixed lines on the operator LCD.
    fn display_lines(&self, top: &str, bottom: &str) -> Result<()>;

    fn led_set(&self, r: u8, g: u8, b: u8) -> Result<()>;

    /// Flash a color for `ms`, then fall back to the previous mode.
    fn led_flash(&self, r: u8, g: u8, b: u8, ms: u32) -> Result<()>;

    fn led_rainbow(&self) -> Result<()>;

    /// Probe the device. Ok means the command API is reachable.
    fn check(&self) -> Result<()>;
}

/// Production device behind the scanner's REST API.
pub struct HttpDevice {
    base: String,
    http: reqwest::blocking::Client,
}

impl HttpDevice {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self {
            base: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn post(&self, endpoint: &str, body: serde_json::Value) -> Result<()> {
        let res = self
            .http
            .post(format!("{}{}", self.base, endpoint))
            .json(&body)
            .send()?;
        Self::accept(endpoint, res.status())
    }

    fn post_empty(&self, endpoint: &str) -> Result<()> {
        let res = self.http.post(format!("{}{}", self.base, endpoint)).send()?;
        Self::accept(endpoint, res.status())
    }

    fn accept(endpoint: &str, status: reqwest::StatusCode) -> Result<()> {
        if status.is_success() {
            Ok(())
        } else {
            Err(ParikramaError::Device {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            })
        }
    }
}

impl DeviceApi for HttpDevice {
    fn drive(&self, cmd: DriveCommand, ms: u32) -> Result<()> {
        self.post(cmd.endpoint(), json!({ "ms": ms }))
    }

    fn halt(&self) -> Result<()> {
        self.post_empty("/stp")
    }

    fn arm_goto(&self, x: f32, y: f32, home: bool) -> Result<()> {
        // homing wants zeroed angles, not a zero cartesian target
        let body = if home {
            json!({ "x": 0, "y": 0, "angles": true })
        } else {
            json!({ "x": x, "y": y })
        };
        self.post("/arm/goto", body)
    }

    fn arm_stop(&self) -> Result<()> {
        self.post_empty("/arm/stp")
    }

    fn gimbal_goto(&self, alpha: f32, beta: f32) -> Result<()> {
        self.post("/cam/goto", json!({ "alpha": alpha, "beta": beta }))
    }

    fn gimbal_stop(&self) -> Result<()> {
        self.post_empty("/cam/stp")
    }

    fn display_text(&self, text: &str) -> Result<()> {
        self.post("/display", json!({ "text": text }))
    }

    fn display_progress(&self, text: &str, percent: u8) -> Result<()> {
        self.post(
            "/display/progress",
            json!({ "text": text, "percent": percent.min(100) }),
        )
    }

    fn display_lines(&self, top: &str, bottom: &str) -> Result<()> {
        self.post("/display/scroll", json!({ "text1": top, "text2": bottom }))
    }

    fn led_set(&self, r: u8, g: u8, b: u8) -> Result<()> {
        self.post("/led", json!({ "r": r, "g": g, "b": b }))
    }

    fn led_flash(&self, r: u8, g: u8, b: u8, ms: u32) -> Result<()> {
        self.post("/led/flash", json!({ "r": r, "g": g, "b": b, "duration": ms }))
    }

    fn led_rainbow(&self) -> Result<()> {
        self.post_empty("/led/rainbow")
    }

    fn check(&self) -> Result<()> {
        let res = self.http.get(format!("{}/status", self.base)).send()?;
        Self::accept("/status", res.status())
    }
}

/// Dry-run device: logs every command and reports success. The
/// dead-reckoning layer assumes perfect execution, so a simulated scan
/// traces the same poses a real one would.
pub struct SimDevice;

impl DeviceApi for SimDevice {
    fn drive(&self, cmd: DriveCommand, ms: u32) -> Result<()> {
        tracing::debug!("sim: drive {:?} for {} ms", cmd, ms);
        Ok(())
    }

    fn halt(&self) -> Result<()> {
        tracing::debug!("sim: halt");
        Ok(())
    }

    fn arm_goto(&self, x: f32, y: f32, home: bool) -> Result<()> {
        tracing::debug!("sim: arm goto ({:.1}, {:.1}) home={}", x, y, home);
        Ok(())
    }

    fn arm_stop(&self) -> Result<()> {
        tracing::debug!("sim: arm stop");
        Ok(())
    }

    fn gimbal_goto(&self, alpha: f32, beta: f32) -> Result<()> {
        tracing::debug!("sim: gimbal goto ({:.1}, {:.1})", alpha, beta);
        Ok(())
    }

    fn gimbal_stop(&self) -> Result<()> {
        tracing::debug!("sim: gimbal stop");
        Ok(())
    }

    fn display_text(&self, text: &str) -> Result<()> {
        tracing::info!("sim display: {}", text);
        Ok(())
    }

    fn display_progress(&self, text: &str, percent: u8) -> Result<()> {
        tracing::info!("sim display: {} [{}%]", text, percent);
        Ok(())
    }

    fn display_lines(&self, top: &str, bottom: &str) -> Result<()> {
        tracing::info!("sim display: {} / {}", top, bottom);
        Ok(())
    }

    fn led_set(&self, r: u8, g: u8, b: u8) -> Result<()> {
        tracing::debug!("sim: led ({}, {}, {})", r, g, b);
        Ok(())
    }

    fn led_flash(&self, r: u8, g: u8, b: u8, ms: u32) -> Result<()> {
        tracing::debug!("sim: led flash ({}, {}, {}) for {} ms", r, g, b, ms);
        Ok(())
    }

    fn led_rainbow(&self) -> Result<()> {
        tracing::debug!("sim: led rainbow");
        Ok(())
    }

    fn check(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recorder {
        log: Mutex<Vec<String>>,
        fail_after: Mutex<Option<usize>>,
    }

    /// Test device that records every command. Clones share the log, so
    /// a test keeps one handle and hands the other to the driver.
    #[derive(Clone, Default)]
    pub struct RecordingDevice {
        inner: Arc<Recorder>,
    }

    impl RecordingDevice {
        pub fn new() -> Self {
            Self::default()
        }

        /// Succeed for the first `n` commands, then fail with a
        /// connection error.
        pub fn fail_after(&self, n: usize) {
            *self.inner.fail_after.lock().unwrap() = Some(n);
        }

        pub fn commands(&self) -> Vec<String> {
            self.inner.log.lock().unwrap().clone()
        }

        fn record(&self, entry: String) -> Result<()> {
            let mut log = self.inner.log.lock().unwrap();
            if let Some(n) = *self.inner.fail_after.lock().unwrap() {
                if log.len() >= n {
                    return Err(ParikramaError::Connection("injected failure".to_string()));
                }
            }
            log.push(entry);
            Ok(())
        }
    }

    impl DeviceApi for RecordingDevice {
        fn drive(&self, cmd: DriveCommand, ms: u32) -> Result<()> {
            self.record(format!("drive {:?} {}", cmd, ms))
        }

        fn halt(&self) -> Result<()> {
            self.record("halt".to_string())
        }

        fn arm_goto(&self, x: f32, y: f32, home: bool) -> Result<()> {
            if home {
                self.record("arm home".to_string())
            } else {
                self.record(format!("arm goto {:.1} {:.1}", x, y))
            }
        }

        fn arm_stop(&self) -> Result<()> {
            self.record("arm stop".to_string())
        }

        fn gimbal_goto(&self, alpha: f32, beta: f32) -> Result<()> {
            self.record(format!("gimbal goto {:.1} {:.1}", alpha, beta))
        }

        fn gimbal_stop(&self) -> Result<()> {
            self.record("gimbal stop".to_string())
        }

        fn display_text(&self, text: &str) -> Result<()> {
            self.record(format!("display {}", text))
        }

        fn display_progress(&self, text: &str, percent: u8) -> Result<()> {
            self.record(format!("progress {} {}", text, percent))
        }

        fn display_lines(&self, top: &str, bottom: &str) -> Result<()> {
            self.record(format!("display {} / {}", top, bottom))
        }

        fn led_set(&self, r: u8, g: u8, b: u8) -> Result<()> {
            self.record(format!("led {} {} {}", r, g, b))
        }

        fn led_flash(&self, r: u8, g: u8, b: u8, ms: u32) -> Result<()> {
            self.record(format!("led flash {} {} {} {}", r, g, b, ms))
        }

        fn led_rainbow(&self) -> Result<()> {
            self.record("led rainbow".to_string())
        }

        fn check(&self) -> Result<()> {
            self.record("check".to_string())
        }
    }
}
