//! Scan orchestration: the state machine and the arm elevation path.

mod arm;
mod navigator;

pub use arm::arm_path;
pub use navigator::{Navigator, NavigatorConfig, ScanReport, ScanState};
