//! Scan status shared between the worker thread and the main loop.

use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};

use crate::scan::ScanState;

/// Lock-free view of the running scan. The worker writes, the main
/// thread and the Ctrl-C handler read and raise flags.
#[derive(Default)]
pub struct ScanStatus {
    state: AtomicU8,
    pictures_taken: AtomicU32,
    pictures_total: AtomicU32,
    abort: AtomicBool,
    failed: AtomicBool,
    fail_reason: RwLock<Option<String>>,
}

impl ScanStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the counters for a fresh scan. A pre-raised abort flag
    /// stays raised so a scan cannot start past a pending abort.
    pub fn begin(&self, pictures_total: u32) {
        self.pictures_taken.store(0, Ordering::Relaxed);
        self.pictures_total.store(pictures_total, Ordering::Relaxed);
        self.store_state(ScanState::Idle);
    }

    pub fn store_state(&self, state: ScanState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn state(&self) -> ScanState {
        match self.state.load(Ordering::Acquire) {
            0 => ScanState::Idle,
            1 => ScanState::Calibrating,
            2 => ScanState::Circling,
            3 => ScanState::Capturing,
            4 => ScanState::ArmAdvance,
            5 => ScanState::Finishing,
            _ => ScanState::Done,
        }
    }

    pub fn add_picture(&self) {
        self.pictures_taken.fetch_add(1, Ordering::Relaxed);
    }

    /// (taken, total)
    pub fn pictures(&self) -> (u32, u32) {
        (
            self.pictures_taken.load(Ordering::Relaxed),
            self.pictures_total.load(Ordering::Relaxed),
        )
    }

    /// Ask the worker to stop at the next step boundary.
    pub fn request_abort(&self) {
        self.abort.store(true, Ordering::Release);
    }

    pub fn abort_requested(&self) -> bool {
        self.abort.load(Ordering::Acquire)
    }

    /// Record a fatal scan error.
    pub fn fail(&self, reason: String) {
        if let Ok(mut guard) = self.fail_reason.write() {
            *guard = Some(reason);
        }
        self.failed.store(true, Ordering::Release);
    }

    pub fn is_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    pub fn fail_reason(&self) -> Option<String> {
        self.fail_reason.read().ok().and_then(|guard| guard.clone())
    }
}
