//! Capture storage for scan sessions.
//!
//! Each scan gets its own directory; captures land in it numbered in
//! the order they were taken, which is the order the photogrammetry
//! pipeline wants them in.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use super::stream::Frame;
use crate::error::Result;

pub struct CaptureStore {
    dir: PathBuf,
    index: u32,
}

impl CaptureStore {
    /// Create `<root>/scan-<timestamp>/` for a new session.
    pub fn create(root: &Path) -> Result<Self> {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let dir = root.join(format!("scan-{}", stamp));
        std::fs::create_dir_all(&dir)?;
        tracing::info!("capture session at {}", dir.display());
        Ok(Self { dir, index: 0 })
    }

    /// Write the frame as the next capture in sequence.
    pub fn save(&mut self, frame: &Frame) -> Result<PathBuf> {
        self.index += 1;
        let path = self.dir.join(format!("capture_{:04}.jpg", self.index));
        std::fs::write(&path, &frame.jpeg)?;
        Ok(path)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn count(&self) -> u32 {
        self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(payload: &[u8]) -> Frame {
        Frame {
            jpeg: payload.to_vec(),
            width: 640,
            height: 480,
        }
    }

    #[test]
    fn test_saves_numbered_captures() {
        let root = tempfile::tempdir().unwrap();
        let mut store = CaptureStore::create(root.path()).unwrap();

        let first = store.save(&frame(b"one")).unwrap();
        let second = store.save(&frame(b"two")).unwrap();

        assert!(first.ends_with("capture_0001.jpg"));
        assert!(second.ends_with("capture_0002.jpg"));
        assert_eq!(store.count(), 2);
        assert_eq!(std::fs::read(&first).unwrap(), b"one");
        assert_eq!(std::fs::read(&second).unwrap(), b"two");
    }

    #[test]
    fn test_session_dir_is_created_under_root() {
        let root = tempfile::tempdir().unwrap();
        let store = CaptureStore::create(root.path()).unwrap();
        assert!(store.dir().starts_with(root.path()));
        assert!(store.dir().is_dir());
    }
}
