//! Camera plumbing: UDP frame streams, the segmentation seam, and
//! capture storage.

pub mod capture;
pub mod segment;
pub mod stream;

pub use capture::CaptureStore;
pub use segment::{ObjectSegmenter, RemoteSegmenter};
pub use stream::{Frame, SharedFrame, VideoStream, latest, shared_frame};
