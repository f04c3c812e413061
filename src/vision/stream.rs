//! UDP video listener.
//!
//! The cameras stream JPEG frames over UDP in MTU-sized slices with no
//! framing header: a frame starts at an SOI marker (FF D8) and ends at
//! EOI (FF D9). The listener reassembles the byte stream, validates
//! each complete frame by decoding it, and publishes the newest one
//! into a single shared slot. Consumers only ever see whole frames.

use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::core::Vec2;
use crate::error::{ParikramaError, Result};

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];

/// Reassembly buffer cap. A buffer this large without a complete frame
/// means the stream is out of sync and gets dropped on the floor.
const MAX_BUFFER: usize = 1 << 22;

/// One complete camera frame.
#[derive(Debug, Clone)]
pub struct Frame {
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    /// Pixel center of the frame.
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width as f32 / 2.0, self.height as f32 / 2.0)
    }
}

/// Single-slot frame exchange: the listener overwrites, readers clone
/// the Arc out.
pub type SharedFrame = Arc<RwLock<Option<Arc<Frame>>>>;

pub fn shared_frame() -> SharedFrame {
    Arc::new(RwLock::new(None))
}

/// Newest complete frame, if any has arrived yet.
pub fn latest(slot: &SharedFrame) -> Option<Arc<Frame>> {
    slot.read().unwrap_or_else(|e| e.into_inner()).clone()
}

/// Background listener for one camera stream.
pub struct VideoStream {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl VideoStream {
    /// Bind the port and start reassembling frames into `slot`.
    pub fn spawn(name: &str, port: u16, slot: SharedFrame) -> Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", port))
            .map_err(|e| ParikramaError::Video(format!("bind udp {}: {}", port, e)))?;
        socket
            .set_read_timeout(Some(Duration::from_millis(500)))
            .map_err(|e| ParikramaError::Video(format!("socket timeout: {}", e)))?;

        let running = Arc::new(AtomicBool::new(true));
        let thread_running = Arc::clone(&running);
        let thread_name = format!("video-{}", name);
        tracing::info!("listening for {} camera frames on udp/{}", name, port);

        let handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                let mut buffer: Vec<u8> = Vec::with_capacity(1 << 16);
                let mut datagram = [0u8; 65536];
                while thread_running.load(Ordering::Acquire) {
                    match socket.recv(&mut datagram) {
                        Ok(n) => {
                            buffer.extend_from_slice(&datagram[..n]);
                            while let Some(jpeg) = extract_frame(&mut buffer) {
                                publish(&slot, jpeg);
                            }
                            if buffer.len() > MAX_BUFFER {
                                tracing::warn!("{}: out of sync, dropping buffer", thread_name);
                                buffer.clear();
                            }
                        }
                        Err(e)
                            if e.kind() == std::io::ErrorKind::WouldBlock
                                || e.kind() == std::io::ErrorKind::TimedOut =>
                        {
                            continue;
                        }
                        Err(e) => {
                            tracing::warn!("{}: recv failed: {}", thread_name, e);
                            thread::sleep(Duration::from_millis(100));
                        }
                    }
                }
            })
            .map_err(|e| ParikramaError::Video(format!("spawn listener: {}", e)))?;

        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    /// Stop listening and wait for the thread to exit.
    pub fn stop(mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Pull the first complete SOI..EOI frame out of the buffer, dropping
/// any leading garbage. None means no complete frame yet.
fn extract_frame(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let soi = find(buffer, &SOI)?;
    let eoi = find(&buffer[soi + 2..], &EOI)? + soi + 2;
    let frame = buffer[soi..eoi + 2].to_vec();
    buffer.drain(..eoi + 2);
    Some(frame)
}

fn find(haystack: &[u8], needle: &[u8; 2]) -> Option<usize> {
    haystack.windows(2).position(|w| w == needle)
}

/// Decode-validate a frame and place it in the slot. Undecodable bytes
/// are dropped, the slot keeps the previous frame.
fn publish(slot: &SharedFrame, jpeg: Vec<u8>) -> bool {
    match image::load_from_memory(&jpeg) {
        Ok(img) => {
            let frame = Arc::new(Frame {
                width: img.width(),
                height: img.height(),
                jpeg,
            });
            *slot.write().unwrap_or_else(|e| e.into_inner()) = Some(frame);
            true
        }
        Err(e) => {
            tracing::debug!("discarding undecodable frame: {}", e);
            false
        }
    }
}
