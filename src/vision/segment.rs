//! Object segmentation seam.
//!
//! The segmentation model is heavy and runs out of process. This module
//! defines the trait the alignment loop works against and the HTTP
//! client for the sidecar service.

use serde::Deserialize;
use std::time::Duration;

use super::stream::Frame;
use crate::core::Vec2;
use crate::error::{ParikramaError, Result};

/// Finds the scanned object in a camera frame.
pub trait ObjectSegmenter: Send {
    /// Pixel centroid of the object, or None when it is not in view.
    fn locate(&self, frame: &Frame) -> Result<Option<Vec2>>;
}

/// Segmentation sidecar client. Posts the JPEG, gets back a centroid
/// as `{"x": .., "y": ..}` or `null` when nothing was found.
pub struct RemoteSegmenter {
    url: String,
    http: reqwest::blocking::Client,
}

impl RemoteSegmenter {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            url: url.to_string(),
            http,
        })
    }
}

#[derive(Deserialize)]
struct Centroid {
    x: f32,
    y: f32,
}

impl ObjectSegmenter for RemoteSegmenter {
    fn locate(&self, frame: &Frame) -> Result<Option<Vec2>> {
        let res = self
            .http
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "image/jpeg")
            .body(frame.jpeg.clone())
            .send()?;
        if !res.status().is_success() {
            return Err(ParikramaError::Device {
                endpoint: self.url.clone(),
                status: res.status().as_u16(),
            });
        }
        let centroid: Option<Centroid> = res.json()?;
        Ok(centroid.map(|c| Vec2::new(c.x, c.y)))
    }
}
