//! # Frame Capture
//!
//! Where client frames come from ([`FrameSource`]) and how faces are found
//! locally while no fresh server decision is available ([`LocalDetector`]).

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::RgbImage;
use log::{debug, error, warn};

use crate::common::error::{FaceGateError, Result};
use crate::recognition::{FaceEncoder, FaceRegion};

/// Extensions [`ImageDirSource`] picks up.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// Produces raw frames.
///
/// `Ok(None)` is a transient miss: skip this tick and try again.
/// `Err(DeviceUnavailable)` means no frame will ever come; the client stops.
pub trait FrameSource: Send {
    fn capture(&mut self) -> Result<Option<RgbImage>>;
}

/// Replays the images of a directory in file-name order, looping forever.
#[derive(Debug)]
pub struct ImageDirSource {
    paths: Vec<PathBuf>,
    next: usize,
}

impl ImageDirSource {
    /// Index the images in `dir`.
    ///
    /// # Errors
    /// `DeviceUnavailable` if the directory cannot be read or has no images.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let entries = fs::read_dir(dir).map_err(|e| {
            FaceGateError::DeviceUnavailable(format!("cannot open {}: {}", dir.display(), e))
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| is_image(path))
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(FaceGateError::DeviceUnavailable(format!(
                "no images in {}",
                dir.display()
            )));
        }

        debug!("📷 {} frames indexed from {}", paths.len(), dir.display());
        Ok(Self { paths, next: 0 })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl FrameSource for ImageDirSource {
    fn capture(&mut self) -> Result<Option<RgbImage>> {
        let path = &self.paths[self.next];
        self.next = (self.next + 1) % self.paths.len();

        match image::open(path) {
            Ok(frame) => Ok(Some(frame.to_rgb8())),
            Err(e) => {
                warn!("⚠️  Failed to read frame {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Finds face regions without identifying anyone.
pub trait LocalDetector: Send + Sync {
    /// Regions in `frame`'s pixel space. Failures yield no regions.
    fn detect(&self, frame: &RgbImage) -> Vec<FaceRegion>;
}

/// Uses the location half of any [`FaceEncoder`].
pub struct EncoderDetector {
    encoder: Arc<dyn FaceEncoder>,
}

impl EncoderDetector {
    pub fn new(encoder: Arc<dyn FaceEncoder>) -> Self {
        Self { encoder }
    }
}

impl LocalDetector for EncoderDetector {
    fn detect(&self, frame: &RgbImage) -> Vec<FaceRegion> {
        match self.encoder.detect_and_encode(frame) {
            Ok(faces) => faces.into_iter().map(|face| face.region).collect(),
            Err(e) => {
                error!("❌ Local face detection failed: {}", e);
                Vec::new()
            }
        }
    }
}
