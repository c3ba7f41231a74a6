//! # Session Handler
//!
//! Owns one accepted connection for its whole life:
//!
//! ```text
//! AwaitingLength -> AwaitingPayload -> Processing -> Responding -> AwaitingLength ...
//!        |                 |               |
//!        +------ Closed <--+               +-- corrupt frame: log, skip, keep reading
//! ```
//!
//! The first two states live in the frame decoder. A frame that does not
//! decode as an image (or that the encoder chokes on) is skipped without a
//! response; the connection stays open for the next one. Only a dead socket
//! ends the session.
//!
//! Sessions share the read-only [`Registry`] and the audit sink and nothing
//! else, so any number of them can run side by side.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use log::{error, info, warn};
use tokio::io::{AsyncRead, AsyncWrite};

use super::audit::{AccessEntry, AuditSink};
use crate::common::codec::MAX_FRAME_SIZE;
use crate::common::connection::{FrameReader, FrameWriter};
use crate::common::error::{FaceGateError, Result};
use crate::common::messages::{current_timestamp, ServerResponse};
use crate::processing::{decompress, downscale};
use crate::recognition::{DetectedFace, FaceEncoder, Matcher, RecognitionResult, Registry};

/// Downscale applied before detection unless configured otherwise.
pub const DEFAULT_DETECTION_SCALE: f32 = 0.25;

/// Per-connection recognition pipeline. Cloning is cheap; every clone shares
/// the same registry, encoder, matcher and audit sink.
#[derive(Clone)]
pub struct SessionHandler {
    registry: Registry,
    encoder: Arc<dyn FaceEncoder>,
    matcher: Arc<Matcher>,
    audit: Arc<dyn AuditSink>,
    detection_scale: f32,
    max_frame_size: usize,
}

impl SessionHandler {
    pub fn new(registry: Registry, encoder: Arc<dyn FaceEncoder>, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            registry,
            encoder,
            matcher: Arc::new(Matcher::default()),
            audit,
            detection_scale: DEFAULT_DETECTION_SCALE,
            max_frame_size: MAX_FRAME_SIZE,
        }
    }

    pub fn with_matcher(mut self, matcher: Matcher) -> Self {
        self.matcher = Arc::new(matcher);
        self
    }

    /// Detection runs on a copy shrunk by `scale` (clamped to (0, 1]).
    pub fn with_detection_scale(mut self, scale: f32) -> Self {
        self.detection_scale = if scale > 0.0 { scale.min(1.0) } else { DEFAULT_DETECTION_SCALE };
        self
    }

    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Serve one connection until the peer goes away.
    pub async fn run<S>(&self, stream: S, peer: SocketAddr)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        info!("📥 Connection from {}", peer);

        let (read_half, write_half) = tokio::io::split(stream);
        let mut reader = FrameReader::new(read_half, self.max_frame_size);
        let mut writer = FrameWriter::new(write_half);

        loop {
            let payload = match reader.read_frame().await {
                Ok(payload) => payload,
                Err(FaceGateError::ConnectionClosed) => {
                    info!("❌ {} disconnected", peer);
                    break;
                }
                Err(e) => {
                    error!("💥 Error reading from {}: {}", peer, e);
                    break;
                }
            };

            let response = match self.process_frame(payload, peer).await {
                Ok(response) => response,
                Err(e) => {
                    warn!("⚠️  Skipping frame from {}: {}", peer, e);
                    continue;
                }
            };

            let bytes = match response.to_bytes() {
                Ok(bytes) => bytes,
                Err(e) => {
                    error!("💥 {}", e);
                    continue;
                }
            };
            if let Err(e) = writer.write_frame(&bytes).await {
                error!("💥 Error responding to {}: {}", peer, e);
                break;
            }

            info!(
                "✅ Faces Detected: {:?}, Access: {}",
                response.recognized,
                if response.access_granted { "Granted" } else { "Denied" }
            );
        }

        let _ = writer.shutdown().await;
    }

    /// Decode, detect, match and audit one received frame.
    ///
    /// # Errors
    /// - `MalformedFrame` if the payload is not a decodable image
    /// - `Encoder` if the detect/encode collaborator fails
    pub async fn process_frame(&self, payload: Bytes, peer: SocketAddr) -> Result<ServerResponse> {
        let handler = self.clone();

        // Decoding, detection and the audit write all block; keep them off the reactor
        tokio::task::spawn_blocking(move || -> Result<ServerResponse> {
            let frame = decompress(&payload)?;
            let small = downscale(&frame, handler.detection_scale);
            let faces = handler.encoder.detect_and_encode(&small)?;
            Ok(handler.decide(faces, peer))
        })
        .await
        .map_err(|e| FaceGateError::Encoder(format!("recognition task failed: {}", e)))?
    }

    /// Match detected faces, build the response and write the audit line.
    ///
    /// Regions are mapped back to the received frame's coordinates.
    pub fn decide(&self, faces: Vec<DetectedFace>, peer: SocketAddr) -> ServerResponse {
        let restore = 1.0 / self.detection_scale;
        let (regions, embeddings): (Vec<_>, Vec<_>) = faces
            .into_iter()
            .map(|face| (face.region.rescale(restore), face.embedding))
            .unzip();

        let outcome = self.matcher.match_faces(&self.registry, &embeddings);

        let results = regions
            .into_iter()
            .zip(outcome.labels)
            .map(|(region, label)| RecognitionResult { region, label })
            .collect();
        let response = ServerResponse::new(results, outcome.access_granted, current_timestamp());

        let entry = AccessEntry {
            timestamp: &response.timestamp,
            access_granted: response.access_granted,
            names: &response.recognized,
            peer,
        };
        if let Err(e) = self.audit.append(&entry) {
            error!("❌ Failed to write access log: {}", e);
        }

        response
    }
}
