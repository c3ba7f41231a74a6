//! # Client Core
//!
//! Streams frames over one established connection and collects the
//! decisions that come back.
//!
//! Sending and receiving are decoupled: a spawned reader task stores each
//! response in the shared [`ClientSession`] as it arrives, while the send loop
//! keeps capturing at its own pace and draws whatever fresh decision the
//! cache holds. Neither side waits for the other.
//!
//! Reconnection is not handled here; see
//! [`ConnectionManager`](super::middleware::ConnectionManager).

use std::sync::Arc;
use std::time::Instant;

use log::{debug, error, info, warn};
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Notify;

use super::cache::Overlay;
use super::capture::{FrameSource, LocalDetector};
use super::render::OverlayRenderer;
use super::state::{ClientSession, ConnectionState};
use crate::common::config::StreamConfig;
use crate::common::connection::{FrameReader, FrameWriter};
use crate::common::error::{FaceGateError, Result};
use crate::common::messages::ServerResponse;
use crate::processing::{compress, downscale};

/// The blocking half of one tick: capture, overlay, render, shrink, encode.
///
/// Runs on the blocking pool; the async loop only moves bytes.
struct FramePipeline<F, R> {
    name: String,
    source: F,
    renderer: R,
    detector: Arc<dyn LocalDetector>,
    send_scale: f32,
    jpeg_quality: u8,
}

impl<F: FrameSource, R: OverlayRenderer> FramePipeline<F, R> {
    /// The next payload to send, or `None` after a capture miss or an
    /// encoding failure.
    fn next_payload(&mut self, fresh: Option<&ServerResponse>) -> Result<Option<Vec<u8>>> {
        let Some(frame) = self.source.capture()? else {
            debug!("{} missed a frame", self.name);
            return Ok(None);
        };

        let overlay = Overlay::select(fresh, &frame, self.detector.as_ref(), 1.0 / self.send_scale);
        self.renderer.render(&frame, &overlay);

        let small = downscale(&frame, self.send_scale);
        match compress(&small, self.jpeg_quality) {
            Ok(payload) => Ok(Some(payload)),
            Err(e) => {
                warn!("⚠️  {} could not encode frame: {}", self.name, e);
                Ok(None)
            }
        }
    }
}

/// Capture, preview and send loop for a single connection.
pub struct ClientCore<F, R> {
    name: String,
    config: StreamConfig,
    pipeline: Arc<Mutex<FramePipeline<F, R>>>,
}

impl<F, R> ClientCore<F, R>
where
    F: FrameSource + 'static,
    R: OverlayRenderer + 'static,
{
    pub fn new(
        name: impl Into<String>,
        config: StreamConfig,
        source: F,
        renderer: R,
        detector: Arc<dyn LocalDetector>,
    ) -> Self {
        let mut config = config;
        if !(config.send_scale > 0.0 && config.send_scale <= 1.0) {
            let fallback = StreamConfig::default().send_scale;
            warn!("⚠️  send_scale {} out of range, using {}", config.send_scale, fallback);
            config.send_scale = fallback;
        }
        let name = name.into();
        let pipeline = FramePipeline {
            name: name.clone(),
            source,
            renderer,
            detector,
            send_scale: config.send_scale,
            jpeg_quality: config.jpeg_quality,
        };
        Self {
            name,
            config,
            pipeline: Arc::new(Mutex::new(pipeline)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Stream frames over `stream` until it breaks or the session stops.
    ///
    /// The response reader has finished by the time this returns.
    ///
    /// # Returns
    /// - `Ok(())`: the connection is gone (or shutdown was requested); the
    ///   session is no longer `Connected`
    /// - `Err(DeviceUnavailable)`: the frame source is dead; do not retry
    pub async fn stream<S>(&mut self, stream: S, session: &ClientSession) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let reader_done = Arc::new(Notify::new());

        let reader = tokio::spawn(receive_responses(
            FrameReader::new(read_half, self.config.max_frame_bytes),
            session.clone(),
            Arc::clone(&reader_done),
        ));

        let result = self
            .send_frames(FrameWriter::new(write_half), session, &reader_done)
            .await;

        reader.abort();
        let _ = reader.await;
        result
    }

    async fn send_frames<W>(
        &mut self,
        mut writer: FrameWriter<W>,
        session: &ClientSession,
        reader_done: &Notify,
    ) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let mut shutdown = session.shutdown_signal();

        while session.is_running() && session.connection_state() == ConnectionState::Connected {
            let fresh = session.fresh_response(Instant::now());
            let pipeline = Arc::clone(&self.pipeline);
            let tick = tokio::task::spawn_blocking(move || pipeline.lock().next_payload(fresh.as_ref()));

            let payload = tokio::select! {
                joined = tick => joined.map_err(|e| {
                    FaceGateError::DeviceUnavailable(format!("frame pipeline failed: {}", e))
                })??,
                _ = shutdown.wait_for(|stopped| *stopped) => return Ok(()),
            };

            if let Some(payload) = payload {
                if let Err(e) = writer.write_frame(&payload).await {
                    error!("💥 {} failed to send frame: {}", self.name, e);
                    session.transition(ConnectionState::Disconnected);
                    return Ok(());
                }
                debug!("📤 {} sent {} bytes", self.name, payload.len());
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.frame_interval()) => {}
                _ = reader_done.notified() => return Ok(()),
                _ = shutdown.wait_for(|stopped| *stopped) => return Ok(()),
            }
        }

        Ok(())
    }
}

/// Store every decision the server sends until the connection ends.
async fn receive_responses<R>(mut reader: FrameReader<R>, session: ClientSession, done: Arc<Notify>)
where
    R: AsyncRead + Unpin,
{
    loop {
        match reader.read_frame().await {
            Ok(payload) => match ServerResponse::from_bytes(&payload) {
                Ok(response) => {
                    info!(
                        "👤 Recognized: {:?}, Access: {}",
                        response.recognized,
                        if response.access_granted { "Granted" } else { "Denied" }
                    );
                    session.record_response(response, Instant::now());
                }
                Err(e) => warn!("⚠️  Ignoring malformed response: {}", e),
            },
            Err(FaceGateError::ConnectionClosed) => {
                warn!("❌ Server closed the connection");
                break;
            }
            Err(e) => {
                error!("💥 Error receiving response: {}", e);
                break;
            }
        }
    }

    session.transition(ConnectionState::Disconnected);
    done.notify_one();
}
