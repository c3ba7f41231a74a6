//! # Connection Manager
//!
//! Keeps the client attached to the server for as long as it runs.
//!
//! ## Responsibilities
//!
//! - **Connecting**: dials the configured server address
//! - **Streaming**: hands each live connection to [`ClientCore`]
//! - **Reconnecting**: after any connection failure or loss, waits the
//!   configured delay and dials again, without limit
//! - **Shutdown**: `ClientSession::stop()` interrupts connecting, streaming and
//!   waiting alike
//!
//! ## Lifecycle
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Disconnected -> (delay) -> Connecting ...
//!                      |
//!                      +-- refused/unreachable -> Disconnected -> (delay) -> Connecting ...
//! ```
//!
//! The only errors that end [`run`](ConnectionManager::run) early come from
//! the frame source; network errors are always retried.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let session = ClientSession::new(config.stream.staleness());
//! let core = ClientCore::new(name, config.stream.clone(), source, renderer, detector);
//! let mut manager = ConnectionManager::new(address, config.stream.reconnect_delay(), core, session.clone());
//! manager.run().await?;
//! ```

use std::time::Duration;

use log::{error, info, warn};
use tokio::net::TcpStream;
use tokio::time::sleep;

use super::capture::FrameSource;
use super::client::ClientCore;
use super::render::OverlayRenderer;
use super::state::{ClientSession, ConnectionState};
use crate::common::error::Result;

pub struct ConnectionManager<F, R> {
    address: String,
    reconnect_delay: Duration,
    core: ClientCore<F, R>,
    session: ClientSession,
}

impl<F, R> ConnectionManager<F, R>
where
    F: FrameSource + 'static,
    R: OverlayRenderer + 'static,
{
    /// # Arguments
    ///
    /// * `address` - Server to dial (host:port)
    /// * `reconnect_delay` - Fixed wait before every new attempt
    /// * `core` - Streams frames once connected
    /// * `session` - Shared state; keep a clone to observe or stop the client
    pub fn new(
        address: impl Into<String>,
        reconnect_delay: Duration,
        core: ClientCore<F, R>,
        session: ClientSession,
    ) -> Self {
        Self {
            address: address.into(),
            reconnect_delay,
            core,
            session,
        }
    }

    pub fn session(&self) -> &ClientSession {
        &self.session
    }

    /// Connect, stream and reconnect until the session is stopped.
    ///
    /// # Returns
    /// - `Ok(())` after `stop()`; the session is `Stopped`
    /// - `Err(DeviceUnavailable)` if the frame source died; the session is
    ///   stopped as well
    pub async fn run(&mut self) -> Result<()> {
        info!("🚀 {} starting, server at {}", self.core.name(), self.address);
        let mut shutdown = self.session.shutdown_signal();

        while self.session.is_running() {
            self.session.transition(ConnectionState::Connecting);

            let connected = tokio::select! {
                result = TcpStream::connect(&self.address) => result,
                _ = shutdown.wait_for(|stopped| *stopped) => break,
            };

            match connected {
                Ok(stream) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        warn!("⚠️  Failed to set TCP_NODELAY: {}", e);
                    }
                    if self.session.transition(ConnectionState::Connected) {
                        info!("✅ {} connected to {}", self.core.name(), self.address);
                        if let Err(e) = self.core.stream(stream, &self.session).await {
                            error!("💥 {} cannot continue: {}", self.core.name(), e);
                            self.session.stop();
                            return Err(e);
                        }
                    }
                }
                Err(e) => warn!("❌ Connection to {} failed: {}", self.address, e),
            }

            if !self.session.is_running() {
                break;
            }
            self.session.transition(ConnectionState::Disconnected);

            info!("♻️  Reconnecting in {:?}...", self.reconnect_delay);
            tokio::select! {
                _ = sleep(self.reconnect_delay) => {}
                _ = shutdown.wait_for(|stopped| *stopped) => break,
            }
        }

        self.session.stop();
        info!("🛑 {} stopped", self.core.name());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::cache::Overlay;
    use crate::client::capture::{EncoderDetector, LocalDetector};
    use crate::common::config::StreamConfig;
    use crate::recognition::NoopEncoder;
    use image::RgbImage;
    use std::sync::Arc;

    struct Blank;

    impl FrameSource for Blank {
        fn capture(&mut self) -> Result<Option<RgbImage>> {
            Ok(Some(RgbImage::new(16, 16)))
        }
    }

    struct Silent;

    impl OverlayRenderer for Silent {
        fn render(&mut self, _frame: &RgbImage, _overlay: &Overlay) {}
    }

    fn manager(address: String, session: &ClientSession) -> ConnectionManager<Blank, Silent> {
        let detector: Arc<dyn LocalDetector> = Arc::new(EncoderDetector::new(Arc::new(NoopEncoder)));
        let stream = StreamConfig {
            frame_interval_ms: 10,
            ..StreamConfig::default()
        };
        let core = ClientCore::new("Test", stream, Blank, Silent, detector);
        ConnectionManager::new(address, Duration::from_millis(20), core, session.clone())
    }

    #[tokio::test]
    async fn test_refused_connections_retry_until_stopped() {
        // Grab a free port, then close it so connecting is refused
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let session = ClientSession::new(Duration::from_secs(1));
        let mut events = session.subscribe();
        let mut manager = manager(address, &session);
        let task = tokio::spawn(async move { manager.run().await });

        let mut attempts = 0;
        while attempts < 3 {
            if events.recv().await.unwrap() == ConnectionState::Connecting {
                attempts += 1;
            }
        }
        assert!(!task.is_finished(), "failures never end the loop");

        session.stop();
        task.await.unwrap().unwrap();
        assert_eq!(session.connection_state(), ConnectionState::Stopped);
    }

    #[tokio::test]
    async fn test_stop_during_delay_returns_promptly() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let session = ClientSession::new(Duration::from_secs(1));
        let mut events = session.subscribe();
        let detector: Arc<dyn LocalDetector> = Arc::new(EncoderDetector::new(Arc::new(NoopEncoder)));
        let core = ClientCore::new("Test", StreamConfig::default(), Blank, Silent, detector);
        let mut manager = ConnectionManager::new(address, Duration::from_secs(3600), core, session.clone());
        let task = tokio::spawn(async move { manager.run().await });

        while events.recv().await.unwrap() != ConnectionState::Disconnected {}
        session.stop();

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("run returns without waiting out the delay")
            .unwrap()
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_waits_the_configured_delay() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let delay = Duration::from_secs(30);
        let session = ClientSession::new(Duration::from_secs(1));
        let mut events = session.subscribe();
        let detector: Arc<dyn LocalDetector> = Arc::new(EncoderDetector::new(Arc::new(NoopEncoder)));
        let core = ClientCore::new("Test", StreamConfig::default(), Blank, Silent, detector);
        let mut manager = ConnectionManager::new(address, delay, core, session.clone());
        let task = tokio::spawn(async move { manager.run().await });

        assert_eq!(events.recv().await.unwrap(), ConnectionState::Connecting);
        assert_eq!(events.recv().await.unwrap(), ConnectionState::Disconnected);
        let disconnected_at = tokio::time::Instant::now();

        // Nothing happens until the delay has elapsed
        let early = tokio::time::timeout(delay - Duration::from_millis(1), events.recv()).await;
        assert!(early.is_err(), "redialed before the delay: {:?}", early);

        assert_eq!(events.recv().await.unwrap(), ConnectionState::Connecting);
        assert!(tokio::time::Instant::now() - disconnected_at >= delay);

        session.stop();
        task.await.unwrap().unwrap();
    }
}
