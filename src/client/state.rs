//! # Client Session State
//!
//! The state shared by the client's two tasks (frame sender and response
//! reader). All of it sits behind a single mutex, which is never held across
//! an `.await`.
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Disconnected -> ...
//!       \              \            \
//!        +--------------+------------+--> Stopped (terminal, only via stop())
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::info;
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};

use super::cache::ResultCache;
use crate::common::messages::ServerResponse;

/// Transition history kept for subscribers that fall behind.
const TRANSITION_BACKLOG: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Stopped,
}

#[derive(Debug)]
pub struct ClientSessionState {
    pub connection: ConnectionState,
    pub cache: ResultCache,
    pub running: bool,
}

/// Cloneable handle to the shared client state.
#[derive(Clone)]
pub struct ClientSession {
    state: Arc<Mutex<ClientSessionState>>,
    transitions: broadcast::Sender<ConnectionState>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl ClientSession {
    pub fn new(staleness: Duration) -> Self {
        let (transitions, _) = broadcast::channel(TRANSITION_BACKLOG);
        let (shutdown, _) = watch::channel(false);
        Self {
            state: Arc::new(Mutex::new(ClientSessionState {
                connection: ConnectionState::Disconnected,
                cache: ResultCache::new(staleness),
                running: true,
            })),
            transitions,
            shutdown: Arc::new(shutdown),
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state.lock().connection
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// Move to `next`.
    ///
    /// Returns `false` (and changes nothing) when already in `next`, or when
    /// the session is `Stopped`, which no transition leaves.
    pub fn transition(&self, next: ConnectionState) -> bool {
        let previous = {
            let mut state = self.state.lock();
            let current = state.connection;
            if current == next || current == ConnectionState::Stopped {
                return false;
            }
            state.connection = next;
            current
        };

        info!("🔄 Connection {:?} -> {:?}", previous, next);
        // No subscribers is fine
        let _ = self.transitions.send(next);
        true
    }

    /// Request shutdown: no further reconnection, pending sleeps wake up.
    pub fn stop(&self) {
        self.state.lock().running = false;
        self.transition(ConnectionState::Stopped);
        self.shutdown.send_replace(true);
    }

    /// Every transition from now on, in order.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionState> {
        self.transitions.subscribe()
    }

    /// Resolves (via `wait_for(|stopped| *stopped)`) once `stop()` was called.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    pub fn record_response(&self, response: ServerResponse, received_at: Instant) {
        self.state.lock().cache.store(response, received_at);
    }

    /// Copy of the cached response if it is still fresh at `now`.
    pub fn fresh_response(&self, now: Instant) -> Option<ServerResponse> {
        self.state.lock().cache.fresh(now).cloned()
    }

    /// Run `f` with the state locked.
    pub fn with_state<T>(&self, f: impl FnOnce(&ClientSessionState) -> T) -> T {
        f(&self.state.lock())
    }
}
