//! # Client Components
//!
//! The camera-side half, split the same way as the server:
//!
//! ## Core Client ([`client`])
//! Streams frames over one connection: capture, preview, downscale, compress,
//! send. A background task stores the decisions that come back.
//!
//! ## Connection Manager ([`middleware`])
//! Owns the connection lifecycle: connect, hand over to the core, reconnect
//! after a fixed delay, stop on request.
//!
//! ## Supporting pieces
//! - [`state`]: the shared session state and its transitions
//! - [`cache`]: the most recent decision and what to draw from it
//! - [`capture`]: frame sources and local face detection
//! - [`render`]: preview output

pub mod cache;
pub mod capture;
pub mod client;
pub mod middleware;
pub mod render;
pub mod state;

pub use cache::{Overlay, ResultCache};
pub use capture::{EncoderDetector, FrameSource, ImageDirSource, LocalDetector};
pub use client::ClientCore;
pub use middleware::ConnectionManager;
pub use render::{LogRenderer, OverlayRenderer, PreviewWriter};
pub use state::{ClientSession, ClientSessionState, ConnectionState};
