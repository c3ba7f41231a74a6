//! # Common Components
//!
//! Shared utilities and data structures used by both client and server components.
//!
//! ## Modules
//!
//! - [`codec`]: 4-byte big-endian length-prefixed frame encoding/decoding
//! - [`connection`]: async frame reader/writer over socket halves
//! - [`messages`]: the server -> client decision message
//! - [`config`]: TOML configuration for both binaries
//! - [`error`]: the shared error taxonomy

pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod messages;

pub use error::{FaceGateError, Result};
