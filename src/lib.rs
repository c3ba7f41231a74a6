//! # FaceGate
//!
//! A camera client streams frames to a recognition server over TCP; the
//! server answers each frame with who is in it and whether to open the door.
//!
//! - [`common`]: wire framing, messages, configuration, errors
//! - [`recognition`]: embeddings, registry, matcher, encoder seam
//! - [`processing`]: frame compression and scaling
//! - [`server`]: listener, session handler, access log
//! - [`client`]: frame streaming, result cache, reconnection

pub mod client;
pub mod common;
pub mod processing;
pub mod recognition;
pub mod server;

pub use common::messages::ServerResponse;
pub use common::{FaceGateError, Result};
pub use server::Server;
