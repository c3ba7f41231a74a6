//! # Error Taxonomy
//!
//! Errors shared by the server and client halves of the protocol.
//!
//! Only two kinds of failure are fatal to a connection: the peer going away
//! ([`FaceGateError::ConnectionClosed`], or any transport I/O error) and a
//! length prefix that exceeds the frame limit, after which the byte stream
//! cannot be resynchronised. Everything else is scoped to a single frame.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FaceGateError {
    /// The peer closed the socket (a read returned zero bytes) while a
    /// prefix or payload was still outstanding.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// A frame arrived intact but its payload is not what was expected:
    /// an undecodable image, or a response that fails schema validation.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("frame of {length} bytes exceeds the {limit} byte limit")]
    FrameTooLarge { length: usize, limit: usize },

    /// The capture device (or its stand-in) cannot be opened.
    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The external detect/encode collaborator failed on a frame.
    #[error("face encoder failed: {0}")]
    Encoder(String),

    #[error("registry store unreadable: {0}")]
    Registry(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FaceGateError {
    /// Whether the error leaves the underlying connection unusable.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            FaceGateError::ConnectionClosed
                | FaceGateError::FrameTooLarge { .. }
                | FaceGateError::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, FaceGateError>;
