//! # Recognition
//!
//! Everything between "a decoded frame" and "who is in it":
//!
//! - [`region`]: face rectangles and their rescaling
//! - [`embedding`]: embeddings and the comparison rule
//! - [`registry`]: the immutable enrolled-face registry and its loader
//! - [`encoder`]: the external detect/encode collaborator seam
//! - [`matcher`]: reduction of embeddings to labels and an access decision

pub mod embedding;
pub mod encoder;
pub mod matcher;
pub mod region;
pub mod registry;

pub use embedding::{Embedding, EuclideanComparator, FaceComparator};
pub use encoder::{CommandEncoder, DetectedFace, FaceEncoder, NoopEncoder};
pub use matcher::{MatchOutcome, Matcher, UNKNOWN_LABEL};
pub use region::{FaceRegion, RecognitionResult};
pub use registry::{EnrolledIdentity, JsonRegistryLoader, Registry, RegistryLoader};
