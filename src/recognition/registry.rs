//! # Enrolled-Face Registry
//!
//! The registry is built once at process start and never mutated afterwards.
//! It is cheap to clone (the entries sit behind an `Arc`) so each connection
//! task gets its own handle without any locking.
//!
//! ## Store format
//!
//! [`JsonRegistryLoader`] reads a JSON document with two parallel arrays:
//!
//! ```json
//! { "names": ["Alice", "Bob"], "encodings": [[0.01, ...], [0.12, ...]] }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{error, info, warn};
use serde::Deserialize;

use super::embedding::Embedding;
use crate::common::error::{FaceGateError, Result};

/// One known person.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrolledIdentity {
    pub name: String,
    pub embedding: Embedding,
}

impl EnrolledIdentity {
    pub fn new(name: impl Into<String>, embedding: impl Into<Embedding>) -> Self {
        Self {
            name: name.into(),
            embedding: embedding.into(),
        }
    }
}

/// Immutable, ordered list of enrolled identities.
///
/// Order is registration order; it decides ties during matching.
#[derive(Debug, Clone)]
pub struct Registry {
    identities: Arc<[EnrolledIdentity]>,
}

impl Registry {
    pub fn new(identities: Vec<EnrolledIdentity>) -> Self {
        Self {
            identities: identities.into(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EnrolledIdentity> {
        self.identities.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.identities.iter().map(|identity| identity.name.as_str())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::empty()
    }
}

/// Source of the enrolled identities.
pub trait RegistryLoader {
    fn load(&self) -> Result<Registry>;
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    names: Vec<String>,
    encodings: Vec<Vec<f64>>,
}

/// Loads a registry from the parallel-array JSON store.
pub struct JsonRegistryLoader {
    path: PathBuf,
}

impl JsonRegistryLoader {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn parse(&self, content: &str) -> Result<Registry> {
        let file: RegistryFile = serde_json::from_str(content)
            .map_err(|e| FaceGateError::Registry(format!("{}: {}", self.path.display(), e)))?;

        if file.names.len() != file.encodings.len() {
            return Err(FaceGateError::Registry(format!(
                "{} names but {} encodings",
                file.names.len(),
                file.encodings.len()
            )));
        }

        if let Some(first) = file.encodings.first() {
            let dimension = first.len();
            if let Some((name, encoding)) = file
                .names
                .iter()
                .zip(&file.encodings)
                .find(|(_, encoding)| encoding.len() != dimension)
            {
                return Err(FaceGateError::Registry(format!(
                    "encoding for '{}' has {} values, expected {}",
                    name,
                    encoding.len(),
                    dimension
                )));
            }
        }

        let identities = file
            .names
            .into_iter()
            .zip(file.encodings)
            .map(|(name, encoding)| EnrolledIdentity::new(name, encoding))
            .collect();
        Ok(Registry::new(identities))
    }
}

impl RegistryLoader for JsonRegistryLoader {
    /// A missing file is not an error: it yields the empty registry.
    fn load(&self) -> Result<Registry> {
        if !self.path.exists() {
            warn!("⚠️  Face database {} not found", self.path.display());
            return Ok(Registry::empty());
        }
        let content = std::fs::read_to_string(&self.path)?;
        self.parse(&content)
    }
}

/// Load the registry for server start-up, degrading to the empty registry
/// on any failure so the server keeps running (and denies everyone).
pub fn load_registry(loader: &dyn RegistryLoader) -> Registry {
    let registry = match loader.load() {
        Ok(registry) => registry,
        Err(e) => {
            error!("❌ Error loading face database: {}", e);
            Registry::empty()
        }
    };

    if registry.is_empty() {
        warn!("⚠️  No faces loaded. The system will run but won't recognize anyone.");
    } else {
        info!("✅ Loaded {} faces into the database", registry.len());
    }
    registry
}
