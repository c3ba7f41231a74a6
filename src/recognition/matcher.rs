//! # Matcher
//!
//! Reduces the embeddings found in one frame to identity labels and a single
//! access decision.
//!
//! ## Per-face rule
//!
//! 1. Test the embedding against every enrolled identity with the
//!    comparator's match test.
//! 2. No identity passes: label `"Unknown"`.
//! 3. Otherwise pick the passing identity with the smallest distance. An
//!    identity that is closer but fails the match test is never chosen.
//!    Ties go to the identity registered first.
//!
//! ## Access decision
//!
//! Access is an OR across all faces in the frame: a single recognised face
//! grants access even when every other face in the frame is unknown.

use std::sync::Arc;

use log::warn;

use super::embedding::{Embedding, EuclideanComparator, FaceComparator};
use super::registry::{EnrolledIdentity, Registry};

/// Label given to a face that matched no enrolled identity.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Labels for one frame, index-aligned with the input embeddings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutcome {
    pub labels: Vec<String>,
    pub access_granted: bool,
    /// Set when matching short-circuited because no identities are enrolled.
    pub registry_empty: bool,
}

impl MatchOutcome {
    fn all_unknown(count: usize, registry_empty: bool) -> Self {
        Self {
            labels: vec![UNKNOWN_LABEL.to_string(); count],
            access_granted: false,
            registry_empty,
        }
    }
}

pub struct Matcher {
    comparator: Arc<dyn FaceComparator>,
}

impl Matcher {
    pub fn new(comparator: Arc<dyn FaceComparator>) -> Self {
        Self { comparator }
    }

    pub fn match_faces(&self, registry: &Registry, embeddings: &[Embedding]) -> MatchOutcome {
        if registry.is_empty() {
            warn!("⚠️  No face database loaded, skipping recognition");
            return MatchOutcome::all_unknown(embeddings.len(), true);
        }

        let labels: Vec<String> = embeddings
            .iter()
            .map(|embedding| match self.best_match(registry, embedding) {
                Some(identity) => identity.name.clone(),
                None => UNKNOWN_LABEL.to_string(),
            })
            .collect();

        let access_granted = labels.iter().any(|label| label != UNKNOWN_LABEL);

        MatchOutcome {
            labels,
            access_granted,
            registry_empty: false,
        }
    }

    /// Closest identity among those that pass the match test.
    fn best_match<'r>(
        &self,
        registry: &'r Registry,
        candidate: &Embedding,
    ) -> Option<&'r EnrolledIdentity> {
        let mut best: Option<(&EnrolledIdentity, f64)> = None;

        for identity in registry.iter() {
            if !self.comparator.is_match(&identity.embedding, candidate) {
                continue;
            }
            let distance = self.comparator.distance(&identity.embedding, candidate);
            // Strictly-less keeps the earlier identity on a tie
            if best.map_or(true, |(_, best_distance)| distance < best_distance) {
                best = Some((identity, distance));
            }
        }

        best.map(|(identity, _)| identity)
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(Arc::new(EuclideanComparator::default()))
    }
}
