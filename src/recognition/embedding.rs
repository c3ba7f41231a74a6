//! Face embeddings and the comparison rule used to match them.

use serde::{Deserialize, Serialize};

/// Default match tolerance for the Euclidean comparator.
///
/// Same threshold the reference 128-d encoder uses: lower is stricter.
pub const DEFAULT_TOLERANCE: f64 = 0.6;

/// Fixed-length numeric vector describing one detected face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding(Vec<f64>);

impl Embedding {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// L2 distance; vectors of different dimension are infinitely far apart.
    pub fn euclidean_distance(&self, other: &Embedding) -> f64 {
        if self.len() != other.len() {
            return f64::INFINITY;
        }
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt()
    }
}

impl From<Vec<f64>> for Embedding {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

/// Comparison semantics of the face encoder: a boolean match test plus a
/// continuous distance used to rank the entries that pass it.
pub trait FaceComparator: Send + Sync {
    fn distance(&self, known: &Embedding, candidate: &Embedding) -> f64;

    fn is_match(&self, known: &Embedding, candidate: &Embedding) -> bool;
}

/// Euclidean distance with a fixed tolerance: match iff `distance <= tolerance`.
#[derive(Debug, Clone, Copy)]
pub struct EuclideanComparator {
    tolerance: f64,
}

impl EuclideanComparator {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }
}

impl Default for EuclideanComparator {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE)
    }
}

impl FaceComparator for EuclideanComparator {
    fn distance(&self, known: &Embedding, candidate: &Embedding) -> f64 {
        known.euclidean_distance(candidate)
    }

    fn is_match(&self, known: &Embedding, candidate: &Embedding) -> bool {
        self.distance(known, candidate) <= self.tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_euclidean_distance() {
        let a = Embedding::new(vec![0.0, 0.0]);
        let b = Embedding::new(vec![3.0, 4.0]);
        assert_eq!(a.euclidean_distance(&b), 5.0);
        assert_eq!(a.euclidean_distance(&a), 0.0);
    }

    #[test]
    fn test_dimension_mismatch_never_matches() {
        let comparator = EuclideanComparator::new(1e9);
        let a = Embedding::new(vec![0.0, 0.0]);
        let b = Embedding::new(vec![0.0, 0.0, 0.0]);

        assert!(a.euclidean_distance(&b).is_infinite());
        assert!(!comparator.is_match(&a, &b));
    }

    #[test]
    fn test_tolerance_is_inclusive() {
        let comparator = EuclideanComparator::new(0.5);
        let known = Embedding::new(vec![0.0]);

        assert!(comparator.is_match(&known, &Embedding::new(vec![0.5])));
        assert!(!comparator.is_match(&known, &Embedding::new(vec![0.5001])));
    }

    #[test]
    fn test_serializes_as_plain_array() {
        let json = serde_json::to_string(&Embedding::new(vec![0.5, -1.0])).unwrap();
        assert_eq!(json, "[0.5,-1.0]");
    }
}
