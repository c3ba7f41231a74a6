//! # Result Cache
//!
//! Holds the most recent server decision so it can be drawn on the frames
//! that follow it. A decision older than the staleness window is ignored and
//! the preview falls back to local detection.

use std::time::{Duration, Instant};

use image::RgbImage;

use super::capture::LocalDetector;
use crate::common::messages::ServerResponse;
use crate::recognition::{FaceRegion, RecognitionResult};

#[derive(Debug, Clone)]
struct CachedResponse {
    response: ServerResponse,
    received_at: Instant,
}

#[derive(Debug, Clone)]
pub struct ResultCache {
    latest: Option<CachedResponse>,
    staleness: Duration,
}

impl ResultCache {
    pub fn new(staleness: Duration) -> Self {
        Self {
            latest: None,
            staleness,
        }
    }

    /// Replace the cached decision.
    pub fn store(&mut self, response: ServerResponse, received_at: Instant) {
        self.latest = Some(CachedResponse {
            response,
            received_at,
        });
    }

    /// The last decision, regardless of age.
    pub fn latest(&self) -> Option<&ServerResponse> {
        self.latest.as_ref().map(|cached| &cached.response)
    }

    pub fn received_at(&self) -> Option<Instant> {
        self.latest.as_ref().map(|cached| cached.received_at)
    }

    /// The last decision if it is at most `staleness` old at `now`.
    pub fn fresh(&self, now: Instant) -> Option<&ServerResponse> {
        self.latest
            .as_ref()
            .filter(|cached| now.saturating_duration_since(cached.received_at) <= self.staleness)
            .map(|cached| &cached.response)
    }
}

/// What to draw on the current frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Overlay {
    /// A fresh server decision, with regions in preview coordinates
    Server {
        results: Vec<RecognitionResult>,
        access_granted: bool,
    },
    /// Regions found locally; no identity and no decision
    Local { regions: Vec<FaceRegion> },
}

impl Overlay {
    /// Prefer a fresh server decision, otherwise run the local detector.
    ///
    /// Server regions refer to the frame that was sent, which was shrunk by
    /// the send scale; `restore` (its inverse) maps them back onto `frame`.
    pub fn select(
        fresh: Option<&ServerResponse>,
        frame: &RgbImage,
        detector: &dyn LocalDetector,
        restore: f32,
    ) -> Self {
        match fresh {
            Some(response) => Overlay::Server {
                results: response
                    .results()
                    .into_iter()
                    .map(|result| RecognitionResult {
                        region: result.region.rescale(restore),
                        label: result.label,
                    })
                    .collect(),
                access_granted: response.access_granted,
            },
            None => Overlay::Local {
                regions: detector.detect(frame),
            },
        }
    }

    pub fn face_count(&self) -> usize {
        match self {
            Overlay::Server { results, .. } => results.len(),
            Overlay::Local { regions } => regions.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingDetector {
        calls: AtomicUsize,
    }

    impl LocalDetector for CountingDetector {
        fn detect(&self, _frame: &RgbImage) -> Vec<FaceRegion> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            vec![FaceRegion::new(1, 2, 3, 4)]
        }
    }

    fn response() -> ServerResponse {
        ServerResponse::new(
            vec![RecognitionResult {
                region: FaceRegion::new(10, 30, 30, 10),
                label: "Alice".into(),
            }],
            true,
            "2024-05-01 12:00:00".into(),
        )
    }

    #[test]
    fn test_empty_cache_is_not_fresh() {
        let cache = ResultCache::new(Duration::from_secs(1));
        assert!(cache.fresh(Instant::now()).is_none());
        assert!(cache.latest().is_none());
    }

    #[test]
    fn test_staleness_boundary() {
        let received = Instant::now();
        let mut cache = ResultCache::new(Duration::from_millis(1000));
        cache.store(response(), received);

        assert!(cache.fresh(received + Duration::from_millis(999)).is_some());
        assert!(cache.fresh(received + Duration::from_millis(1000)).is_some());
        assert!(cache.fresh(received + Duration::from_millis(1001)).is_none());
        assert!(cache.latest().is_some(), "stale entries are kept, just not used");
    }

    #[test]
    fn test_store_replaces_previous() {
        let received = Instant::now();
        let mut cache = ResultCache::new(Duration::from_secs(1));
        cache.store(response(), received);

        let later = received + Duration::from_secs(5);
        let denied = ServerResponse::new(vec![], false, "2024-05-01 12:00:05".into());
        cache.store(denied.clone(), later);

        assert_eq!(cache.fresh(later), Some(&denied));
        assert_eq!(cache.received_at(), Some(later));
    }

    #[test]
    fn test_fresh_response_is_drawn_rescaled() {
        let detector = CountingDetector {
            calls: AtomicUsize::new(0),
        };
        let frame = RgbImage::new(100, 100);
        let fresh = response();

        let overlay = Overlay::select(Some(&fresh), &frame, &detector, 2.0);

        assert_eq!(
            overlay,
            Overlay::Server {
                results: vec![RecognitionResult {
                    region: FaceRegion::new(20, 60, 60, 20),
                    label: "Alice".into(),
                }],
                access_granted: true,
            }
        );
        assert_eq!(detector.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_without_fresh_response_local_detection_runs() {
        let detector = CountingDetector {
            calls: AtomicUsize::new(0),
        };
        let frame = RgbImage::new(100, 100);

        let overlay = Overlay::select(None, &frame, &detector, 2.0);

        assert_eq!(
            overlay,
            Overlay::Local {
                regions: vec![FaceRegion::new(1, 2, 3, 4)]
            }
        );
        assert_eq!(overlay.face_count(), 1);
        assert_eq!(detector.calls.load(Ordering::SeqCst), 1);
    }
}
