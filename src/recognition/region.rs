use serde::{Deserialize, Serialize};

/// Face bounding box in pixel coordinates of the frame it was found in.
///
/// Field order matches the wire form `{top, right, bottom, left}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FaceRegion {
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub left: i32,
}

impl FaceRegion {
    pub fn new(top: i32, right: i32, bottom: i32, left: i32) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }

    /// Map the region into a frame `factor` times larger, rounding each edge.
    ///
    /// A region found on a copy downscaled by `f` is restored with `1.0 / f`.
    pub fn rescale(&self, factor: f32) -> Self {
        let scale = |v: i32| (v as f32 * factor).round() as i32;
        Self {
            top: scale(self.top),
            right: scale(self.right),
            bottom: scale(self.bottom),
            left: scale(self.left),
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

/// One detected face with the identity it was resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionResult {
    pub region: FaceRegion,
    pub label: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rescale_by_inverse_detection_factor() {
        let small = FaceRegion::new(10, 40, 35, 12);
        assert_eq!(small.rescale(4.0), FaceRegion::new(40, 160, 140, 48));
    }

    #[test]
    fn test_downscale_then_restore_is_within_rounding_tolerance() {
        let original = FaceRegion::new(123, 457, 389, 201);
        let factor = 0.25;

        let detected = original.rescale(factor);
        let restored = detected.rescale(1.0 / factor);

        // One small pixel is `1 / factor` original pixels
        let tolerance = (1.0 / factor).ceil() as i32;
        for (got, want) in [
            (restored.top, original.top),
            (restored.right, original.right),
            (restored.bottom, original.bottom),
            (restored.left, original.left),
        ] {
            assert!((got - want).abs() <= tolerance, "{} vs {}", got, want);
        }
    }

    #[test]
    fn test_width_and_height() {
        let region = FaceRegion::new(10, 50, 70, 20);
        assert_eq!(region.width(), 30);
        assert_eq!(region.height(), 60);
    }

    #[test]
    fn test_wire_shape() {
        let json = serde_json::to_string(&FaceRegion::new(1, 2, 3, 4)).unwrap();
        assert_eq!(json, r#"{"top":1,"right":2,"bottom":3,"left":4}"#);
    }
}
