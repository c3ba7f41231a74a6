//! # Message Protocol
//!
//! Defines the server -> client decision message. (Client -> server frames
//! carry raw compressed image bytes and have no schema.)
//!
//! Responses are serialized to JSON and sent with the 4-byte length prefix
//! from [`codec`](super::codec). The schema is closed: unknown or missing keys
//! are rejected as [`FaceGateError::MalformedFrame`] instead of being defaulted.
//!
//! ```json
//! {"faces_detected": 2,
//!  "recognized": ["Alice", "Unknown"],
//!  "access_granted": true,
//!  "timestamp": "2024-05-01 12:00:00",
//!  "face_locations": [{"top": 40, "right": 160, "bottom": 140, "left": 48}, ...]}
//! ```

use serde::{Deserialize, Serialize};

use super::error::{FaceGateError, Result};
use crate::recognition::{FaceRegion, RecognitionResult};

/// Timestamp format used in responses and the access log.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Decision for one analysed frame.
///
/// `recognized[i]` and `face_locations[i]` describe the same face, and both
/// hold exactly `faces_detected` entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerResponse {
    pub faces_detected: usize,
    pub recognized: Vec<String>,
    pub access_granted: bool,
    pub timestamp: String,
    pub face_locations: Vec<FaceRegion>,
}

impl ServerResponse {
    /// Build a response from index-aligned results.
    pub fn new(results: Vec<RecognitionResult>, access_granted: bool, timestamp: String) -> Self {
        let (face_locations, recognized): (Vec<_>, Vec<_>) = results
            .into_iter()
            .map(|result| (result.region, result.label))
            .unzip();

        Self {
            faces_detected: face_locations.len(),
            recognized,
            access_granted,
            timestamp,
            face_locations,
        }
    }

    /// Pair every location with its label.
    pub fn results(&self) -> Vec<RecognitionResult> {
        self.face_locations
            .iter()
            .zip(&self.recognized)
            .map(|(region, label)| RecognitionResult {
                region: *region,
                label: label.clone(),
            })
            .collect()
    }

    /// Check the per-face arrays agree with `faces_detected`.
    pub fn validate(&self) -> Result<()> {
        if self.recognized.len() != self.faces_detected
            || self.face_locations.len() != self.faces_detected
        {
            return Err(FaceGateError::MalformedFrame(format!(
                "faces_detected={} but {} names and {} locations",
                self.faces_detected,
                self.recognized.len(),
                self.face_locations.len()
            )));
        }
        Ok(())
    }

    /// Serialize to JSON bytes for transmission.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| FaceGateError::MalformedFrame(format!("cannot serialize response: {}", e)))
    }

    /// Deserialize and validate a received payload.
    ///
    /// # Errors
    /// - `MalformedFrame` for invalid UTF-8/JSON, unknown or missing keys,
    ///   or per-face arrays that disagree with `faces_detected`
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let response: ServerResponse = serde_json::from_slice(bytes)
            .map_err(|e| FaceGateError::MalformedFrame(format!("invalid response: {}", e)))?;
        response.validate()?;
        Ok(response)
    }
}

/// Current local time in [`TIMESTAMP_FORMAT`].
pub fn current_timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(label: &str, region: FaceRegion) -> RecognitionResult {
        RecognitionResult {
            region,
            label: label.to_string(),
        }
    }

    #[test]
    fn test_new_keeps_index_correspondence() {
        let a = FaceRegion::new(0, 10, 10, 0);
        let b = FaceRegion::new(20, 40, 40, 20);
        let response = ServerResponse::new(
            vec![result("Alice", a), result("Unknown", b)],
            true,
            "2024-05-01 12:00:00".into(),
        );

        assert_eq!(response.faces_detected, 2);
        assert_eq!(response.recognized, vec!["Alice", "Unknown"]);
        assert_eq!(response.face_locations, vec![a, b]);
        assert_eq!(response.results()[1], result("Unknown", b));
        response.validate().unwrap();
    }

    #[test]
    fn test_wire_keys_in_order() {
        let response = ServerResponse::new(
            vec![result("Alice", FaceRegion::new(1, 2, 3, 4))],
            true,
            "2024-05-01 12:00:00".into(),
        );
        let json = String::from_utf8(response.to_bytes().unwrap()).unwrap();
        assert_eq!(
            json,
            r#"{"faces_detected":1,"recognized":["Alice"],"access_granted":true,"timestamp":"2024-05-01 12:00:00","face_locations":[{"top":1,"right":2,"bottom":3,"left":4}]}"#
        );
    }

    #[test]
    fn test_accepts_python_style_spacing() {
        let json = br#"{"faces_detected": 0, "recognized": [], "access_granted": false, "timestamp": "2024-05-01 12:00:00", "face_locations": []}"#;
        let response = ServerResponse::from_bytes(json).unwrap();
        assert_eq!(response.faces_detected, 0);
        assert!(!response.access_granted);
    }

    #[test]
    fn test_missing_field_is_malformed() {
        let json = br#"{"faces_detected": 0, "recognized": [], "access_granted": false, "timestamp": "t"}"#;
        assert!(matches!(
            ServerResponse::from_bytes(json),
            Err(FaceGateError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_unknown_field_is_malformed() {
        let json = br#"{"faces_detected": 0, "recognized": [], "access_granted": false, "timestamp": "t", "face_locations": [], "door": "open"}"#;
        assert!(matches!(
            ServerResponse::from_bytes(json),
            Err(FaceGateError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_count_mismatch_is_malformed() {
        let json = br#"{"faces_detected": 2, "recognized": ["Alice"], "access_granted": true, "timestamp": "t", "face_locations": [{"top":1,"right":2,"bottom":3,"left":4}]}"#;
        assert!(matches!(
            ServerResponse::from_bytes(json),
            Err(FaceGateError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_non_utf8_is_malformed() {
        assert!(matches!(
            ServerResponse::from_bytes(&[0xFF, 0xFE, 0x00]),
            Err(FaceGateError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_timestamp_format() {
        let ts = current_timestamp();
        assert!(chrono::NaiveDateTime::parse_from_str(&ts, TIMESTAMP_FORMAT).is_ok());
    }
}
