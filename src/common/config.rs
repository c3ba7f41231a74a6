//! # Configuration Utilities
//!
//! Server and client configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working local setup: server on port 9999, client pointed at localhost.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::codec::MAX_FRAME_SIZE;
use crate::recognition::embedding::DEFAULT_TOLERANCE;

/// Port both halves use unless configured otherwise.
pub const DEFAULT_PORT: u16 = 9999;

/// Load a TOML configuration file and deserialize it into the specified type.
///
/// # Example
/// ```ignore
/// let config: ServerConfig = load_config("config/server.toml")?;
/// ```
pub fn load_config<T>(path: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let content = fs::read_to_string(path)?;
    let config: T = toml::from_str(&content)?;
    Ok(config)
}

// ============================================================================
// SERVER
// ============================================================================

/// Complete server configuration.
///
/// # Example TOML
///
/// ```toml
/// [server]
/// address = "0.0.0.0:9999"
///
/// [registry]
/// path = "face_database.json"
///
/// [recognition]
/// tolerance = 0.6
/// detection_scale = 0.25
/// encoder_command = ["python3", "encode_faces.py"]
///
/// [audit]
/// log_path = "access_log.txt"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerInfo,
    pub registry: RegistryConfig,
    pub recognition: RecognitionConfig,
    pub audit: AuditConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerInfo {
    /// Listen address (e.g., "0.0.0.0:9999")
    pub address: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            address: format!("0.0.0.0:{}", DEFAULT_PORT),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Enrolled-face store, see [`JsonRegistryLoader`](crate::recognition::JsonRegistryLoader)
    pub path: PathBuf,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("face_database.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Maximum embedding distance that still counts as a match
    pub tolerance: f64,
    /// Downscale applied before detection; regions are scaled back by its inverse
    pub detection_scale: f32,
    /// argv of the external detect/encode program; none means detect nothing
    pub encoder_command: Option<Vec<String>>,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            detection_scale: 0.25,
            encoder_command: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub log_path: PathBuf,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from("access_log.txt"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest accepted frame payload in bytes
    pub max_frame_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: MAX_FRAME_SIZE,
        }
    }
}

// ============================================================================
// CLIENT
// ============================================================================

/// Complete client configuration.
///
/// # Example TOML
///
/// ```toml
/// [client]
/// name = "FrontDoor"
/// server_address = "127.0.0.1:9999"
///
/// [stream]
/// frame_interval_ms = 100
/// reconnect_delay_ms = 5000
/// staleness_ms = 1000
/// send_scale = 0.3
/// jpeg_quality = 50
///
/// [camera]
/// image_dir = "frames"
///
/// [preview]
/// path = "preview.jpg"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub client: ClientInfo,
    pub stream: StreamConfig,
    pub camera: CameraConfig,
    pub preview: PreviewConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientInfo {
    /// Name used in log lines
    pub name: String,
    /// Server to connect to (host:port)
    pub server_address: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            name: "Client".to_string(),
            server_address: format!("127.0.0.1:{}", DEFAULT_PORT),
        }
    }
}

/// Pacing, reconnection and encoding parameters of the frame stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Minimum time between two sent frames
    pub frame_interval_ms: u64,
    /// Fixed wait before every reconnection attempt
    pub reconnect_delay_ms: u64,
    /// How long a server response stays applicable to new frames
    pub staleness_ms: u64,
    /// Downscale applied before compression
    pub send_scale: f32,
    pub jpeg_quality: u8,
    pub max_frame_bytes: usize,
}

impl StreamConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn staleness(&self) -> Duration {
        Duration::from_millis(self.staleness_ms)
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 100,
            reconnect_delay_ms: 5_000,
            staleness_ms: 1_000,
            send_scale: 0.3,
            jpeg_quality: 50,
            max_frame_bytes: MAX_FRAME_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Directory whose images stand in for camera frames
    pub image_dir: PathBuf,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            image_dir: PathBuf::from("frames"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Where to save the annotated preview frame; none disables it
    pub path: Option<PathBuf>,
    /// argv of the local fallback face detector
    pub local_detector_command: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_file_yields_defaults() {
        let server: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(server.server.address, "0.0.0.0:9999");
        assert_eq!(server.recognition.detection_scale, 0.25);
        assert_eq!(server.recognition.tolerance, DEFAULT_TOLERANCE);
        assert!(server.recognition.encoder_command.is_none());

        let client: ClientConfig = toml::from_str("").unwrap();
        assert_eq!(client.client.server_address, "127.0.0.1:9999");
        assert_eq!(client.stream.frame_interval(), Duration::from_millis(100));
        assert_eq!(client.stream.reconnect_delay(), Duration::from_secs(5));
        assert_eq!(client.stream.staleness(), Duration::from_secs(1));
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[recognition]\nencoder_command = [\"python3\", \"enc.py\"]\n\n[audit]\nlog_path = \"/tmp/a.log\""
        )
        .unwrap();

        let config: ServerConfig = load_config(file.path().to_str().unwrap()).unwrap();
        assert_eq!(
            config.recognition.encoder_command,
            Some(vec!["python3".to_string(), "enc.py".to_string()])
        );
        assert_eq!(config.recognition.detection_scale, 0.25);
        assert_eq!(config.audit.log_path, PathBuf::from("/tmp/a.log"));
        assert_eq!(config.registry.path, PathBuf::from("face_database.json"));
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(load_config::<ClientConfig>("/nonexistent/client.toml").is_err());
    }
}
