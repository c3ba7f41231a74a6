//! # Face Detect/Encode Collaborator
//!
//! Face detection and embedding are delegated to an external component. This
//! module only defines the seam and two ways to fill it.
//!
//! ## Command protocol
//!
//! [`CommandEncoder`] runs a configured program once per frame:
//! - stdin: the frame, PNG encoded
//! - stdout: a JSON array, one element per face
//!
//! ```json
//! [{"location": {"top": 10, "right": 60, "bottom": 70, "left": 12}, "encoding": [0.01, ...]}]
//! ```
//!
//! Locations are in the pixel space of the image the program received.

use std::io::{self, Cursor, Write};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread;

use image::{DynamicImage, ImageOutputFormat, RgbImage};
use log::{debug, warn};
use serde::Deserialize;

use super::embedding::Embedding;
use super::region::FaceRegion;
use crate::common::error::{FaceGateError, Result};

/// One face found by the collaborator.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DetectedFace {
    #[serde(rename = "location")]
    pub region: FaceRegion,
    #[serde(rename = "encoding")]
    pub embedding: Embedding,
}

impl DetectedFace {
    pub fn new(region: FaceRegion, embedding: Embedding) -> Self {
        Self { region, embedding }
    }
}

/// `detectAndEncode(image) -> [(region, embedding)]`.
///
/// Called from a blocking thread, never from the async reactor.
pub trait FaceEncoder: Send + Sync {
    fn detect_and_encode(&self, image: &RgbImage) -> Result<Vec<DetectedFace>>;
}

/// Detects nothing. Stand-in when no collaborator is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEncoder;

impl FaceEncoder for NoopEncoder {
    fn detect_and_encode(&self, _image: &RgbImage) -> Result<Vec<DetectedFace>> {
        Ok(Vec::new())
    }
}

/// Runs an external program per frame; see the module docs for the protocol.
#[derive(Debug, Clone)]
pub struct CommandEncoder {
    program: String,
    args: Vec<String>,
}

impl CommandEncoder {
    /// Build from an argv list such as `["python3", "encode_faces.py"]`.
    ///
    /// Returns `None` for an empty list.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    fn run(&self, image: &RgbImage) -> Result<Vec<u8>> {
        let mut png = Vec::new();
        DynamicImage::ImageRgb8(image.clone())
            .write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)
            .map_err(|e| FaceGateError::Encoder(format!("PNG encoding failed: {}", e)))?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| FaceGateError::Encoder(format!("cannot start {}: {}", self.program, e)))?;

        // stdin is fed from its own thread while both output pipes drain;
        // every path, a failed write included, reaps the child.
        let stdin = child.stdin.take();
        let (written, output) = thread::scope(|scope| {
            let writer = scope.spawn(move || match stdin {
                Some(mut stdin) => stdin.write_all(&png),
                None => Ok(()),
            });
            let output = child.wait_with_output();
            let written = writer
                .join()
                .unwrap_or_else(|_| Err(io::Error::new(io::ErrorKind::Other, "stdin writer panicked")));
            (written, output)
        });

        let output = output
            .map_err(|e| FaceGateError::Encoder(format!("waiting for {}: {}", self.program, e)))?;
        if !output.status.success() {
            return Err(FaceGateError::Encoder(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        written.map_err(|e| FaceGateError::Encoder(format!("writing frame to {}: {}", self.program, e)))?;
        Ok(output.stdout)
    }
}

impl FaceEncoder for CommandEncoder {
    fn detect_and_encode(&self, image: &RgbImage) -> Result<Vec<DetectedFace>> {
        let stdout = self.run(image)?;
        let faces: Vec<DetectedFace> = serde_json::from_slice(&stdout)
            .map_err(|e| FaceGateError::Encoder(format!("unparseable output: {}", e)))?;
        debug!("{} returned {} faces", self.program, faces.len());
        Ok(faces)
    }
}

/// Build the configured encoder, or fall back to [`NoopEncoder`].
pub fn encoder_from_argv(argv: Option<&[String]>) -> Arc<dyn FaceEncoder> {
    match argv.and_then(CommandEncoder::from_argv) {
        Some(encoder) => Arc::new(encoder),
        None => {
            warn!("⚠️  No face encoder command configured; no faces will be detected");
            Arc::new(NoopEncoder)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collaborator_output_shape() {
        let json = r#"[{"location": {"top": 1, "right": 9, "bottom": 8, "left": 2}, "encoding": [0.5, 0.25]}]"#;
        let faces: Vec<DetectedFace> = serde_json::from_str(json).unwrap();

        assert_eq!(
            faces,
            vec![DetectedFace::new(
                FaceRegion::new(1, 9, 8, 2),
                Embedding::new(vec![0.5, 0.25])
            )]
        );
    }

    #[test]
    fn test_from_argv() {
        assert!(CommandEncoder::from_argv(&[]).is_none());

        let encoder =
            CommandEncoder::from_argv(&["python3".to_string(), "faces.py".to_string()]).unwrap();
        assert_eq!(encoder.program, "python3");
        assert_eq!(encoder.args, vec!["faces.py"]);
    }

    #[test]
    fn test_noop_encoder_finds_nothing() {
        let image = RgbImage::new(8, 8);
        assert!(NoopEncoder.detect_and_encode(&image).unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_command_encoder_reads_stdout() {
        let script = r#"cat > /dev/null; echo '[{"location":{"top":0,"right":4,"bottom":4,"left":0},"encoding":[1.0]}]'"#;
        let encoder =
            CommandEncoder::from_argv(&["sh".into(), "-c".into(), script.into()]).unwrap();

        let faces = encoder.detect_and_encode(&RgbImage::new(4, 4)).unwrap();
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].region, FaceRegion::new(0, 4, 4, 0));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_encoder_failure_is_encoder_error() {
        let encoder = CommandEncoder::from_argv(&[
            "sh".into(),
            "-c".into(),
            "cat > /dev/null; echo boom >&2; exit 3".into(),
        ])
        .unwrap();

        match encoder.detect_and_encode(&RgbImage::new(4, 4)) {
            Err(FaceGateError::Encoder(message)) => assert!(message.contains("boom")),
            other => panic!("expected Encoder error, got {:?}", other),
        }
    }

    /// A 512x512 frame that PNG cannot shrink below the pipe buffer.
    fn noisy_frame() -> RgbImage {
        let mut state: u32 = 0x1234_5678;
        RgbImage::from_fn(512, 512, |_, _| {
            let mut channel = || {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state >> 24) as u8
            };
            image::Rgb([channel(), channel(), channel()])
        })
    }

    #[cfg(unix)]
    #[test]
    fn test_chatty_child_does_not_deadlock() {
        // 200 KB on stderr before reading any of the frame
        let encoder = CommandEncoder::from_argv(&[
            "sh".into(),
            "-c".into(),
            "head -c 200000 /dev/zero >&2; cat > /dev/null; echo '[]'".into(),
        ])
        .unwrap();

        let (done, result) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let _ = done.send(encoder.detect_and_encode(&noisy_frame()));
        });

        let faces = result
            .recv_timeout(std::time::Duration::from_secs(10))
            .expect("collaborator call finished")
            .unwrap();
        assert!(faces.is_empty());
    }

    /// Zombie children of this process whose command name is `comm`.
    #[cfg(target_os = "linux")]
    fn zombie_children(comm: &str) -> usize {
        let me = std::process::id().to_string();
        std::fs::read_dir("/proc")
            .unwrap()
            .filter_map(|entry| std::fs::read_to_string(entry.ok()?.path().join("stat")).ok())
            .filter(|stat| {
                let (Some(open), Some(close)) = (stat.find('('), stat.rfind(')')) else {
                    return false;
                };
                let mut fields = stat[close + 1..].split_whitespace();
                let state = fields.next();
                let ppid = fields.next();
                &stat[open + 1..close] == comm && state == Some("Z") && ppid == Some(me.as_str())
            })
            .count()
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_child_that_ignores_stdin_is_reaped() {
        // `true` exits without reading, so writing the frame fails
        let encoder = CommandEncoder::from_argv(&["true".into()]).unwrap();
        let frame = noisy_frame();

        for _ in 0..5 {
            assert!(matches!(
                encoder.detect_and_encode(&frame),
                Err(FaceGateError::Encoder(_))
            ));
        }
        assert_eq!(zombie_children("true"), 0);
    }
}
