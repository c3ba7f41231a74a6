//! # Client Binary Entry Point
//!
//! Streams camera frames to the recognition server and keeps a preview of
//! the latest decision.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin client -- --config config/client.toml
//! cargo run --bin client -- --server 192.168.1.20:9999 --frames ./frames
//! ```
//!
//! The client will:
//! 1. Open the frame source
//! 2. Connect to the server, reconnecting whenever the link drops
//! 3. Send frames at the configured pace and draw the returned decisions
//! 4. Stop cleanly on Ctrl-C

use clap::Parser;
use env_logger::Builder;
use log::{error, info, LevelFilter};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use facegate::client::{
    ClientCore, ClientSession, ConnectionManager, EncoderDetector, ImageDirSource, LocalDetector,
    LogRenderer, OverlayRenderer, PreviewWriter,
};
use facegate::common::config::{load_config, ClientConfig};
use facegate::recognition::encoder::encoder_from_argv;

/// Command-line arguments for the client binary
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the client configuration file (TOML format)
    ///
    /// Example: config/client.toml. Built-in defaults are used when omitted.
    #[arg(short, long)]
    config: Option<String>,

    /// Server address (host:port), overrides the configuration file
    #[arg(short, long)]
    server: Option<String>,

    /// Directory of frames to stream, overrides the configuration file
    #[arg(short, long)]
    frames: Option<PathBuf>,
}

/// Initialize the logging system with timestamp, level, and message formatting.
///
/// Format: `[HH:MM:SS] [LEVEL] message`. `RUST_LOG` overrides the INFO default.
fn init_logger() {
    Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] [{}] {}",
                chrono::Local::now().format("%H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    let args = Args::parse();

    let mut config: ClientConfig = match &args.config {
        Some(path) => load_config(path)?,
        None => ClientConfig::default(),
    };
    if let Some(server) = args.server {
        config.client.server_address = server;
    }
    if let Some(frames) = args.frames {
        config.camera.image_dir = frames;
    }

    let source = ImageDirSource::open(&config.camera.image_dir)?;

    let mut renderers: Vec<Box<dyn OverlayRenderer>> = vec![Box::new(LogRenderer::new())];
    if let Some(path) = &config.preview.path {
        info!("🖼️  Writing preview to {}", path.display());
        renderers.push(Box::new(PreviewWriter::new(path)));
    }

    let detector: Arc<dyn LocalDetector> = Arc::new(EncoderDetector::new(encoder_from_argv(
        config.preview.local_detector_command.as_deref(),
    )));

    let session = ClientSession::new(config.stream.staleness());
    let core = ClientCore::new(
        config.client.name.clone(),
        config.stream.clone(),
        source,
        renderers,
        detector,
    );
    let mut manager = ConnectionManager::new(
        config.client.server_address.clone(),
        config.stream.reconnect_delay(),
        core,
        session.clone(),
    );

    let stopper = session.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("🛑 Ctrl-C received, stopping");
                stopper.stop();
            }
            Err(e) => error!("💥 Cannot listen for Ctrl-C: {}", e),
        }
    });

    manager.run().await?;
    Ok(())
}
