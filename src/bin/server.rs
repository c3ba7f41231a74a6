//! # Server Binary Entry Point
//!
//! Thin wrapper that loads the configuration and runs the recognition server.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin server -- --config config/server.toml
//! cargo run --bin server -- --address 0.0.0.0:9999 --registry face_database.json
//! ```
//!
//! The server will:
//! 1. Load the enrolled-face registry (an empty one if it is missing)
//! 2. Listen for camera clients
//! 3. Answer every received frame with a recognition decision
//! 4. Append each decision to the access log

use clap::Parser;
use env_logger::Builder;
use log::{info, LevelFilter};
use std::io::Write;
use std::path::PathBuf;

use facegate::common::config::{load_config, ServerConfig};
use facegate::server::{build_handler, Server};

/// Command-line arguments for the server binary
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the server configuration file (TOML format)
    ///
    /// Example: config/server.toml. Built-in defaults are used when omitted.
    #[arg(short, long)]
    config: Option<String>,

    /// Listen address, overrides the configuration file
    #[arg(short, long)]
    address: Option<String>,

    /// Registry file, overrides the configuration file
    #[arg(short, long)]
    registry: Option<PathBuf>,
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

    let mut config: ServerConfig = match &args.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(address) = args.address {
        config.server.address = address;
    }
    if let Some(registry) = args.registry {
        config.registry.path = registry;
    }

    let handler = build_handler(&config)?;
    let server = Server::bind(&config.server.address, handler).await?;

    tokio::select! {
        _ = server.run() => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("🛑 Shutting down");
        }
    }

    Ok(())
}
