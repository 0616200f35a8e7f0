// SPDX-License-Identifier: GPL-3.0-only

use capture_session::backend::CameraPosition;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "capture-session")]
#[command(about = "Camera capture session manager (software-simulated backend)")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum PositionArg {
    Front,
    Back,
}

impl From<PositionArg> for CameraPosition {
    fn from(arg: PositionArg) -> Self {
        match arg {
            PositionArg::Front => CameraPosition::Front,
            PositionArg::Back => CameraPosition::Back,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras
    Devices,

    /// Take a photo
    Photo {
        /// Camera position to use
        #[arg(short, long)]
        position: Option<PositionArg>,

        /// Fire the flash for this capture
        #[arg(short, long)]
        flash: bool,

        /// Output file path (default: ~/Pictures/CaptureSession/photo_TIMESTAMP.png)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Record a video
    Record {
        /// Camera position to use
        #[arg(short, long)]
        position: Option<PositionArg>,

        /// Recording duration in seconds
        #[arg(short, long, default_value = "10")]
        duration: u64,

        /// Output file path (default: ~/Videos/CaptureSession/video_TIMESTAMP.gif)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Exercise the session and print every state snapshot
    Watch,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=capture_session=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices => cli::list_devices(),
        Commands::Photo {
            position,
            flash,
            output,
        } => cli::take_photo(position.map(Into::into), flash, output),
        Commands::Record {
            position,
            duration,
            output,
        } => cli::record_video(position.map(Into::into), duration, output),
        Commands::Watch => cli::watch_session(),
    }
}
