// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use framefeed::Config;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "framefeed")]
#[command(about = "Camera, video and image feeds with frame transforms")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    /// Configuration file (default: <config dir>/framefeed/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show geometry and frame rate of a camera or video file
    Info {
        /// Camera index or video file (default: configured camera)
        source: Option<String>,
    },

    /// Stream frames from a camera or video file
    Stream {
        /// Camera index or video file (default: configured camera)
        source: Option<String>,

        /// Frames per second (default: configured frame rate)
        #[arg(short, long)]
        fps: Option<u32>,

        /// Save every frame as PNG into this directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Stop after this many frames
        #[arg(short = 'n', long)]
        max_frames: Option<u64>,

        #[command(flatten)]
        filters: cli::FilterArgs,
    },

    /// Process one image or every image in a directory
    Images {
        /// Image file or directory
        path: PathBuf,

        /// Write processed images as PNG into this directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        filters: cli::FilterArgs,
    },

    /// Manage local user accounts
    User {
        /// Account database (default: from configuration)
        #[arg(long)]
        db: Option<PathBuf>,

        #[command(subcommand)]
        action: cli::UserAction,
    },

    /// Show or change configuration
    Config {
        #[command(subcommand)]
        action: cli::ConfigAction,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => Some(path),
        None => Config::default_path().ok(),
    };
    let config = config_path
        .as_deref()
        .map(Config::load_or_default)
        .unwrap_or_default();

    // RUST_LOG wins; otherwise the config's verbose flag picks the level
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level())),
        )
        .with_target(true)
        .with_level(true)
        .init();

    tracing::debug!(version = env!("GIT_VERSION"), config = ?config_path, "Starting framefeed");

    match cli.command {
        Commands::Info { source } => cli::show_info(&config, source.as_deref())?,
        Commands::Stream {
            source,
            fps,
            output,
            max_frames,
            filters,
        } => cli::stream(
            &config,
            cli::StreamOptions {
                source,
                fps,
                output,
                max_frames,
                filters,
            },
        )?,
        Commands::Images {
            path,
            output,
            filters,
        } => cli::process_images(&path, output.as_deref(), &filters)?,
        Commands::User { db, action } => {
            let db = db.unwrap_or_else(|| config.user_db_path());
            cli::user(&db, action)?
        }
        Commands::Config { action } => {
            let path = config_path.ok_or("No configuration directory available")?;
            cli::config(&path, config, action)?
        }
    }

    Ok(())
}
