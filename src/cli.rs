// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Inspecting a camera or video source
//! - Streaming frames, optionally saving them
//! - Batch processing images
//! - Managing user accounts and configuration

use chrono::Local;
use clap::{Args, Subcommand};
use framefeed::accounts::UserStore;
use framefeed::backends::capture::{SourceDescriptor, default_backend};
use framefeed::constants::file_formats;
use framefeed::errors::{AppError, AppResult};
use framefeed::{Config, ImageHandler, MediaHandler, Transform, filters};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, warn};

/// Built-in filters selectable from the command line, applied in this order
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Mirror frames horizontally
    #[arg(long)]
    pub mirror: bool,

    /// Rotate frames by 180 degrees
    #[arg(long)]
    pub rotate: bool,

    /// Convert frames to grayscale
    #[arg(long)]
    pub grayscale: bool,

    /// Resize frames, e.g. 640x480
    #[arg(long, value_parser = parse_size)]
    pub resize: Option<(u32, u32)>,
}

impl FilterArgs {
    fn transforms(&self) -> Vec<Transform> {
        let mut chain = Vec::new();
        if self.mirror {
            chain.push(filters::mirror_horizontal());
        }
        if self.rotate {
            chain.push(filters::rotate_180());
        }
        if self.grayscale {
            chain.push(filters::grayscale());
        }
        if let Some((width, height)) = self.resize {
            chain.push(filters::resize(width, height));
        }
        chain
    }
}

fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", value))?;
    let width = width.trim().parse().map_err(|_| format!("bad width in '{}'", value))?;
    let height = height.trim().parse().map_err(|_| format!("bad height in '{}'", value))?;
    Ok((width, height))
}

#[derive(Subcommand)]
pub enum UserAction {
    /// Register a new user
    Register {
        username: String,
        #[arg(short, long)]
        password: String,
        /// Avatar image file
        #[arg(short, long)]
        avatar: PathBuf,
    },
    /// Check a user's credentials
    Login {
        username: String,
        #[arg(short, long)]
        password: String,
    },
    /// Set a new password
    Passwd {
        username: String,
        #[arg(short, long)]
        new_password: String,
    },
    /// Replace a user's avatar
    Avatar {
        username: String,
        #[arg(short, long)]
        password: String,
        avatar: PathBuf,
    },
    /// Delete a user
    Delete {
        username: String,
        #[arg(short, long)]
        password: String,
    },
    /// Show a user's avatar path
    Show { username: String },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the current configuration
    Show,
    /// Turn info-level logging on or off
    Verbose {
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },
    /// Restore defaults
    Reset,
}

pub struct StreamOptions {
    pub source: Option<String>,
    pub fps: Option<u32>,
    pub output: Option<PathBuf>,
    pub max_frames: Option<u64>,
    pub filters: FilterArgs,
}

fn resolve_source(config: &Config, source: Option<&str>) -> SourceDescriptor {
    let source = source
        .map(SourceDescriptor::parse)
        .unwrap_or(SourceDescriptor::Camera(config.camera_index));

    if let Some(ext) = source
        .path()
        .and_then(|path| path.extension())
        .map(|ext| ext.to_string_lossy())
        && !file_formats::is_video_extension(&ext)
    {
        warn!(source = %source, "Unrecognised video container extension");
    }
    source
}

/// Print geometry and timing of a source
pub fn show_info(config: &Config, source: Option<&str>) -> AppResult<()> {
    let source = resolve_source(config, source);
    let handler = MediaHandler::with_source(default_backend()?, source.clone(), config.frame_rate)?;
    handler
        .signals()
        .failed
        .connect(|reason| eprintln!("Error: {}", reason));

    handler.start();
    let info = handler.source_info();
    handler.stop();
    let info = info?;

    println!("Source: {}", source);
    println!("  Resolution: {}x{}", info.width, info.height);
    println!("  Frame rate: {:.2} fps", info.fps);
    match info.frames {
        Some(frames) => println!("  Frames:     {}", frames),
        None => println!("  Frames:     live"),
    }
    Ok(())
}

/// Stream a camera or video file until it ends, Ctrl+C, or `max_frames`
pub fn stream(config: &Config, options: StreamOptions) -> AppResult<()> {
    let source = resolve_source(config, options.source.as_deref());
    let fps = options.fps.unwrap_or(config.frame_rate);
    let handler = MediaHandler::with_source(default_backend()?, source.clone(), fps)?;

    for transform in options.filters.transforms() {
        handler.add_transform(transform);
    }

    if let Some(dir) = &options.output {
        std::fs::create_dir_all(dir).map_err(|e| {
            AppError::Other(format!("Cannot create {}: {}", dir.display(), e))
        })?;
    }

    let count = Arc::new(AtomicU64::new(0));
    let session = Local::now().format("%Y%m%d_%H%M%S").to_string();
    {
        let count = Arc::clone(&count);
        let output = options.output.clone();
        let max_frames = options.max_frames;
        let stopper = handler.clone();
        handler.signals().frame_ready.connect(move |frame| {
            let n = count.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(dir) = &output {
                let path = dir.join(format!(
                    "frame_{}_{:05}.{}",
                    session,
                    n,
                    file_formats::OUTPUT_EXTENSION
                ));
                if let Err(e) = frame.save(&path) {
                    warn!(path = %path.display(), error = %e, "Failed to save frame");
                }
            }
            if max_frames.is_some_and(|max| n >= max) {
                stopper.stop();
            }
        });
    }
    handler
        .signals()
        .failed
        .connect(|reason| eprintln!("Error: {}", reason));
    handler.signals().opened.connect(|_| info!("Streaming started"));

    let stopper = handler.clone();
    ctrlc::set_handler(move || stopper.stop())
        .map_err(|e| AppError::Other(format!("Failed to install Ctrl+C handler: {}", e)))?;

    handler.start();
    if !handler.is_active() {
        handler.signals().disconnect_all();
        return Err(AppError::Other(format!("Unable to open device: {}", source)));
    }

    if let Ok(info) = handler.source_info() {
        println!("Streaming {} ({}) at {} fps", source, info, fps);
    }
    println!("Press Ctrl+C to stop");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| AppError::Other(format!("Failed to start runtime: {}", e)))?;
    runtime.block_on(handler.run());

    handler.stop();
    // Listeners hold handler clones
    handler.signals().disconnect_all();

    println!("{} frames", count.load(Ordering::SeqCst));
    Ok(())
}

/// Run an image file or directory through the filters
pub fn process_images(path: &Path, output: Option<&Path>, filter_args: &FilterArgs) -> AppResult<()> {
    let handler = ImageHandler::with_path(path);
    for transform in filter_args.transforms() {
        handler.add_transform(transform);
    }

    if let Some(dir) = output {
        std::fs::create_dir_all(dir).map_err(|e| {
            AppError::Other(format!("Cannot create {}: {}", dir.display(), e))
        })?;
    }

    let processed = Arc::new(AtomicU64::new(0));
    let failed = Arc::new(AtomicU64::new(0));
    {
        let processed = Arc::clone(&processed);
        let output = output.map(Path::to_path_buf);
        let current = handler.clone();
        handler.signals().frame_ready.connect(move |frame| {
            processed.fetch_add(1, Ordering::SeqCst);
            let name = current.file_name();
            let stem = name
                .as_deref()
                .and_then(Path::file_stem)
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| "image".to_string());
            println!("  {} ({}x{})", stem, frame.width, frame.height);

            if let Some(dir) = &output {
                let path = dir.join(format!("{}.{}", stem, file_formats::OUTPUT_EXTENSION));
                if let Err(e) = frame.save(&path) {
                    warn!(path = %path.display(), error = %e, "Failed to save image");
                }
            }
        });
    }
    {
        let failed = Arc::clone(&failed);
        handler.signals().failed.connect(move |reason| {
            failed.fetch_add(1, Ordering::SeqCst);
            eprintln!("Error: {}", reason);
        });
    }

    println!("Processing {}", path.display());
    handler.start();
    handler.stop();
    handler.signals().disconnect_all();

    println!(
        "{} processed, {} failed",
        processed.load(Ordering::SeqCst),
        failed.load(Ordering::SeqCst)
    );
    Ok(())
}

/// Account management
pub fn user(db: &Path, action: UserAction) -> AppResult<()> {
    if let Some(parent) = db.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            AppError::Other(format!("Cannot create {}: {}", parent.display(), e))
        })?;
    }
    let store = UserStore::open(db)?;

    match action {
        UserAction::Register {
            username,
            password,
            avatar,
        } => {
            store.register(&username, &password, &avatar)?;
            println!("Registered {}", username);
        }
        UserAction::Login { username, password } => {
            store.verify_login(&username, &password)?;
            println!("Login OK");
        }
        UserAction::Passwd {
            username,
            new_password,
        } => {
            store.change_password(&username, &new_password)?;
            println!("Password changed for {}", username);
        }
        UserAction::Avatar {
            username,
            password,
            avatar,
        } => {
            store.change_avatar(&username, &password, &avatar)?;
            println!("Avatar changed for {}", username);
        }
        UserAction::Delete { username, password } => {
            store.delete_user(&username, &password)?;
            println!("Deleted {}", username);
        }
        UserAction::Show { username } => {
            let avatar = store.get_avatar(&username)?;
            println!("{}", username);
            println!("  Avatar: {}", avatar.display());
        }
    }
    Ok(())
}

/// Configuration management
pub fn config(path: &Path, mut config: Config, action: ConfigAction) -> AppResult<()> {
    match action {
        ConfigAction::Show => {
            println!("Config file: {}", path.display());
            println!("  verbose:      {}", config.verbose);
            println!("  frame_rate:   {}", config.frame_rate);
            println!("  camera_index: {}", config.camera_index);
            println!("  user_db:      {}", config.user_db_path().display());
        }
        ConfigAction::Verbose { enabled } => {
            config.verbose = enabled;
            config.save(path)?;
            println!("verbose = {}", enabled);
        }
        ConfigAction::Reset => {
            Config::reset(path)?;
            println!("Configuration reset to defaults");
        }
    }
    Ok(())
}
