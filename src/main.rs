// src/main.rs

mod display;
mod loader;
mod os;
mod pixels;
mod playlist;
mod render;
mod signal;
mod slideshow;

use crate::display::DrmDisplay;
use crate::loader::JpegLoader;
use crate::playlist::Playlist;
use crate::slideshow::StopReason;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;

/// Shuffled JPEG slideshow on a bare DRM/KMS output.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Directory to scan for images
    #[arg(default_value = ".")]
    dir: PathBuf,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_micros()
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(StopReason::Cancelled) => ExitCode::SUCCESS,
        Ok(StopReason::Exhausted) => {
            error!("no displayable images left under {}", args.dir.display());
            ExitCode::FAILURE
        }
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<StopReason> {
    let mut playlist = Playlist::scan(&args.dir)
        .with_context(|| format!("cannot build playlist from {}", args.dir.display()))?;
    info!(
        "{} candidate files under {}",
        playlist.remaining(),
        args.dir.display()
    );

    let mut display = DrmDisplay::open().context("cannot open display")?;
    let token = signal::install().context("cannot install signal handlers")?;

    Ok(slideshow::run(
        &mut playlist,
        &JpegLoader,
        &mut display,
        token,
        slideshow::FRAME_DELAY,
    ))
}
