// src/slideshow.rs

//! The presentation loop.
//!
//! Each iteration checks the cancel token, pulls the next path from the
//! playlist, decodes it, composites into the current draw target, presents,
//! and waits. Paths that fail to decode are tombstoned and the loop retries
//! immediately, without presenting or waiting. Cancellation granularity is
//! one frame: the token is polled between iterations and at wait-slice
//! boundaries, never mid-decode or mid-blit.

use crate::display::OutputSurface;
use crate::loader::ImageLoader;
use crate::pixels::Image;
use crate::playlist::Playlist;
use crate::render::composite;
use crate::signal::CancelToken;
use log::{debug, info, warn};
use std::thread;
use std::time::Duration;

/// Time each image stays on screen. Short in debug builds to keep the
/// edit-run cycle tolerable.
pub const FRAME_DELAY: Duration = if cfg!(debug_assertions) {
    Duration::from_secs(1)
} else {
    Duration::from_secs(5)
};

/// Granularity at which the per-image wait re-checks the cancel token.
const WAIT_SLICE: Duration = Duration::from_millis(100);

/// Why the loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Stop signal observed; normal termination.
    Cancelled,
    /// Every playlist entry was tombstoned; reported as a failure.
    Exhausted,
}

/// Runs the slideshow until cancellation or playlist exhaustion.
pub fn run(
    playlist: &mut Playlist,
    loader: &dyn ImageLoader,
    output: &mut dyn OutputSurface,
    token: CancelToken,
    delay: Duration,
) -> StopReason {
    while !token.is_cancelled() {
        let image = match next_image(playlist, loader) {
            Some(image) => image,
            None => {
                warn!("no more images in the playlist");
                return StopReason::Exhausted;
            }
        };

        let mut target = output.draw_target();
        match composite(&image, &mut target) {
            Ok(()) => output.present(),
            // decoder output is non-empty, so this should be unreachable
            Err(err) => warn!("compositing failed: {err}"),
        }
        drop(image);

        wait(token, delay);
    }
    info!("stop requested, ending slideshow");
    StopReason::Cancelled
}

/// Decodes the next playlist entry, tombstoning entries that fail until one
/// decodes or the playlist runs out. Skips never present or wait.
fn next_image(playlist: &mut Playlist, loader: &dyn ImageLoader) -> Option<Image> {
    let mut path = playlist.next()?;
    loop {
        match loader.load(&path) {
            Ok(image) if image.width() > 0 && image.height() > 0 => {
                debug!(
                    "decoded {} ({}x{})",
                    path.display(),
                    image.width(),
                    image.height()
                );
                return Some(image);
            }
            Ok(_) => {
                warn!("removing {}: decoded to an empty image", path.display());
                path = playlist.remove_current()?;
            }
            Err(err) => {
                warn!("removing {}: {err:#}", path.display());
                path = playlist.remove_current()?;
            }
        }
    }
}

/// Blocking wait, re-checking the token every [`WAIT_SLICE`] so a stop signal
/// ends the session without sitting out the whole delay.
fn wait(token: CancelToken, delay: Duration) {
    let mut left = delay;
    while !left.is_zero() && !token.is_cancelled() {
        let slice = left.min(WAIT_SLICE);
        thread::sleep(slice);
        left -= slice;
    }
}

#[cfg(test)]
mod tests;
