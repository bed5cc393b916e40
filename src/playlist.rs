// src/playlist.rs

//! Shuffled, cyclically restarting sequence of image paths.
//!
//! The playlist is built once from a recursive directory scan. Entries are
//! tombstoned in place when the loop gives up on a path (unreadable or not an
//! image), so the backing vector is never reallocated. The cursor advances
//! monotonically; wrapping past the end reshuffles the whole list, tombstones
//! included, before the next pass.

use anyhow::{bail, Context, Result};
use log::{debug, warn};
use rand::seq::SliceRandom;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct Playlist {
    entries: Vec<Option<PathBuf>>,
    /// Index of the most recently returned entry, `None` before the first
    /// `next()` call.
    cursor: Option<usize>,
    /// Live (non-tombstoned) entry count.
    remaining: usize,
}

impl Playlist {
    /// Recursively collects every regular file under `root` and shuffles the
    /// result. Fails if the root is unreadable or contains no files.
    pub fn scan(root: &Path) -> Result<Self> {
        let mut files = Vec::new();
        collect_files(root, &mut files)
            .with_context(|| format!("failed to scan {}", root.display()))?;
        if files.is_empty() {
            bail!("no files found under {}", root.display());
        }
        debug!("playlist: {} files under {}", files.len(), root.display());

        let mut playlist = Self {
            remaining: files.len(),
            entries: files.into_iter().map(Some).collect(),
            cursor: None,
        };
        playlist.reshuffle();
        Ok(playlist)
    }

    /// Number of paths still reachable.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Re-randomizes the entry order. Called at construction and every time
    /// the cursor wraps past the end.
    pub fn reshuffle(&mut self) {
        self.entries.shuffle(&mut rand::rng());
    }

    /// Advances to the next live entry, reshuffling on wraparound. Returns
    /// `None` once every entry has been tombstoned.
    pub fn next(&mut self) -> Option<PathBuf> {
        if self.remaining == 0 {
            return None;
        }
        let len = self.entries.len();
        // the construction shuffle orders the first pass, so the first call
        // starts at the front instead of wrapping
        let mut index = match self.cursor {
            Some(index) => index + 1,
            None => 0,
        };
        loop {
            if index >= len {
                self.reshuffle();
                index = 0;
            }
            if self.entries[index].is_some() {
                break;
            }
            index += 1;
        }
        self.cursor = Some(index);
        self.entries[index].clone()
    }

    /// Tombstones the entry most recently returned by [`next`](Self::next)
    /// and advances to the following live entry.
    pub fn remove_current(&mut self) -> Option<PathBuf> {
        if let Some(index) = self.cursor {
            if self.entries[index].take().is_some() {
                self.remaining -= 1;
            }
        }
        self.next()
    }
}

/// Depth-first scan. Unreadable subdirectories are skipped with a warning;
/// only a failure to read `root` itself aborts the scan.
fn collect_files(root: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let entries =
        fs::read_dir(root).with_context(|| format!("cannot read {}", root.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("cannot read entry in {}", root.display()))?;
        let path = entry.path();
        // stat follows symlinks, like the directory walk this replaces
        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(err) => {
                warn!("skipping {}: {}", path.display(), err);
                continue;
            }
        };
        if metadata.is_dir() {
            if let Err(err) = collect_files(&path, files) {
                warn!("skipping {}: {:#}", path.display(), err);
            }
        } else if metadata.is_file() {
            files.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests;
