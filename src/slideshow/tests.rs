// src/slideshow/tests.rs

use super::*;
use crate::display::OutputSurface;
use crate::loader::ImageLoader;
use crate::pixels::{Image, Surface, Xrgb};
use crate::playlist::Playlist;
use crate::signal::CancelToken;
use anyhow::{bail, Result};
use std::cell::RefCell;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use test_log::test;

const NO_DELAY: Duration = Duration::ZERO;

fn cancelled_token() -> CancelToken {
    static FLAG: AtomicBool = AtomicBool::new(true);
    CancelToken::from_flag(&FLAG)
}

/// Token backed by a leaked flag so each test gets its own.
fn fresh_token() -> (CancelToken, &'static AtomicBool) {
    let flag: &'static AtomicBool = Box::leak(Box::new(AtomicBool::new(false)));
    (CancelToken::from_flag(flag), flag)
}

/// In-memory output: records presented frames.
struct TestOutput {
    width: usize,
    height: usize,
    data: Vec<Xrgb>,
    presented: Vec<Vec<Xrgb>>,
}

impl TestOutput {
    fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
            presented: Vec::new(),
        }
    }
}

impl OutputSurface for TestOutput {
    fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn draw_target(&mut self) -> Surface<'_> {
        Surface::new(self.width, self.height, self.width, &mut self.data)
    }

    fn present(&mut self) {
        self.presented.push(self.data.clone());
    }
}

/// Loader scripted by file name: `bad*` fails, anything else decodes to a
/// solid image. Optionally trips a cancel flag after a number of loads.
struct TestLoader {
    width: usize,
    height: usize,
    loads: RefCell<Vec<PathBuf>>,
    cancel_after: Option<(usize, &'static AtomicBool)>,
}

impl TestLoader {
    fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            loads: RefCell::new(Vec::new()),
            cancel_after: None,
        }
    }
}

impl ImageLoader for TestLoader {
    fn load(&self, path: &Path) -> Result<Image> {
        self.loads.borrow_mut().push(path.to_path_buf());
        if let Some((after, flag)) = self.cancel_after {
            if self.loads.borrow().len() >= after {
                flag.store(true, Ordering::SeqCst);
            }
        }
        let name = path.file_name().unwrap().to_string_lossy();
        if name.starts_with("bad") {
            bail!("not a decodable image");
        }
        Ok(Image::from_pixels(
            self.width,
            self.height,
            vec![0xffaa_bbcc; self.width * self.height],
        ))
    }
}

/// Temp directory playlist fixture.
fn playlist_with(name: &str, files: &[&str]) -> (Playlist, PathBuf) {
    let root = std::env::temp_dir().join(format!("sshow-loop-{}-{}", name, std::process::id()));
    let _ = fs::remove_dir_all(&root);
    fs::create_dir_all(&root).unwrap();
    for file in files {
        File::create(root.join(file)).unwrap();
    }
    (Playlist::scan(&root).unwrap(), root)
}

#[test]
fn pre_cancelled_token_stops_before_presenting() {
    let (mut playlist, root) = playlist_with("precancel", &["a.jpg"]);
    let loader = TestLoader::new(4, 4);
    let mut output = TestOutput::new(4, 4);

    let reason = run(&mut playlist, &loader, &mut output, cancelled_token(), NO_DELAY);

    let _ = fs::remove_dir_all(&root);
    assert_eq!(reason, StopReason::Cancelled);
    assert!(output.presented.is_empty());
    assert!(loader.loads.borrow().is_empty());
}

#[test]
fn corrupt_entry_is_removed_and_next_entry_presented() {
    let (mut playlist, root) = playlist_with("skip", &["bad.jpg", "good.jpg"]);
    let (token, flag) = fresh_token();
    let mut loader = TestLoader::new(4, 4);
    loader.cancel_after = Some((3, flag));
    let mut output = TestOutput::new(4, 4);

    let reason = run(&mut playlist, &loader, &mut output, token, NO_DELAY);

    let _ = fs::remove_dir_all(&root);
    assert_eq!(reason, StopReason::Cancelled);
    // every presented frame is the good image, never garbage from a skip
    assert!(!output.presented.is_empty());
    for frame in &output.presented {
        assert!(frame.iter().all(|&px| px == 0xffaa_bbcc));
    }
    // the bad path was tombstoned: only the good one redisplays once the
    // playlist cycles
    assert_eq!(playlist.remaining(), 1);
}

#[test]
fn exhausting_the_playlist_is_reported_as_failure() {
    let (mut playlist, root) = playlist_with("exhaust", &["bad1.jpg", "bad2.jpg"]);
    let (token, _flag) = fresh_token();
    let loader = TestLoader::new(4, 4);
    let mut output = TestOutput::new(4, 4);

    let reason = run(&mut playlist, &loader, &mut output, token, NO_DELAY);

    let _ = fs::remove_dir_all(&root);
    assert_eq!(reason, StopReason::Exhausted);
    assert!(output.presented.is_empty());
    assert_eq!(playlist.remaining(), 0);
}

#[test]
fn cancellation_is_observed_between_iterations() {
    let (mut playlist, root) = playlist_with("cancel", &["a.jpg"]);
    let (token, flag) = fresh_token();
    let mut loader = TestLoader::new(4, 4);
    // flag trips during the first load; the frame still completes
    loader.cancel_after = Some((1, flag));
    let mut output = TestOutput::new(4, 4);

    let reason = run(&mut playlist, &loader, &mut output, token, NO_DELAY);

    let _ = fs::remove_dir_all(&root);
    assert_eq!(reason, StopReason::Cancelled);
    assert_eq!(output.presented.len(), 1);
}

#[test]
fn equal_size_image_is_copied_verbatim() {
    let (mut playlist, root) = playlist_with("copy", &["a.jpg"]);
    let (token, flag) = fresh_token();
    let mut loader = TestLoader::new(6, 5);
    loader.cancel_after = Some((1, flag));
    let mut output = TestOutput::new(6, 5);

    run(&mut playlist, &loader, &mut output, token, NO_DELAY);

    let _ = fs::remove_dir_all(&root);
    assert_eq!(output.presented.len(), 1);
    assert_eq!(output.presented[0], vec![0xffaa_bbcc; 6 * 5]);
}

#[test]
fn wait_returns_early_when_token_trips() {
    let (token, flag) = fresh_token();
    flag.store(true, Ordering::SeqCst);
    let start = std::time::Instant::now();
    wait(token, Duration::from_secs(30));
    assert!(start.elapsed() < Duration::from_secs(1));
}
