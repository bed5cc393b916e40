// src/playlist/tests.rs

use super::*;
use std::collections::HashSet;
use std::fs::{self, File};
use std::path::PathBuf;
use test_log::test;

/// Temp directory torn down on drop.
struct TempTree {
    root: PathBuf,
}

impl TempTree {
    fn new(name: &str, files: &[&str]) -> Self {
        let root = std::env::temp_dir().join(format!(
            "sshow-playlist-{}-{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&root);
        for file in files {
            let path = root.join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            File::create(&path).unwrap();
        }
        if files.is_empty() {
            fs::create_dir_all(&root).unwrap();
        }
        Self { root }
    }
}

impl Drop for TempTree {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

#[test]
fn scan_of_empty_directory_fails() {
    let tree = TempTree::new("empty", &[]);
    assert!(Playlist::scan(&tree.root).is_err());
}

#[test]
fn scan_of_missing_directory_fails() {
    let tree = TempTree::new("missing", &[]);
    assert!(Playlist::scan(&tree.root.join("nope")).is_err());
}

#[test]
fn scan_recurses_into_subdirectories() {
    let tree = TempTree::new("recurse", &["a.jpg", "sub/b.jpg", "sub/deeper/c.jpg"]);
    let playlist = Playlist::scan(&tree.root).unwrap();
    assert_eq!(playlist.remaining(), 3);
}

#[test]
fn one_pass_visits_each_path_exactly_once() {
    let names: Vec<String> = (0..16).map(|i| format!("img{i}.jpg")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let tree = TempTree::new("pass", &refs);
    let mut playlist = Playlist::scan(&tree.root).unwrap();

    let visited: HashSet<PathBuf> = (0..names.len())
        .map(|_| playlist.next().expect("playlist ended early"))
        .collect();
    assert_eq!(visited.len(), names.len());
}

#[test]
fn first_pass_follows_the_construction_shuffle() {
    let names: Vec<String> = (0..12).map(|i| format!("img{i}.jpg")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let tree = TempTree::new("order", &refs);
    let mut playlist = Playlist::scan(&tree.root).unwrap();

    // the order scan() shuffled into is exactly what the first pass yields
    let stored: Vec<PathBuf> = playlist
        .entries
        .iter()
        .map(|entry| entry.clone().unwrap())
        .collect();
    let visited: Vec<PathBuf> = (0..names.len())
        .map(|_| playlist.next().expect("playlist ended early"))
        .collect();
    assert_eq!(visited, stored);
}

#[test]
fn wraparound_restarts_the_cycle() {
    let tree = TempTree::new("wrap", &["a.jpg", "b.jpg", "c.jpg"]);
    let mut playlist = Playlist::scan(&tree.root).unwrap();
    let first_pass: HashSet<PathBuf> = (0..3).map(|_| playlist.next().unwrap()).collect();
    let second_pass: HashSet<PathBuf> = (0..3).map(|_| playlist.next().unwrap()).collect();
    assert_eq!(first_pass, second_pass);
}

#[test]
fn removal_tombstones_paths_permanently() {
    let names: Vec<String> = (0..8).map(|i| format!("img{i}.jpg")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let tree = TempTree::new("remove", &refs);
    let mut playlist = Playlist::scan(&tree.root).unwrap();

    playlist.next().unwrap();
    let mut removed = Vec::new();
    for _ in 0..3 {
        removed.push(playlist.entries[playlist.cursor.unwrap()].clone().unwrap());
        playlist.remove_current().unwrap();
    }
    assert_eq!(playlist.remaining(), 5);

    // two full passes never hand back a removed path
    for _ in 0..10 {
        let path = playlist.next().unwrap();
        assert!(!removed.contains(&path), "{} came back", path.display());
    }
}

#[test]
fn removing_every_path_exhausts_the_playlist() {
    let tree = TempTree::new("exhaust", &["a.jpg", "b.jpg"]);
    let mut playlist = Playlist::scan(&tree.root).unwrap();
    assert!(playlist.next().is_some());
    assert!(playlist.remove_current().is_some());
    assert!(playlist.remove_current().is_none());
    assert_eq!(playlist.remaining(), 0);
    assert!(playlist.next().is_none());
}
