// src/os/mod.rs

pub mod drm;
