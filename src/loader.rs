// src/loader.rs

//! Image Source boundary: turns a file path into a packed XRGB image.
//!
//! Decoding is delegated to the `image` crate; grayscale and RGB inputs are
//! both normalized to 32-bit XRGB with full opacity. A failed decode returns
//! an error and never a partial buffer.

use crate::pixels::{Image, Xrgb};
use anyhow::{Context, Result};
use image::ImageReader;
use std::path::Path;

/// Seam between the presentation loop and the decoder.
pub trait ImageLoader {
    fn load(&self, path: &Path) -> Result<Image>;
}

/// JPEG decoder backed by the `image` crate.
#[derive(Debug, Default)]
pub struct JpegLoader;

impl ImageLoader for JpegLoader {
    fn load(&self, path: &Path) -> Result<Image> {
        let reader = ImageReader::open(path)
            .with_context(|| format!("cannot open {}", path.display()))?
            .with_guessed_format()
            .with_context(|| format!("cannot probe {}", path.display()))?;
        let decoded = reader
            .decode()
            .with_context(|| format!("cannot decode {}", path.display()))?;

        // to_rgb8 also expands grayscale, so every input ends up packed the
        // same way
        let rgb = decoded.into_rgb8();
        let (width, height) = rgb.dimensions();
        let pixels: Vec<Xrgb> = rgb
            .pixels()
            .map(|px| {
                let [r, g, b] = px.0;
                0xff00_0000 | (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b)
            })
            .collect();
        Ok(Image::from_pixels(width as usize, height as usize, pixels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::jpeg::JpegEncoder;
    use image::{ExtendedColorType, ImageEncoder};
    use std::fs::{self, File};
    use std::path::PathBuf;
    use test_log::test;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("sshow-loader-{}-{}", name, std::process::id()))
    }

    fn write_jpeg(path: &Path, width: u32, height: u32, color: ExtendedColorType, data: &[u8]) {
        let file = File::create(path).unwrap();
        JpegEncoder::new_with_quality(file, 90)
            .write_image(data, width, height, color)
            .unwrap();
    }

    #[test]
    fn decodes_rgb_jpeg_to_opaque_xrgb() {
        let path = temp_path("rgb.jpg");
        let data: Vec<u8> = (0..16 * 8).flat_map(|_| [200u8, 40, 40]).collect();
        write_jpeg(&path, 16, 8, ExtendedColorType::Rgb8, &data);

        let img = JpegLoader.load(&path).unwrap();
        let _ = fs::remove_file(&path);

        assert_eq!((img.width(), img.height()), (16, 8));
        assert!(img.pixels().iter().all(|px| px >> 24 == 0xff));
    }

    #[test]
    fn normalizes_grayscale_to_packed_xrgb() {
        let path = temp_path("gray.jpg");
        let data = vec![128u8; 8 * 8];
        write_jpeg(&path, 8, 8, ExtendedColorType::L8, &data);

        let img = JpegLoader.load(&path).unwrap();
        let _ = fs::remove_file(&path);

        assert_eq!((img.width(), img.height()), (8, 8));
        for &px in img.pixels() {
            let (r, g, b) = ((px >> 16) & 0xff, (px >> 8) & 0xff, px & 0xff);
            assert_eq!(px >> 24, 0xff);
            assert_eq!(r, g);
            assert_eq!(g, b);
        }
    }

    #[test]
    fn rejects_non_image_file() {
        let path = temp_path("garbage.jpg");
        fs::write(&path, b"definitely not a jpeg").unwrap();
        let result = JpegLoader.load(&path);
        let _ = fs::remove_file(&path);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_missing_file() {
        assert!(JpegLoader.load(Path::new("/nonexistent/img.jpg")).is_err());
    }
}
