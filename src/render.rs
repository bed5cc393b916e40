// src/render.rs

//! CPU compositor: places a decoded image into a presentation buffer.
//!
//! Two paths exist. When source and destination have identical dimensions the
//! image is copied row by row (or in one operation when the strides match).
//! Otherwise the image is scaled by the uniform factor
//! `min(dst_w / src_w, dst_h / src_h)`, centered, and the uncovered margins
//! are cleared to opaque black. Sampling is nearest-neighbor; pixels are
//! copied verbatim, color conversion already happened at decode time.

use crate::pixels::{Image, Surface, BLACK};
use std::fmt;

/// Compositing precondition violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeError {
    /// Source or destination has a zero dimension.
    InvalidDimensions,
}

impl fmt::Display for CompositeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDimensions => write!(f, "source or destination has a zero dimension"),
        }
    }
}

impl std::error::Error for CompositeError {}

/// Writes `src` into `dst`, copying 1:1 on equal dimensions and scaling with
/// letterboxing otherwise.
pub fn composite(src: &Image, dst: &mut Surface<'_>) -> Result<(), CompositeError> {
    if src.width() == 0 || src.height() == 0 || dst.width() == 0 || dst.height() == 0 {
        return Err(CompositeError::InvalidDimensions);
    }

    if src.width() == dst.width() && src.height() == dst.height() {
        copy_image(src, dst);
    } else {
        scale_image(src, dst);
    }
    Ok(())
}

/// Direct copy, dimensions already known to match.
fn copy_image(src: &Image, dst: &mut Surface<'_>) {
    if src.width() == dst.stride() {
        let len = src.height() * src.width();
        dst.raw_mut()[..len].copy_from_slice(src.pixels());
    } else {
        for y in 0..dst.height() {
            dst.row_mut(y).copy_from_slice(src.row(y));
        }
    }
}

/// Uniform-scale centered blit with letterbox/pillarbox margins.
fn scale_image(src: &Image, dst: &mut Surface<'_>) {
    let scale_w = dst.width() as f32 / src.width() as f32;
    let scale_h = dst.height() as f32 / src.height() as f32;
    let scale = scale_w.min(scale_h);

    let dst_w = (src.width() as f32 * scale) as usize;
    let dst_h = (src.height() as f32 * scale) as usize;
    let dst_x1 = dst.width() / 2 - dst_w / 2;
    let dst_y1 = dst.height() / 2 - dst_h / 2;
    let dst_x2 = dst_x1 + dst_w;
    let dst_y2 = dst_y1 + dst_h;

    // Top and bottom margins: full rows, stride padding included. Together
    // with the per-row side clears below this covers every corner region.
    dst.clear_rows(0, dst_y1);
    dst.clear_rows(dst_y2, dst.height());

    // Column back-mapping is row-independent, compute it once.
    let src_cols: Vec<usize> = (0..dst_w)
        .map(|x| (((x as f32) / scale) as usize).min(src.width() - 1))
        .collect();

    for y in dst_y1..dst_y2 {
        let src_y = (((y - dst_y1) as f32) / scale) as usize;
        let src_row = src.row(src_y.min(src.height() - 1));
        let dst_width = dst.width();
        let row = dst.row_mut(y);

        row[..dst_x1].fill(BLACK);
        row[dst_x2..dst_width].fill(BLACK);

        for (x, &src_x) in src_cols.iter().enumerate() {
            row[dst_x1 + x] = src_row[src_x];
        }
    }
}
