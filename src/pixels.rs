// src/pixels.rs

//! Shared pixel buffer types used by the decoder, the compositor and the
//! display backend.
//!
//! All pixels are packed 32-bit XRGB8888 (`0xFFRRGGBB`), matching the format
//! the framebuffers are registered with. Two flavors exist:
//! [`Image`] is a tightly packed, heap-owned buffer produced by the decoder
//! and alive for one loop iteration; [`Surface`] is a borrowed view of a
//! presentation buffer whose stride may exceed its width due to hardware
//! pitch alignment.

/// A packed XRGB8888 pixel.
pub type Xrgb = u32;

/// Fully opaque black, used to clear letterbox margins.
pub const BLACK: Xrgb = 0xff00_0000;

/// Decoded image: tightly packed rows (stride == width).
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    width: usize,
    height: usize,
    data: Vec<Xrgb>,
}

impl Image {
    /// Wraps pre-filled pixel data. Panics if `data` does not hold exactly
    /// `width * height` pixels; the decoder always allocates exactly that.
    pub fn from_pixels(width: usize, height: usize, data: Vec<Xrgb>) -> Self {
        assert_eq!(data.len(), width * height, "pixel count mismatch");
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixels(&self) -> &[Xrgb] {
        &self.data
    }

    /// One tightly packed row.
    pub fn row(&self, y: usize) -> &[Xrgb] {
        let start = y * self.width;
        &self.data[start..start + self.width]
    }
}

/// Mutable view of a presentation buffer.
///
/// `stride` is in pixels and may exceed `width`; the padding tail of each row
/// belongs to the hardware and is never read back.
#[derive(Debug)]
pub struct Surface<'a> {
    width: usize,
    height: usize,
    stride: usize,
    data: &'a mut [Xrgb],
}

impl<'a> Surface<'a> {
    /// Wraps a pixel slice. Panics if the slice cannot hold
    /// `stride * height` pixels or `stride < width`; both are checked when
    /// the framebuffer is created, so this is a programming error.
    pub fn new(width: usize, height: usize, stride: usize, data: &'a mut [Xrgb]) -> Self {
        assert!(stride >= width, "stride smaller than width");
        assert!(data.len() >= stride * height, "backing slice too short");
        Self {
            width,
            height,
            stride,
            data,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Row stride in pixels.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// The visible part of one row (`width` pixels, padding excluded).
    pub fn row_mut(&mut self, y: usize) -> &mut [Xrgb] {
        let start = y * self.stride;
        &mut self.data[start..start + self.width]
    }

    /// Full backing region, stride padding included.
    pub fn raw_mut(&mut self) -> &mut [Xrgb] {
        self.data
    }

    /// Clears whole rows `[y0, y1)`, stride padding included.
    pub fn clear_rows(&mut self, y0: usize, y1: usize) {
        self.data[y0 * self.stride..y1 * self.stride].fill(BLACK);
    }
}
