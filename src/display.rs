// src/display.rs

//! Output surface manager: owns the DRM device, two memory-mapped
//! framebuffers and the saved pre-session CRTC state.
//!
//! The session is double-buffered: [`OutputSurface::draw_target`] hands out
//! the buffer that is not being scanned out, [`OutputSurface::present`]
//! queues a page flip to it and swaps the internal index. Presents are
//! fire-and-forget; a rejected flip is logged and the next present retries.
//!
//! Every resource acquired during [`DrmDisplay::open`] is either held by a
//! value with a releasing `Drop` or covered by a disarm-on-success guard, so
//! a failure at any setup step unwinds everything acquired so far in reverse
//! order. Final teardown runs in field order: restore the saved CRTC, release
//! both framebuffers, close the device.

use crate::os::drm::{Card, Crtc, ModeInfo};
use crate::pixels::{Surface, Xrgb};
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::fmt;
use std::os::fd::AsRawFd;
use std::path::Path;
use std::rc::Rc;

/// Device nodes probed in order; the first one with dumb-buffer support wins.
const CARD_PATHS: [&str; 2] = ["/dev/dri/card0", "/dev/dri/card1"];

/// Unrecoverable display setup failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupError {
    /// No probed device node supports dumb buffers.
    NoDeviceFound,
    /// No connected connector with a mode and a live encoder/CRTC pairing.
    NoConnectorFound,
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoDeviceFound => write!(f, "no compatible DRM device found"),
            Self::NoConnectorFound => write!(f, "no usable connector found"),
        }
    }
}

impl std::error::Error for SetupError {}

/// Seam between the presentation loop and the display hardware.
pub trait OutputSurface {
    /// Output dimensions in pixels, fixed for the session.
    fn size(&self) -> (usize, usize);
    /// The buffer the caller should draw the next frame into. Repeated calls
    /// without an intervening `present` return the same buffer.
    fn draw_target(&mut self) -> Surface<'_>;
    /// Makes the most recently drawn buffer visible.
    fn present(&mut self);
}

/// One hardware-backed presentation buffer: a dumb buffer registered as a
/// framebuffer and mapped for CPU writes.
struct FrameBuffer {
    card: Rc<Card>,
    fb_id: u32,
    handle: u32,
    map: *mut u8,
    size: usize,
    width: usize,
    height: usize,
    /// Row stride in pixels (hardware pitch / 4).
    stride: usize,
}

/// Releases a dumb buffer handle unless disarmed.
struct DumbGuard<'a> {
    card: &'a Card,
    handle: u32,
}

impl DumbGuard<'_> {
    fn disarm(&mut self) {
        self.handle = 0;
    }
}

impl Drop for DumbGuard<'_> {
    fn drop(&mut self) {
        if self.handle != 0 {
            if let Err(err) = self.card.destroy_dumb(self.handle) {
                warn!("rollback: {err:#}");
            }
        }
    }
}

/// Unregisters a framebuffer id unless disarmed.
struct FbIdGuard<'a> {
    card: &'a Card,
    fb_id: u32,
}

impl FbIdGuard<'_> {
    fn disarm(&mut self) {
        self.fb_id = 0;
    }
}

impl Drop for FbIdGuard<'_> {
    fn drop(&mut self) {
        if self.fb_id != 0 {
            if let Err(err) = self.card.remove_framebuffer(self.fb_id) {
                warn!("rollback: {err:#}");
            }
        }
    }
}

impl FrameBuffer {
    fn create(card: &Rc<Card>, width: usize, height: usize) -> Result<Self> {
        let dumb = card.create_dumb(width as u32, height as u32)?;
        let mut dumb_guard = DumbGuard {
            card,
            handle: dumb.handle,
        };

        anyhow::ensure!(
            dumb.pitch as usize >= width * 4 && dumb.pitch % 4 == 0,
            "unusable pitch {} for width {}",
            dumb.pitch,
            width
        );

        let fb_id = card.add_framebuffer(width as u32, height as u32, dumb.pitch, dumb.handle)?;
        let mut fb_guard = FbIdGuard { card, fb_id };

        let offset = card.map_dumb(dumb.handle)?;
        // Safety: offset comes from DRM_IOCTL_MODE_MAP_DUMB for this fd and
        // the mapping spans exactly the buffer the kernel allocated.
        let map = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                dumb.size as usize,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                card.as_raw_fd(),
                offset as libc::off_t,
            )
        };
        if map == libc::MAP_FAILED {
            return Err(std::io::Error::last_os_error())
                .with_context(|| format!("cannot mmap {}-byte framebuffer", dumb.size));
        }

        fb_guard.disarm();
        dumb_guard.disarm();
        debug!(
            "framebuffer {}: {}x{}, pitch {} bytes, {} bytes mapped",
            fb_id, width, height, dumb.pitch, dumb.size
        );
        Ok(Self {
            card: Rc::clone(card),
            fb_id,
            handle: dumb.handle,
            map: map.cast(),
            size: dumb.size as usize,
            width,
            height,
            stride: dumb.pitch as usize / 4,
        })
    }

    fn surface(&mut self) -> Surface<'_> {
        // Safety: the mapping is private to this FrameBuffer, page-aligned
        // (so u32-aligned) and self.size bytes long.
        let pixels =
            unsafe { std::slice::from_raw_parts_mut(self.map.cast::<Xrgb>(), self.size / 4) };
        Surface::new(self.width, self.height, self.stride, pixels)
    }
}

impl Drop for FrameBuffer {
    fn drop(&mut self) {
        if let Err(err) = self.card.remove_framebuffer(self.fb_id) {
            warn!("teardown: {err:#}");
        }
        if let Err(err) = self.card.destroy_dumb(self.handle) {
            warn!("teardown: {err:#}");
        }
        // Safety: map/size came from the mmap in create().
        unsafe {
            libc::munmap(self.map.cast(), self.size);
        }
    }
}

/// Tracks which of the two buffers is the draw target; the other one is on
/// screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SwapState {
    draw: usize,
}

impl SwapState {
    /// Buffer 0 is bound by the initial modeset, so drawing starts on 1.
    fn new() -> Self {
        Self { draw: 1 }
    }

    /// Index of the buffer to draw into. Stable until the next flip.
    fn draw_index(&self) -> usize {
        self.draw
    }

    /// The drawn buffer goes on screen; the displaced one becomes the target.
    fn flip(&mut self) {
        self.draw = 1 - self.draw;
    }
}

/// CRTC state captured before the modeset, restored on drop (best effort).
struct SavedCrtc {
    card: Rc<Card>,
    state: Crtc,
    conn_id: u32,
}

impl Drop for SavedCrtc {
    fn drop(&mut self) {
        let mode = (self.state.mode_valid != 0).then_some(&self.state.mode);
        if let Err(err) = self.card.set_crtc(
            self.state.crtc_id,
            self.state.fb_id,
            self.state.x,
            self.state.y,
            self.conn_id,
            mode,
        ) {
            warn!("cannot restore previous CRTC state: {err:#}");
        }
    }
}

/// The live display session.
///
/// Field order is teardown order: saved state first, then the buffers, then
/// the card (its fd closes once the buffers have dropped their references).
pub struct DrmDisplay {
    saved: Option<SavedCrtc>,
    buffers: [FrameBuffer; 2],
    swap: SwapState,
    crtc_id: u32,
    mode: ModeInfo,
    card: Rc<Card>,
}

impl DrmDisplay {
    /// Probes the card list, picks a connector, allocates both framebuffers,
    /// saves the current CRTC and modesets onto buffer 0. Any failure
    /// unwinds everything acquired up to that point.
    pub fn open() -> Result<Self> {
        let card = probe_card()?;
        let (conn_id, crtc_id, mode) = find_connector(&card)?;
        info!(
            "using mode {}x{}@{} on connector {}",
            mode.hdisplay, mode.vdisplay, mode.vrefresh, conn_id
        );

        let card = Rc::new(card);
        let width = mode.hdisplay as usize;
        let height = mode.vdisplay as usize;
        let buffers = [
            FrameBuffer::create(&card, width, height).context("cannot create framebuffer 0")?,
            FrameBuffer::create(&card, width, height).context("cannot create framebuffer 1")?,
        ];

        // Failure to snapshot the old state only costs us the restore.
        let saved = match card.crtc(crtc_id) {
            Ok(state) => Some(SavedCrtc {
                card: Rc::clone(&card),
                state,
                conn_id,
            }),
            Err(err) => {
                warn!("cannot save current CRTC state: {err:#}");
                None
            }
        };

        card.set_crtc(crtc_id, buffers[0].fb_id, 0, 0, conn_id, Some(&mode))
            .context("modeset failed")?;

        Ok(Self {
            saved,
            buffers,
            swap: SwapState::new(),
            crtc_id,
            mode,
            card,
        })
    }
}

impl OutputSurface for DrmDisplay {
    fn size(&self) -> (usize, usize) {
        (self.mode.hdisplay as usize, self.mode.vdisplay as usize)
    }

    fn draw_target(&mut self) -> Surface<'_> {
        self.buffers[self.swap.draw_index()].surface()
    }

    fn present(&mut self) {
        let fb_id = self.buffers[self.swap.draw_index()].fb_id;
        if let Err(err) = self.card.page_flip(self.crtc_id, fb_id) {
            // not fatal: the next present retries against the same state
            warn!("page flip rejected: {err:#}");
        }
        self.swap.flip();
    }
}

fn probe_card() -> Result<Card> {
    for path in CARD_PATHS {
        let card = match Card::open(Path::new(path)) {
            Ok(card) => card,
            Err(err) => {
                debug!("{path}: {err:#}");
                continue;
            }
        };
        match card.supports_dumb_buffers() {
            Ok(true) => {
                info!("using {path}");
                return Ok(card);
            }
            Ok(false) => debug!("{path}: no dumb buffer support"),
            Err(err) => debug!("{path}: {err:#}"),
        }
    }
    Err(SetupError::NoDeviceFound.into())
}

/// First connected connector with at least one mode and an encoder that has
/// a live CRTC. The first mode is the connector's preferred one.
fn find_connector(card: &Card) -> Result<(u32, u32, ModeInfo)> {
    for conn_id in card.connector_ids()? {
        let conn = match card.connector(conn_id) {
            Ok(conn) => conn,
            Err(err) => {
                debug!("connector {conn_id}: {err:#}");
                continue;
            }
        };
        if !conn.connected || conn.modes.is_empty() {
            continue;
        }
        for &enc_id in &conn.encoders {
            let enc = match card.encoder(enc_id) {
                Ok(enc) => enc,
                Err(err) => {
                    debug!("encoder {enc_id}: {err:#}");
                    continue;
                }
            };
            if enc.crtc_id != 0 {
                return Ok((conn_id, enc.crtc_id, conn.modes[0]));
            }
        }
    }
    Err(SetupError::NoConnectorFound.into())
}
