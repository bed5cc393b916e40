// src/os/drm.rs

//! Raw DRM/KMS access for dumb-buffer modesetting.
//!
//! This module mirrors the kernel ABI directly: `#[repr(C)]` structs from
//! `drm_mode.h`, ioctl numbers defined via `nix::ioctl_readwrite!`, and a
//! thin [`Card`] wrapper that owns the device file descriptor. Only the
//! subset needed for a CPU-rendered single-output session is covered:
//! capability query, connector/encoder enumeration, dumb buffer management,
//! framebuffer registration, CRTC get/set and page flips.

use anyhow::{Context, Result};
use log::trace;
use std::fs::{File, OpenOptions};
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::Path;

/// `DRM_CAP_DUMB_BUFFER`: device supports CPU-writable dumb buffers.
pub const CAP_DUMB_BUFFER: u64 = 0x1;

/// `DRM_MODE_CONNECTED` in `drm_mode_get_connector.connection`.
const CONNECTOR_STATUS_CONNECTED: u32 = 1;

/// fourcc `XR24`: 32-bit packed XRGB, 8 bits per channel, padding byte high.
pub const FORMAT_XRGB8888: u32 = 0x3432_5258;

// Kernel ABI structs (drm_mode.h). Field order and widths must not change.

/// `struct drm_mode_modeinfo`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct ModeInfo {
    pub clock: u32,
    pub hdisplay: u16,
    pub hsync_start: u16,
    pub hsync_end: u16,
    pub htotal: u16,
    pub hskew: u16,
    pub vdisplay: u16,
    pub vsync_start: u16,
    pub vsync_end: u16,
    pub vtotal: u16,
    pub vscan: u16,
    pub vrefresh: u32,
    pub flags: u32,
    pub mode_type: u32,
    pub name: [u8; 32],
}

/// `struct drm_mode_card_res`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
struct CardRes {
    fb_id_ptr: u64,
    crtc_id_ptr: u64,
    connector_id_ptr: u64,
    encoder_id_ptr: u64,
    count_fbs: u32,
    count_crtcs: u32,
    count_connectors: u32,
    count_encoders: u32,
    min_width: u32,
    max_width: u32,
    min_height: u32,
    max_height: u32,
}

/// `struct drm_mode_get_connector`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
struct GetConnector {
    encoders_ptr: u64,
    modes_ptr: u64,
    props_ptr: u64,
    prop_values_ptr: u64,
    count_modes: u32,
    count_props: u32,
    count_encoders: u32,
    encoder_id: u32,
    connector_id: u32,
    connector_type: u32,
    connector_type_id: u32,
    connection: u32,
    mm_width: u32,
    mm_height: u32,
    subpixel: u32,
    pad: u32,
}

/// `struct drm_mode_get_encoder`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct GetEncoder {
    pub encoder_id: u32,
    pub encoder_type: u32,
    pub crtc_id: u32,
    pub possible_crtcs: u32,
    pub possible_clones: u32,
}

/// `struct drm_mode_crtc`. Doubles as the saved-state record for restoring
/// the display on shutdown.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Crtc {
    pub set_connectors_ptr: u64,
    pub count_connectors: u32,
    pub crtc_id: u32,
    pub fb_id: u32,
    pub x: u32,
    pub y: u32,
    pub gamma_size: u32,
    pub mode_valid: u32,
    pub mode: ModeInfo,
}

/// `struct drm_mode_fb_cmd2`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
struct FbCmd2 {
    fb_id: u32,
    width: u32,
    height: u32,
    pixel_format: u32,
    flags: u32,
    handles: [u32; 4],
    pitches: [u32; 4],
    offsets: [u32; 4],
    modifier: [u64; 4],
}

/// `struct drm_mode_create_dumb`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateDumb {
    pub height: u32,
    pub width: u32,
    pub bpp: u32,
    pub flags: u32,
    pub handle: u32,
    pub pitch: u32,
    pub size: u64,
}

/// `struct drm_mode_map_dumb`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
struct MapDumb {
    handle: u32,
    pad: u32,
    offset: u64,
}

/// `struct drm_mode_destroy_dumb`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
struct DestroyDumb {
    handle: u32,
}

/// `struct drm_mode_crtc_page_flip`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
struct CrtcPageFlip {
    crtc_id: u32,
    fb_id: u32,
    flags: u32,
    reserved: u32,
    user_data: u64,
}

/// `struct drm_get_cap`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
struct GetCap {
    capability: u64,
    value: u64,
}

const DRM_IOCTL_MAGIC: u8 = b'd';

nix::ioctl_readwrite!(ioctl_get_cap, DRM_IOCTL_MAGIC, 0x0c, GetCap);
nix::ioctl_readwrite!(ioctl_mode_get_resources, DRM_IOCTL_MAGIC, 0xa0, CardRes);
nix::ioctl_readwrite!(ioctl_mode_get_crtc, DRM_IOCTL_MAGIC, 0xa1, Crtc);
nix::ioctl_readwrite!(ioctl_mode_set_crtc, DRM_IOCTL_MAGIC, 0xa2, Crtc);
nix::ioctl_readwrite!(ioctl_mode_get_encoder, DRM_IOCTL_MAGIC, 0xa6, GetEncoder);
nix::ioctl_readwrite!(ioctl_mode_get_connector, DRM_IOCTL_MAGIC, 0xa7, GetConnector);
nix::ioctl_readwrite!(ioctl_mode_rm_fb, DRM_IOCTL_MAGIC, 0xaf, libc::c_uint);
nix::ioctl_readwrite!(ioctl_mode_page_flip, DRM_IOCTL_MAGIC, 0xb0, CrtcPageFlip);
nix::ioctl_readwrite!(ioctl_mode_create_dumb, DRM_IOCTL_MAGIC, 0xb2, CreateDumb);
nix::ioctl_readwrite!(ioctl_mode_map_dumb, DRM_IOCTL_MAGIC, 0xb3, MapDumb);
nix::ioctl_readwrite!(ioctl_mode_destroy_dumb, DRM_IOCTL_MAGIC, 0xb4, DestroyDumb);
nix::ioctl_readwrite!(ioctl_mode_add_fb2, DRM_IOCTL_MAGIC, 0xb8, FbCmd2);

/// Connector snapshot produced by [`Card::connector`].
#[derive(Debug)]
pub struct ConnectorInfo {
    pub id: u32,
    pub connected: bool,
    pub modes: Vec<ModeInfo>,
    pub encoders: Vec<u32>,
}

/// An open DRM device node. Closes the fd on drop.
#[derive(Debug)]
pub struct Card {
    file: File,
}

impl Card {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("cannot open {}", path.display()))?;
        Ok(Self { file })
    }

    fn fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }

    /// Queries `DRM_CAP_DUMB_BUFFER`.
    pub fn supports_dumb_buffers(&self) -> Result<bool> {
        let mut cap = GetCap {
            capability: CAP_DUMB_BUFFER,
            ..Default::default()
        };
        unsafe { ioctl_get_cap(self.fd(), &mut cap) }
            .context("DRM_IOCTL_GET_CAP failed")?;
        Ok(cap.value != 0)
    }

    /// Lists connector ids. The kernel reports array sizes first and fills
    /// caller-provided arrays on a second call; retry if a hotplug grew the
    /// list in between.
    pub fn connector_ids(&self) -> Result<Vec<u32>> {
        loop {
            let mut probe = CardRes::default();
            unsafe { ioctl_mode_get_resources(self.fd(), &mut probe) }
                .context("DRM_IOCTL_MODE_GETRESOURCES failed")?;

            let mut ids = vec![0u32; probe.count_connectors as usize];
            let mut res = CardRes {
                connector_id_ptr: ids.as_mut_ptr() as u64,
                count_connectors: probe.count_connectors,
                ..Default::default()
            };
            unsafe { ioctl_mode_get_resources(self.fd(), &mut res) }
                .context("DRM_IOCTL_MODE_GETRESOURCES failed")?;
            if res.count_connectors <= probe.count_connectors {
                ids.truncate(res.count_connectors as usize);
                return Ok(ids);
            }
        }
    }

    /// Fetches connection state, modes and encoder ids of one connector.
    pub fn connector(&self, id: u32) -> Result<ConnectorInfo> {
        loop {
            let mut probe = GetConnector {
                connector_id: id,
                ..Default::default()
            };
            unsafe { ioctl_mode_get_connector(self.fd(), &mut probe) }
                .with_context(|| format!("cannot query connector {id}"))?;

            let mut modes = vec![ModeInfo::default(); probe.count_modes as usize];
            let mut encoders = vec![0u32; probe.count_encoders as usize];
            let mut conn = GetConnector {
                connector_id: id,
                modes_ptr: modes.as_mut_ptr() as u64,
                count_modes: probe.count_modes,
                encoders_ptr: encoders.as_mut_ptr() as u64,
                count_encoders: probe.count_encoders,
                ..Default::default()
            };
            unsafe { ioctl_mode_get_connector(self.fd(), &mut conn) }
                .with_context(|| format!("cannot query connector {id}"))?;

            if conn.count_modes <= probe.count_modes
                && conn.count_encoders <= probe.count_encoders
            {
                modes.truncate(conn.count_modes as usize);
                encoders.truncate(conn.count_encoders as usize);
                return Ok(ConnectorInfo {
                    id,
                    connected: conn.connection == CONNECTOR_STATUS_CONNECTED,
                    modes,
                    encoders,
                });
            }
        }
    }

    pub fn encoder(&self, id: u32) -> Result<GetEncoder> {
        let mut enc = GetEncoder {
            encoder_id: id,
            ..Default::default()
        };
        unsafe { ioctl_mode_get_encoder(self.fd(), &mut enc) }
            .with_context(|| format!("cannot query encoder {id}"))?;
        Ok(enc)
    }

    /// Reads the current CRTC configuration, for restoring it later.
    pub fn crtc(&self, crtc_id: u32) -> Result<Crtc> {
        let mut crtc = Crtc {
            crtc_id,
            ..Default::default()
        };
        unsafe { ioctl_mode_get_crtc(self.fd(), &mut crtc) }
            .with_context(|| format!("cannot query CRTC {crtc_id}"))?;
        Ok(crtc)
    }

    /// Binds `fb_id` (and `mode`, when given) to a CRTC driving `conn_id`.
    pub fn set_crtc(
        &self,
        crtc_id: u32,
        fb_id: u32,
        x: u32,
        y: u32,
        conn_id: u32,
        mode: Option<&ModeInfo>,
    ) -> Result<()> {
        let mut conn = conn_id;
        let mut req = Crtc {
            set_connectors_ptr: &mut conn as *mut u32 as u64,
            count_connectors: 1,
            crtc_id,
            fb_id,
            x,
            y,
            mode_valid: mode.is_some() as u32,
            mode: mode.copied().unwrap_or_default(),
            ..Default::default()
        };
        unsafe { ioctl_mode_set_crtc(self.fd(), &mut req) }
            .with_context(|| format!("cannot set CRTC {crtc_id} to fb {fb_id}"))?;
        trace!("set CRTC {} to fb {}", crtc_id, fb_id);
        Ok(())
    }

    /// Allocates a CPU-writable dumb buffer (32 bpp).
    pub fn create_dumb(&self, width: u32, height: u32) -> Result<CreateDumb> {
        let mut dumb = CreateDumb {
            width,
            height,
            bpp: 32,
            ..Default::default()
        };
        unsafe { ioctl_mode_create_dumb(self.fd(), &mut dumb) }
            .with_context(|| format!("cannot create {width}x{height} dumb buffer"))?;
        Ok(dumb)
    }

    pub fn destroy_dumb(&self, handle: u32) -> Result<()> {
        let mut req = DestroyDumb { handle };
        unsafe { ioctl_mode_destroy_dumb(self.fd(), &mut req) }
            .with_context(|| format!("cannot destroy dumb buffer {handle}"))?;
        Ok(())
    }

    /// Registers a dumb buffer as an XRGB8888 framebuffer, returning its id.
    pub fn add_framebuffer(&self, width: u32, height: u32, pitch: u32, handle: u32) -> Result<u32> {
        let mut req = FbCmd2 {
            width,
            height,
            pixel_format: FORMAT_XRGB8888,
            handles: [handle, 0, 0, 0],
            pitches: [pitch, 0, 0, 0],
            ..Default::default()
        };
        unsafe { ioctl_mode_add_fb2(self.fd(), &mut req) }
            .with_context(|| format!("cannot register framebuffer for handle {handle}"))?;
        Ok(req.fb_id)
    }

    pub fn remove_framebuffer(&self, fb_id: u32) -> Result<()> {
        let mut id: libc::c_uint = fb_id;
        unsafe { ioctl_mode_rm_fb(self.fd(), &mut id) }
            .with_context(|| format!("cannot remove framebuffer {fb_id}"))?;
        Ok(())
    }

    /// Returns the mmap offset of a dumb buffer.
    pub fn map_dumb(&self, handle: u32) -> Result<u64> {
        let mut req = MapDumb {
            handle,
            ..Default::default()
        };
        unsafe { ioctl_mode_map_dumb(self.fd(), &mut req) }
            .with_context(|| format!("cannot map dumb buffer {handle}"))?;
        Ok(req.offset)
    }

    /// Queues a buffer swap at the next vblank. No completion event is
    /// requested; presents are spaced seconds apart and nothing reads the fd.
    pub fn page_flip(&self, crtc_id: u32, fb_id: u32) -> Result<()> {
        let mut req = CrtcPageFlip {
            crtc_id,
            fb_id,
            ..Default::default()
        };
        unsafe { ioctl_mode_page_flip(self.fd(), &mut req) }
            .with_context(|| format!("cannot flip CRTC {crtc_id} to fb {fb_id}"))?;
        Ok(())
    }
}

impl AsRawFd for Card {
    fn as_raw_fd(&self) -> RawFd {
        self.fd()
    }
}
