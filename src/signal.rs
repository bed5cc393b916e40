// src/signal.rs

//! Signal-to-token adapter.
//!
//! SIGINT/SIGTERM handlers set a process-wide atomic flag; the rest of the
//! program only ever sees a [`CancelToken`] handed out by [`install`], so the
//! presentation loop polls the token, never a global.

use anyhow::{Context, Result};
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use std::sync::atomic::{AtomicBool, Ordering};

static STOP_REQUESTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_stop_signal(_signum: libc::c_int) {
    STOP_REQUESTED.store(true, Ordering::SeqCst);
}

/// Read side of the stop flag. Cheap to copy around.
#[derive(Debug, Clone, Copy)]
pub struct CancelToken {
    flag: &'static AtomicBool,
}

impl CancelToken {
    pub(crate) fn from_flag(flag: &'static AtomicBool) -> Self {
        Self { flag }
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Installs SIGINT/SIGTERM handlers and returns the token they trip.
pub fn install() -> Result<CancelToken> {
    let action = SigAction::new(
        SigHandler::Handler(on_stop_signal),
        SaFlags::empty(),
        SigSet::empty(),
    );
    // Safety: the handler only performs an atomic store.
    unsafe {
        signal::sigaction(Signal::SIGINT, &action).context("cannot install SIGINT handler")?;
        signal::sigaction(Signal::SIGTERM, &action).context("cannot install SIGTERM handler")?;
    }
    Ok(CancelToken::from_flag(&STOP_REQUESTED))
}
