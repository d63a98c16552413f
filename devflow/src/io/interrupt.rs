//! Ctrl-C handling.
//!
//! While an attached server runs, the terminal delivers Ctrl-C to both the
//! server and devflow. The server should stop; devflow should keep going to
//! the deploy prompt. Outside that window Ctrl-C exits devflow.

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use tracing::debug;

use crate::exit_codes;

static SERVER_ATTACHED: AtomicBool = AtomicBool::new(false);

/// Install the process-wide handler. Call once, early in `main`.
pub fn install() -> Result<()> {
    ctrlc::set_handler(|| {
        if SERVER_ATTACHED.load(Ordering::SeqCst) {
            debug!("interrupt left to the attached server");
        } else {
            std::process::exit(exit_codes::INTERRUPTED);
        }
    })
    .context("install Ctrl-C handler")
}

/// Marks an attached server as running for as long as it is alive.
#[derive(Debug)]
pub struct AttachedServerGuard(());

impl AttachedServerGuard {
    pub fn engage() -> Self {
        SERVER_ATTACHED.store(true, Ordering::SeqCst);
        AttachedServerGuard(())
    }
}

impl Drop for AttachedServerGuard {
    fn drop(&mut self) {
        SERVER_ATTACHED.store(false, Ordering::SeqCst);
    }
}

pub fn server_attached() -> bool {
    SERVER_ATTACHED.load(Ordering::SeqCst)
}
