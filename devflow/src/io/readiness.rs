//! Readiness polling for the local server.

use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use tracing::{debug, info, instrument, warn};

use crate::io::server::RunningServer;

const PROBE_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);
const PROBE_REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// Single readiness check against a URL.
pub trait ReadinessProbe {
    /// True if anything answered at `url`, whatever the status code.
    fn responds(&self, url: &str) -> bool;
}

/// Probe that issues `GET url`.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .no_proxy()
            .connect_timeout(PROBE_CONNECT_TIMEOUT)
            .timeout(PROBE_REQUEST_TIMEOUT)
            .build()
            .context("build readiness HTTP client")?;
        Ok(Self { client })
    }
}

impl ReadinessProbe for HttpProbe {
    fn responds(&self, url: &str) -> bool {
        match self.client.get(url).send() {
            Ok(resp) => {
                debug!(status = resp.status().as_u16(), "server answered");
                true
            }
            Err(err) => {
                debug!(err = %err, connect = err.is_connect(), "server not answering yet");
                false
            }
        }
    }
}

/// Result of waiting for the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    TimedOut,
    /// The attached server exited before it answered.
    Exited(Option<i32>),
}

/// Poll `url` every `interval` until it answers or `timeout` elapses.
///
/// When `server` is given, polling also stops as soon as that process exits.
#[instrument(skip(probe, server), fields(timeout_ms = timeout.as_millis() as u64))]
pub fn wait_until_ready(
    probe: &dyn ReadinessProbe,
    url: &str,
    timeout: Duration,
    interval: Duration,
    mut server: Option<&mut dyn RunningServer>,
) -> Result<Readiness> {
    let started = Instant::now();
    let mut polls = 0u32;
    loop {
        if let Some(server) = server.as_deref_mut()
            && let Some(code) = server.try_exited()?
        {
            warn!(exit_code = ?code, "server exited before answering");
            return Ok(Readiness::Exited(code));
        }
        polls += 1;
        if probe.responds(url) {
            info!(polls, elapsed_ms = started.elapsed().as_millis() as u64, "server ready");
            return Ok(Readiness::Ready);
        }
        let elapsed = started.elapsed();
        if elapsed >= timeout {
            warn!(polls, "server not ready before timeout");
            return Ok(Readiness::TimedOut);
        }
        thread::sleep(interval.min(timeout - elapsed));
    }
}
