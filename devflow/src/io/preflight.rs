//! Tool and package probes run before the workflow touches anything.
//!
//! Probes are computed fresh on every call and never cached.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::io::process::run_command_with_timeout;

/// Probe output is only inspected for failures; keep a small window.
const PROBE_OUTPUT_LIMIT_BYTES: usize = 16 * 1024;
const INSTALL_OUTPUT_LIMIT_BYTES: usize = 256 * 1024;
const INSTALL_STDERR_TAIL_LINES: usize = 15;

/// Result of installing missing packages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub succeeded: bool,
    /// Tail of the installer's stderr (empty on success).
    pub detail: String,
}

/// Environment probes and remediation.
pub trait Preflight {
    /// True if `program version_arg` can be spawned and exits zero.
    fn tool_available(&self, program: &str, version_arg: &str) -> bool;
    /// True if the interpreter's package manager reports `package` installed.
    fn package_installed(&self, package: &str) -> bool;
    /// Install all `packages` in one installer invocation.
    fn install_packages(&self, packages: &[String]) -> Result<InstallReport>;
}

/// Preflight that shells out to the real tools.
#[derive(Debug, Clone)]
pub struct SystemPreflight {
    pub workdir: PathBuf,
    pub interpreter: String,
    pub package_probe_args: Vec<String>,
    pub install_args: Vec<String>,
    pub probe_timeout: Duration,
    pub install_timeout: Duration,
}

impl Preflight for SystemPreflight {
    #[instrument(skip(self))]
    fn tool_available(&self, program: &str, version_arg: &str) -> bool {
        let mut cmd = Command::new(program);
        if !version_arg.is_empty() {
            cmd.arg(version_arg);
        }
        cmd.current_dir(&self.workdir);
        probe(cmd, self.probe_timeout)
    }

    #[instrument(skip(self))]
    fn package_installed(&self, package: &str) -> bool {
        let mut cmd = Command::new(&self.interpreter);
        cmd.args(&self.package_probe_args)
            .arg(package)
            .current_dir(&self.workdir);
        probe(cmd, self.probe_timeout)
    }

    #[instrument(skip(self), fields(count = packages.len()))]
    fn install_packages(&self, packages: &[String]) -> Result<InstallReport> {
        info!(packages = %packages.join(" "), "installing packages");
        let mut cmd = Command::new(&self.interpreter);
        cmd.args(&self.install_args)
            .args(packages)
            .current_dir(&self.workdir);
        let output =
            run_command_with_timeout(cmd, self.install_timeout, INSTALL_OUTPUT_LIMIT_BYTES)
                .with_context(|| format!("run {} package install", self.interpreter))?;
        if output.succeeded() {
            debug!("install succeeded");
            return Ok(InstallReport {
                succeeded: true,
                detail: String::new(),
            });
        }
        let detail = if output.timed_out {
            format!(
                "install timed out after {}s",
                self.install_timeout.as_secs()
            )
        } else {
            output.stderr_tail(INSTALL_STDERR_TAIL_LINES)
        };
        warn!(exit_code = ?output.status.code(), timed_out = output.timed_out, "install failed");
        Ok(InstallReport {
            succeeded: false,
            detail,
        })
    }
}

/// Spawn failure, timeout and non-zero exit all count as unavailable.
fn probe(cmd: Command, timeout: Duration) -> bool {
    match run_command_with_timeout(cmd, timeout, PROBE_OUTPUT_LIMIT_BYTES) {
        Ok(output) => {
            let ok = output.succeeded();
            debug!(ok, "probe finished");
            ok
        }
        Err(err) => {
            debug!(err = %format!("{err:#}"), "probe could not run");
            false
        }
    }
}
