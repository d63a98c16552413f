//! Opening URLs in the user's default browser.

use std::process::{Command, Stdio};

use anyhow::{Context, Result, bail};
use tracing::{debug, instrument};

pub trait Browser {
    fn open(&self, url: &str) -> Result<()>;
}

/// Opens URLs through the platform's opener command.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

impl Browser for SystemBrowser {
    #[instrument(skip(self))]
    fn open(&self, url: &str) -> Result<()> {
        let mut cmd = opener_command(url);
        debug!(program = ?cmd.get_program(), "opening browser");
        let status = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .with_context(|| format!("launch browser for {url}"))?;
        if !status.success() {
            bail!("browser opener exited with {:?} for {url}", status.code());
        }
        Ok(())
    }
}

/// Platform command that hands `url` to the default browser.
pub fn opener_command(url: &str) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        // Empty title argument so `start` does not treat the URL as a window title.
        cmd.args(["/C", "start", ""]).arg(url);
        cmd
    } else if cfg!(target_os = "macos") {
        let mut cmd = Command::new("open");
        cmd.arg(url);
        cmd
    } else {
        let mut cmd = Command::new("xdg-open");
        cmd.arg(url);
        cmd
    }
}
