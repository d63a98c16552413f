//! Workflow configuration stored in `devflow.toml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Default config file name, looked up in the current directory.
pub const CONFIG_FILE_NAME: &str = "devflow.toml";

/// Devflow configuration (TOML).
///
/// Every section falls back to defaults, so a file only needs the keys it
/// changes. Profiles overlay the `server` and branch settings for one run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DevflowConfig {
    /// Project directory the server and git commands run in. `~/` expands to
    /// the home directory.
    pub project_dir: PathBuf,

    /// Wait for the user to acknowledge fatal messages before exiting.
    pub pause_on_error: bool,

    pub toolchain: ToolchainConfig,
    pub server: ServerConfig,
    pub git: GitConfig,
    pub deploy: DeployConfig,

    /// Named overlays, one per launcher flavour (e.g. `pro-features`).
    pub profiles: BTreeMap<String, ProfileConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToolchainConfig {
    /// Interpreter used to run the app and its package manager.
    pub interpreter: String,
    /// Git executable.
    pub git: String,
    /// Flag passed to tools to check they are callable.
    pub version_arg: String,
    /// Packages the app needs; missing ones are installed before launch.
    pub packages: Vec<String>,
    /// Interpreter args that probe one installed package (package name appended).
    pub package_probe_args: Vec<String>,
    /// Interpreter args that install packages (package names appended).
    pub install_args: Vec<String>,
    pub probe_timeout_secs: u64,
    pub install_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    /// `module:attribute` target handed to the server runtime.
    pub app: String,
    /// Python module that serves the app (`<interpreter> -m <runtime>`).
    pub runtime_module: String,
    pub host: String,
    pub port: u16,
    pub reload: bool,
    /// Start the server in its own window/process group and don't wait for it.
    pub spawn_detached: bool,
    pub ready_timeout_secs: u64,
    pub ready_poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GitConfig {
    pub remote: String,
    /// Branch pushed on deploy.
    pub push_branch: String,
    /// Branch to check out before launching. `None` keeps the current branch.
    pub branch: Option<String>,
    pub pull_after_checkout: bool,
    /// Commit message prefix used when the user leaves the message blank.
    pub default_commit_message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DeployConfig {
    pub dashboard_url: String,
}

/// Per-profile overrides. Unset fields keep the base value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProfileConfig {
    pub branch: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub spawn_detached: Option<bool>,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter().to_string(),
            git: "git".to_string(),
            version_arg: "--version".to_string(),
            packages: vec![
                "fastapi".to_string(),
                "uvicorn".to_string(),
                "python-multipart".to_string(),
            ],
            package_probe_args: vec!["-m".to_string(), "pip".to_string(), "show".to_string()],
            install_args: vec!["-m".to_string(), "pip".to_string(), "install".to_string()],
            probe_timeout_secs: 30,
            install_timeout_secs: 10 * 60,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            app: "main:app".to_string(),
            runtime_module: "uvicorn".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8000,
            reload: true,
            spawn_detached: false,
            ready_timeout_secs: 30,
            ready_poll_interval_ms: 500,
        }
    }
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            push_branch: "main".to_string(),
            branch: None,
            pull_after_checkout: true,
            default_commit_message: "Update from local dev".to_string(),
        }
    }
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            dashboard_url: "https://dashboard.render.com".to_string(),
        }
    }
}

impl Default for DevflowConfig {
    fn default() -> Self {
        let mut profiles = BTreeMap::new();
        profiles.insert(
            "pro-features".to_string(),
            ProfileConfig {
                branch: Some("pro-features".to_string()),
                spawn_detached: Some(true),
                ..ProfileConfig::default()
            },
        );
        profiles.insert(
            "timeline-dev".to_string(),
            ProfileConfig {
                branch: Some("timeline-dev".to_string()),
                ..ProfileConfig::default()
            },
        );
        Self {
            project_dir: PathBuf::from("."),
            pause_on_error: true,
            toolchain: ToolchainConfig::default(),
            server: ServerConfig::default(),
            git: GitConfig::default(),
            deploy: DeployConfig::default(),
            profiles,
        }
    }
}

fn default_interpreter() -> &'static str {
    if cfg!(windows) { "python" } else { "python3" }
}

impl DevflowConfig {
    pub fn validate(&self) -> Result<()> {
        if self.toolchain.interpreter.trim().is_empty() {
            return Err(anyhow!("toolchain.interpreter must be non-empty"));
        }
        if self.toolchain.git.trim().is_empty() {
            return Err(anyhow!("toolchain.git must be non-empty"));
        }
        if self.toolchain.packages.iter().any(|p| p.trim().is_empty()) {
            return Err(anyhow!("toolchain.packages must not contain empty names"));
        }
        if self.toolchain.install_args.is_empty() {
            return Err(anyhow!("toolchain.install_args must be a non-empty array"));
        }
        if self.toolchain.probe_timeout_secs == 0 || self.toolchain.install_timeout_secs == 0 {
            return Err(anyhow!("toolchain timeouts must be > 0"));
        }
        if self.server.app.trim().is_empty() || self.server.runtime_module.trim().is_empty() {
            return Err(anyhow!("server.app and server.runtime_module must be non-empty"));
        }
        if self.server.port == 0 {
            return Err(anyhow!("server.port must be > 0"));
        }
        if self.server.ready_timeout_secs == 0 || self.server.ready_poll_interval_ms == 0 {
            return Err(anyhow!("server readiness timeout and poll interval must be > 0"));
        }
        if self.git.remote.trim().is_empty() || self.git.push_branch.trim().is_empty() {
            return Err(anyhow!("git.remote and git.push_branch must be non-empty"));
        }
        if self.deploy.dashboard_url.trim().is_empty() {
            return Err(anyhow!("deploy.dashboard_url must be non-empty"));
        }
        for (name, profile) in &self.profiles {
            if name.trim().is_empty() {
                return Err(anyhow!("profile names must be non-empty"));
            }
            if profile.port == Some(0) {
                return Err(anyhow!("profiles.{name}.port must be > 0"));
            }
            if let Some(branch) = &profile.branch
                && branch.trim().is_empty()
            {
                return Err(anyhow!("profiles.{name}.branch must be non-empty when set"));
            }
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `DevflowConfig::default()`.
pub fn load_config(path: &Path) -> Result<DevflowConfig> {
    if !path.exists() {
        let cfg = DevflowConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: DevflowConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate().with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &DevflowConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &Path) -> Result<PathBuf> {
    let Ok(rest) = path.strip_prefix("~") else {
        return Ok(path.to_path_buf());
    };
    let home = dirs::home_dir().ok_or_else(|| anyhow!("cannot resolve home directory for ~"))?;
    Ok(home.join(rest))
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
