//! Resolution of config, profile and command-line overrides into one plan.
//!
//! Precedence, lowest to highest: built-in defaults, `devflow.toml`, the
//! selected profile, command-line flags.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};

use crate::core::url::local_url;
use crate::io::config::{DevflowConfig, expand_home};
use crate::io::preflight::SystemPreflight;
use crate::io::server::ServerRequest;

/// Command-line overrides. `None` keeps the configured value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub project_dir: Option<PathBuf>,
    pub branch: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub spawn_detached: Option<bool>,
    pub reload: Option<bool>,
    pub pull_after_checkout: Option<bool>,
    pub commit_message: Option<String>,
    pub assume_yes: bool,
    pub no_pause: bool,
}

/// Server settings after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerPlan {
    pub app: String,
    pub runtime_module: String,
    pub host: String,
    pub port: u16,
    pub reload: bool,
    pub spawn_detached: bool,
    pub ready_timeout: Duration,
    pub poll_interval: Duration,
}

impl ServerPlan {
    pub fn local_url(&self) -> String {
        local_url(&self.host, self.port)
    }
}

/// Fully resolved parameters for one workflow run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowPlan {
    pub profile: Option<String>,
    pub project_dir: PathBuf,
    pub interpreter: String,
    pub git_program: String,
    pub version_arg: String,
    pub packages: Vec<String>,
    pub package_probe_args: Vec<String>,
    pub install_args: Vec<String>,
    pub probe_timeout: Duration,
    pub install_timeout: Duration,
    pub server: ServerPlan,
    pub branch: Option<String>,
    pub pull_after_checkout: bool,
    pub remote: String,
    pub push_branch: String,
    pub default_commit_message: String,
    /// Preset message; when `None` the user is prompted.
    pub commit_message: Option<String>,
    /// Skip the deploy confirmation prompt.
    pub assume_yes: bool,
    pub dashboard_url: String,
    pub pause_on_error: bool,
}

impl WorkflowPlan {
    pub fn server_request(&self) -> ServerRequest {
        ServerRequest {
            workdir: self.project_dir.clone(),
            interpreter: self.interpreter.clone(),
            runtime_module: self.server.runtime_module.clone(),
            app: self.server.app.clone(),
            host: self.server.host.clone(),
            port: self.server.port,
            reload: self.server.reload,
            detached_log_path: std::env::temp_dir()
                .join(format!("devflow-server-{}.log", self.server.port)),
        }
    }

    pub fn system_preflight(&self) -> SystemPreflight {
        SystemPreflight {
            workdir: self.project_dir.clone(),
            interpreter: self.interpreter.clone(),
            package_probe_args: self.package_probe_args.clone(),
            install_args: self.install_args.clone(),
            probe_timeout: self.probe_timeout,
            install_timeout: self.install_timeout,
        }
    }
}

/// Build the plan for one run.
///
/// Fails on an unknown profile name or an override that breaks validation
/// (blank branch, port 0).
pub fn resolve_plan(
    cfg: &DevflowConfig,
    profile: Option<&str>,
    overrides: &Overrides,
) -> Result<WorkflowPlan> {
    cfg.validate()?;

    let selected = match profile {
        Some(name) => Some(cfg.profiles.get(name).ok_or_else(|| {
            let known: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
            anyhow!(
                "unknown profile '{name}' (known: {})",
                if known.is_empty() {
                    "none".to_string()
                } else {
                    known.join(", ")
                }
            )
        })?),
        None => None,
    };

    let mut branch = cfg.git.branch.clone();
    let mut host = cfg.server.host.clone();
    let mut port = cfg.server.port;
    let mut spawn_detached = cfg.server.spawn_detached;
    if let Some(p) = selected {
        branch = p.branch.clone().or(branch);
        host = p.host.clone().unwrap_or(host);
        port = p.port.unwrap_or(port);
        spawn_detached = p.spawn_detached.unwrap_or(spawn_detached);
    }
    branch = overrides.branch.clone().or(branch);
    host = overrides.host.clone().unwrap_or(host);
    port = overrides.port.unwrap_or(port);
    spawn_detached = overrides.spawn_detached.unwrap_or(spawn_detached);

    if let Some(b) = &branch
        && b.trim().is_empty()
    {
        return Err(anyhow!("branch must be non-empty"));
    }
    if port == 0 {
        return Err(anyhow!("port must be > 0"));
    }

    let project_dir = overrides
        .project_dir
        .clone()
        .unwrap_or_else(|| cfg.project_dir.clone());
    let project_dir = expand_home(&project_dir).context("resolve project directory")?;

    Ok(WorkflowPlan {
        profile: profile.map(str::to_string),
        project_dir,
        interpreter: cfg.toolchain.interpreter.clone(),
        git_program: cfg.toolchain.git.clone(),
        version_arg: cfg.toolchain.version_arg.clone(),
        packages: cfg.toolchain.packages.clone(),
        package_probe_args: cfg.toolchain.package_probe_args.clone(),
        install_args: cfg.toolchain.install_args.clone(),
        probe_timeout: Duration::from_secs(cfg.toolchain.probe_timeout_secs),
        install_timeout: Duration::from_secs(cfg.toolchain.install_timeout_secs),
        server: ServerPlan {
            app: cfg.server.app.clone(),
            runtime_module: cfg.server.runtime_module.clone(),
            host,
            port,
            reload: overrides.reload.unwrap_or(cfg.server.reload),
            spawn_detached,
            ready_timeout: Duration::from_secs(cfg.server.ready_timeout_secs),
            poll_interval: Duration::from_millis(cfg.server.ready_poll_interval_ms),
        },
        branch,
        pull_after_checkout: overrides
            .pull_after_checkout
            .unwrap_or(cfg.git.pull_after_checkout),
        remote: cfg.git.remote.clone(),
        push_branch: cfg.git.push_branch.clone(),
        default_commit_message: cfg.git.default_commit_message.clone(),
        commit_message: overrides.commit_message.clone(),
        assume_yes: overrides.assume_yes,
        dashboard_url: cfg.deploy.dashboard_url.clone(),
        pause_on_error: cfg.pause_on_error && !overrides.no_pause,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_profile() {
        let plan = resolve_plan(&DevflowConfig::default(), None, &Overrides::default())
            .expect("resolve");
        assert_eq!(plan.branch, None);
        assert!(!plan.server.spawn_detached);
        assert_eq!(plan.server.local_url(), "http://127.0.0.1:8000/");
        assert_eq!(plan.remote, "origin");
        assert_eq!(plan.push_branch, "main");
        assert!(plan.pause_on_error);
    }

    #[test]
    fn profile_overlays_branch_and_spawn_mode() {
        let plan = resolve_plan(
            &DevflowConfig::default(),
            Some("pro-features"),
            &Overrides::default(),
        )
        .expect("resolve");
        assert_eq!(plan.branch.as_deref(), Some("pro-features"));
        assert!(plan.server.spawn_detached);
        assert_eq!(plan.profile.as_deref(), Some("pro-features"));
    }

    #[test]
    fn flags_beat_profile() {
        let overrides = Overrides {
            branch: Some("hotfix".to_string()),
            port: Some(9001),
            spawn_detached: Some(false),
            no_pause: true,
            ..Overrides::default()
        };
        let plan = resolve_plan(&DevflowConfig::default(), Some("pro-features"), &overrides)
            .expect("resolve");
        assert_eq!(plan.branch.as_deref(), Some("hotfix"));
        assert_eq!(plan.server.port, 9001);
        assert!(!plan.server.spawn_detached);
        assert!(!plan.pause_on_error);
    }

    #[test]
    fn unknown_profile_lists_known_ones() {
        let err = resolve_plan(&DevflowConfig::default(), Some("nope"), &Overrides::default())
            .expect_err("unknown profile");
        let msg = format!("{err:#}");
        assert!(msg.contains("unknown profile 'nope'"));
        assert!(msg.contains("pro-features"));
    }

    #[test]
    fn blank_branch_override_is_rejected() {
        let overrides = Overrides {
            branch: Some(" ".to_string()),
            ..Overrides::default()
        };
        assert!(resolve_plan(&DevflowConfig::default(), None, &overrides).is_err());
    }

    #[test]
    fn server_request_carries_plan_settings() {
        let overrides = Overrides {
            host: Some("0.0.0.0".to_string()),
            reload: Some(false),
            ..Overrides::default()
        };
        let plan = resolve_plan(&DevflowConfig::default(), None, &overrides).expect("resolve");
        let request = plan.server_request();
        assert_eq!(request.host, "0.0.0.0");
        assert!(!request.reload);
        assert_eq!(request.app, "main:app");
        assert_eq!(plan.server.local_url(), "http://127.0.0.1:8000/");
    }
}
