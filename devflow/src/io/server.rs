//! Application server launch.
//!
//! Two modes: attached (the server shares this console and devflow waits for
//! it to exit) and detached (the server gets its own window or process group
//! and devflow never waits on it).

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

use anyhow::{Context, Result};
use tracing::{debug, info, instrument};

use crate::io::interrupt::AttachedServerGuard;

/// Everything needed to start the app server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerRequest {
    pub workdir: PathBuf,
    pub interpreter: String,
    pub runtime_module: String,
    pub app: String,
    pub host: String,
    pub port: u16,
    pub reload: bool,
    /// Where a detached server's output goes on platforms without a new console window.
    pub detached_log_path: PathBuf,
}

impl ServerRequest {
    /// Interpreter arguments: `-m <runtime> <app> --host <host> --port <port> [--reload]`.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "-m".to_string(),
            self.runtime_module.clone(),
            self.app.clone(),
            "--host".to_string(),
            self.host.clone(),
            "--port".to_string(),
            self.port.to_string(),
        ];
        if self.reload {
            args.push("--reload".to_string());
        }
        args
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.interpreter);
        cmd.args(self.args()).current_dir(&self.workdir);
        cmd
    }
}

/// A server process devflow is attached to.
pub trait RunningServer {
    /// `Some(exit code)` once the process has exited, `None` while it runs.
    /// The inner `None` means it was killed by a signal.
    fn try_exited(&mut self) -> Result<Option<Option<i32>>>;
    /// Block until the process exits.
    fn wait(&mut self) -> Result<Option<i32>>;
}

pub trait ServerLauncher {
    /// Start the server on this console. The caller waits on the returned handle.
    fn start_attached(&self, request: &ServerRequest) -> Result<Box<dyn RunningServer>>;
    /// Start the server without keeping a handle to it.
    fn spawn_detached(&self, request: &ServerRequest) -> Result<()>;
}

/// Launcher that spawns real processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessLauncher;

struct ChildServer {
    child: Child,
    _guard: AttachedServerGuard,
}

impl RunningServer for ChildServer {
    fn try_exited(&mut self) -> Result<Option<Option<i32>>> {
        let status = self.child.try_wait().context("poll server process")?;
        Ok(status.map(|s| s.code()))
    }

    fn wait(&mut self) -> Result<Option<i32>> {
        let status = self.child.wait().context("wait for server process")?;
        debug!(exit_code = ?status.code(), "server exited");
        Ok(status.code())
    }
}

impl ServerLauncher for ProcessLauncher {
    #[instrument(skip_all, fields(host = %request.host, port = request.port))]
    fn start_attached(&self, request: &ServerRequest) -> Result<Box<dyn RunningServer>> {
        let guard = AttachedServerGuard::engage();
        let child = request
            .command()
            .stdin(Stdio::inherit())
            .spawn()
            .with_context(|| {
                format!("start {} -m {}", request.interpreter, request.runtime_module)
            })?;
        info!(pid = child.id(), "server started");
        Ok(Box::new(ChildServer {
            child,
            _guard: guard,
        }))
    }

    #[instrument(skip_all, fields(host = %request.host, port = request.port))]
    fn spawn_detached(&self, request: &ServerRequest) -> Result<()> {
        spawn_detached_impl(request)
    }
}

#[cfg(windows)]
fn spawn_detached_impl(request: &ServerRequest) -> Result<()> {
    // `start` opens a new console window and returns immediately.
    let status = Command::new("cmd")
        .arg("/C")
        .arg("start")
        .arg(format!("devflow {}", request.app))
        .arg(&request.interpreter)
        .args(request.args())
        .current_dir(&request.workdir)
        .status()
        .context("spawn server window")?;
    if !status.success() {
        anyhow::bail!("cmd start exited with {:?}", status.code());
    }
    info!("server window opened");
    Ok(())
}

#[cfg(not(windows))]
fn spawn_detached_impl(request: &ServerRequest) -> Result<()> {
    spawn_reaped(request).map(|_| ())
}

/// Spawn the server in its own process group and reap it from a background
/// thread, so an early exit never leaves a zombie while devflow keeps running.
#[cfg(not(windows))]
fn spawn_reaped(request: &ServerRequest) -> Result<u32> {
    use std::fs::File;
    use std::os::unix::process::CommandExt;

    if let Some(parent) = request.detached_log_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create log dir {}", parent.display()))?;
    }
    let log = File::create(&request.detached_log_path)
        .with_context(|| format!("create {}", request.detached_log_path.display()))?;
    let log_err = log.try_clone().context("clone server log handle")?;
    let mut child = request
        .command()
        .stdin(Stdio::null())
        .stdout(log)
        .stderr(log_err)
        .process_group(0)
        .spawn()
        .with_context(|| {
            format!("spawn {} -m {}", request.interpreter, request.runtime_module)
        })?;
    let pid = child.id();
    info!(
        pid,
        log = %request.detached_log_path.display(),
        "server spawned in its own process group"
    );
    std::thread::Builder::new()
        .name("devflow-reaper".to_string())
        .spawn(move || match child.wait() {
            Ok(status) => debug!(pid, exit_code = ?status.code(), "detached server exited"),
            Err(err) => debug!(pid, err = %err, "could not wait for detached server"),
        })
        .context("spawn reaper thread")?;
    Ok(pid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ServerRequest {
        ServerRequest {
            workdir: std::env::temp_dir(),
            interpreter: "python3".to_string(),
            runtime_module: "uvicorn".to_string(),
            app: "main:app".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8000,
            reload: true,
            detached_log_path: std::env::temp_dir().join("devflow-8000.log"),
        }
    }

    #[test]
    fn args_include_host_port_and_reload() {
        assert_eq!(
            request().args(),
            vec![
                "-m",
                "uvicorn",
                "main:app",
                "--host",
                "127.0.0.1",
                "--port",
                "8000",
                "--reload"
            ]
        );
    }

    #[test]
    fn reload_flag_is_optional() {
        let mut req = request();
        req.reload = false;
        assert!(!req.args().iter().any(|a| a == "--reload"));
    }

    #[cfg(unix)]
    #[test]
    fn detached_spawn_returns_without_waiting() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut req = request();
        req.workdir = temp.path().to_path_buf();
        // `sh -m -c 'sleep 3' --host ...` stands in for a long-running server.
        req.interpreter = "sh".to_string();
        req.runtime_module = "-c".to_string();
        req.app = "sleep 3".to_string();
        req.detached_log_path = temp.path().join("logs/server.log");
        let started = std::time::Instant::now();
        ProcessLauncher.spawn_detached(&req).expect("spawn");
        assert!(started.elapsed() < std::time::Duration::from_secs(2));
        assert!(req.detached_log_path.exists());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn detached_server_that_exits_is_reaped() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut req = request();
        req.workdir = temp.path().to_path_buf();
        req.interpreter = "sh".to_string();
        req.runtime_module = "-c".to_string();
        req.app = "exit 0".to_string();
        req.detached_log_path = temp.path().join("server.log");

        let pid = spawn_reaped(&req).expect("spawn");

        // A zombie keeps its /proc entry; a reaped process loses it.
        let proc_entry = std::path::PathBuf::from(format!("/proc/{pid}"));
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while proc_entry.exists() && std::time::Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
        assert!(!proc_entry.exists(), "pid {pid} was not reaped");
    }
}
