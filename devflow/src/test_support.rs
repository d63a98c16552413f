//! Test-only helpers: scripted collaborators, a shared call log, and a
//! throwaway git repository.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use tempfile::TempDir;

use crate::io::browser::Browser;
use crate::io::config::DevflowConfig;
use crate::io::console::Console;
use crate::io::git::{Git, StatusEntry, VersionControl};
use crate::io::preflight::{InstallReport, Preflight};
use crate::io::readiness::ReadinessProbe;
use crate::io::server::{RunningServer, ServerLauncher, ServerRequest};
use crate::plan::{Overrides, WorkflowPlan, resolve_plan};
use crate::workflow::Collaborators;

/// Default plan with tiny readiness timings and the temp dir as project.
pub fn plan() -> WorkflowPlan {
    let mut plan = resolve_plan(&DevflowConfig::default(), None, &Overrides::default())
        .expect("default config resolves");
    plan.project_dir = std::env::temp_dir();
    plan.server.ready_timeout = Duration::from_millis(20);
    plan.server.poll_interval = Duration::from_millis(1);
    plan
}

/// Ordered log of every external call the fakes receive.
#[derive(Debug, Clone, Default)]
pub struct Calls(Rc<RefCell<Vec<String>>>);

impl Calls {
    pub fn record(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    /// Entries starting with `prefix`, in order.
    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.0
            .borrow()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Index of the first entry starting with `prefix`.
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.0.borrow().iter().position(|e| e.starts_with(prefix))
    }
}

pub struct ScriptedPreflight {
    calls: Calls,
    missing_tools: RefCell<Vec<String>>,
    missing_packages: RefCell<Vec<String>>,
    install_ok: Cell<bool>,
}

impl ScriptedPreflight {
    pub fn new(calls: Calls) -> Self {
        Self {
            calls,
            missing_tools: RefCell::new(Vec::new()),
            missing_packages: RefCell::new(Vec::new()),
            install_ok: Cell::new(true),
        }
    }

    pub fn set_missing_tools(&self, tools: &[&str]) {
        *self.missing_tools.borrow_mut() = tools.iter().map(|t| t.to_string()).collect();
    }

    pub fn set_missing_packages(&self, packages: &[&str]) {
        *self.missing_packages.borrow_mut() = packages.iter().map(|p| p.to_string()).collect();
    }

    pub fn set_install_ok(&self, ok: bool) {
        self.install_ok.set(ok);
    }
}

impl Preflight for ScriptedPreflight {
    fn tool_available(&self, program: &str, _version_arg: &str) -> bool {
        self.calls.record(format!("probe:{program}"));
        !self.missing_tools.borrow().iter().any(|t| t == program)
    }

    fn package_installed(&self, package: &str) -> bool {
        self.calls.record(format!("probe-package:{package}"));
        !self.missing_packages.borrow().iter().any(|p| p == package)
    }

    fn install_packages(&self, packages: &[String]) -> Result<InstallReport> {
        self.calls.record(format!("install:{}", packages.join(" ")));
        if self.install_ok.get() {
            self.missing_packages
                .borrow_mut()
                .retain(|p| !packages.contains(p));
            Ok(InstallReport {
                succeeded: true,
                detail: String::new(),
            })
        } else {
            Ok(InstallReport {
                succeeded: false,
                detail: "ERROR: no matching distribution".to_string(),
            })
        }
    }
}

pub struct ScriptedGit {
    calls: Calls,
    branch: RefCell<String>,
    changed: RefCell<Vec<StatusEntry>>,
    checkout_ok: Cell<bool>,
    pull_ok: Cell<bool>,
    commit_ok: Cell<bool>,
    push_ok: Cell<bool>,
}

impl ScriptedGit {
    /// Starts on `main` with one modified file.
    pub fn new(calls: Calls) -> Self {
        Self {
            calls,
            branch: RefCell::new("main".to_string()),
            changed: RefCell::new(vec![StatusEntry {
                code: " M".to_string(),
                path: "main.py".to_string(),
            }]),
            checkout_ok: Cell::new(true),
            pull_ok: Cell::new(true),
            commit_ok: Cell::new(true),
            push_ok: Cell::new(true),
        }
    }

    pub fn set_changed(&self, entries: &[StatusEntry]) {
        *self.changed.borrow_mut() = entries.to_vec();
    }

    pub fn set_checkout_ok(&self, ok: bool) {
        self.checkout_ok.set(ok);
    }

    pub fn set_pull_ok(&self, ok: bool) {
        self.pull_ok.set(ok);
    }

    pub fn set_commit_ok(&self, ok: bool) {
        self.commit_ok.set(ok);
    }

    pub fn set_push_ok(&self, ok: bool) {
        self.push_ok.set(ok);
    }
}

impl VersionControl for ScriptedGit {
    fn current_branch(&self) -> Result<String> {
        Ok(self.branch.borrow().clone())
    }

    fn changed_files(&self) -> Result<Vec<StatusEntry>> {
        self.calls.record("git:status");
        Ok(self.changed.borrow().clone())
    }

    fn checkout(&self, branch: &str) -> Result<bool> {
        self.calls.record(format!("git:checkout {branch}"));
        if self.checkout_ok.get() {
            *self.branch.borrow_mut() = branch.to_string();
        }
        Ok(self.checkout_ok.get())
    }

    fn pull(&self, remote: &str, branch: &str) -> Result<bool> {
        self.calls.record(format!("git:pull {remote} {branch}"));
        Ok(self.pull_ok.get())
    }

    fn add_all(&self) -> Result<bool> {
        self.calls.record("git:add -A");
        Ok(true)
    }

    fn commit(&self, message: &str) -> Result<bool> {
        self.calls.record(format!("git:commit {message}"));
        Ok(self.commit_ok.get())
    }

    fn push(&self, remote: &str, branch: &str) -> Result<bool> {
        self.calls.record(format!("git:push {remote} {branch}"));
        Ok(self.push_ok.get())
    }
}

pub struct ScriptedLauncher {
    calls: Calls,
}

impl ScriptedLauncher {
    pub fn new(calls: Calls) -> Self {
        Self { calls }
    }
}

/// Attached server that runs until waited on.
pub struct ScriptedServer {
    calls: Calls,
}

impl RunningServer for ScriptedServer {
    fn try_exited(&mut self) -> Result<Option<Option<i32>>> {
        Ok(None)
    }

    fn wait(&mut self) -> Result<Option<i32>> {
        self.calls.record("server:wait");
        Ok(Some(0))
    }
}

impl ServerLauncher for ScriptedLauncher {
    fn start_attached(&self, request: &ServerRequest) -> Result<Box<dyn RunningServer>> {
        self.calls.record(format!(
            "server:start-attached {}:{}",
            request.host, request.port
        ));
        Ok(Box::new(ScriptedServer {
            calls: self.calls.clone(),
        }))
    }

    fn spawn_detached(&self, request: &ServerRequest) -> Result<()> {
        self.calls.record(format!(
            "server:spawn-detached {}:{}",
            request.host, request.port
        ));
        Ok(())
    }
}

pub struct ScriptedReadiness {
    calls: Calls,
    ready: Cell<bool>,
}

impl ScriptedReadiness {
    pub fn new(calls: Calls) -> Self {
        Self {
            calls,
            ready: Cell::new(true),
        }
    }

    pub fn never_ready(&self) {
        self.ready.set(false);
    }
}

impl ReadinessProbe for ScriptedReadiness {
    fn responds(&self, url: &str) -> bool {
        self.calls.record(format!("ready:{url}"));
        self.ready.get()
    }
}

pub struct ScriptedBrowser {
    calls: Calls,
    fail: Cell<bool>,
}

impl ScriptedBrowser {
    pub fn new(calls: Calls) -> Self {
        Self {
            calls,
            fail: Cell::new(false),
        }
    }

    pub fn fail(&self) {
        self.fail.set(true);
    }
}

impl Browser for ScriptedBrowser {
    fn open(&self, url: &str) -> Result<()> {
        self.calls.record(format!("browser:{url}"));
        if self.fail.get() {
            bail!("no browser available");
        }
        Ok(())
    }
}

/// Console with queued answers that records everything shown.
pub struct ScriptedConsole {
    calls: Calls,
    answers: RefCell<VecDeque<String>>,
    said: RefCell<Vec<String>>,
    asked: RefCell<Vec<String>>,
    acknowledged: Cell<usize>,
}

impl ScriptedConsole {
    pub fn new(calls: Calls) -> Self {
        Self {
            calls,
            answers: RefCell::new(VecDeque::new()),
            said: RefCell::new(Vec::new()),
            asked: RefCell::new(Vec::new()),
            acknowledged: Cell::new(0),
        }
    }

    /// Queue the answer to the next question.
    pub fn answer(&self, answer: &str) {
        self.answers.borrow_mut().push_back(answer.to_string());
    }

    pub fn said(&self) -> Vec<String> {
        self.said.borrow().clone()
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked.borrow().clone()
    }

    pub fn acknowledged(&self) -> usize {
        self.acknowledged.get()
    }
}

impl Console for ScriptedConsole {
    fn say(&self, line: &str) {
        self.said.borrow_mut().push(line.to_string());
    }

    fn ask(&self, question: &str) -> Result<String> {
        self.calls.record(format!("ask:{question}"));
        self.asked.borrow_mut().push(question.to_string());
        self.answers
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted answer for '{question}'"))
    }

    fn acknowledge(&self, _message: &str) -> Result<()> {
        self.acknowledged.set(self.acknowledged.get() + 1);
        Ok(())
    }
}

/// All scripted collaborators wired to one call log.
///
/// Defaults: every tool and package present, server ready on first poll,
/// one modified file, every git operation succeeds.
pub struct Harness {
    pub calls: Calls,
    pub preflight: ScriptedPreflight,
    pub git: ScriptedGit,
    pub launcher: ScriptedLauncher,
    pub readiness: ScriptedReadiness,
    pub browser: ScriptedBrowser,
    pub console: ScriptedConsole,
}

impl Harness {
    pub fn new() -> Self {
        let calls = Calls::default();
        Self {
            preflight: ScriptedPreflight::new(calls.clone()),
            git: ScriptedGit::new(calls.clone()),
            launcher: ScriptedLauncher::new(calls.clone()),
            readiness: ScriptedReadiness::new(calls.clone()),
            browser: ScriptedBrowser::new(calls.clone()),
            console: ScriptedConsole::new(calls.clone()),
            calls,
        }
    }

    pub fn collaborators(&self) -> Collaborators<'_> {
        Collaborators {
            preflight: &self.preflight,
            vcs: &self.git,
            launcher: &self.launcher,
            readiness: &self.readiness,
            browser: &self.browser,
            console: &self.console,
        }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// Temporary git repository on `main` with one commit.
pub struct TestRepo {
    dir: TempDir,
    remote: Option<TempDir>,
}

impl TestRepo {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create temp repo dir")?;
        let root = dir.path();
        run_git(root, &["init", "-q"])?;
        run_git(root, &["symbolic-ref", "HEAD", "refs/heads/main"])?;
        run_git(root, &["config", "user.email", "devflow@example.com"])?;
        run_git(root, &["config", "user.name", "devflow tests"])?;
        run_git(root, &["config", "commit.gpgsign", "false"])?;
        fs::write(root.join("README.md"), "swim app\n").context("write README")?;
        run_git(root, &["add", "-A"])?;
        run_git(root, &["commit", "-q", "-m", "init"])?;
        Ok(Self { dir, remote: None })
    }

    /// Repository with a bare `origin` it can push to.
    pub fn with_remote() -> Result<Self> {
        let mut repo = Self::new()?;
        let remote = tempfile::tempdir().context("create temp remote dir")?;
        run_git(remote.path(), &["init", "-q", "--bare"])?;
        let remote_path = remote.path().to_string_lossy().to_string();
        run_git(repo.path(), &["remote", "add", "origin", &remote_path])?;
        repo.remote = Some(remote);
        Ok(repo)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Git adapter for this repo with console output discarded.
    pub fn git(&self) -> Git {
        Git::new(self.path()).quiet()
    }

    /// Run git in the repo; panics on failure.
    pub fn git_ok(&self, args: &[&str]) -> String {
        run_git(self.path(), args).expect("git command")
    }

    pub fn write_file(&self, rel: &str, contents: &str) -> PathBuf {
        let path = self.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(&path, contents).expect("write file");
        path
    }

    /// Commit messages on the remote's `main`.
    pub fn remote_log(&self) -> Result<String> {
        let remote = self
            .remote
            .as_ref()
            .ok_or_else(|| anyhow!("repo has no remote"))?;
        run_git(remote.path(), &["log", "main", "--pretty=%B"])
    }
}

fn run_git(dir: &Path, args: &[&str]) -> Result<String> {
    let out = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .with_context(|| format!("spawn git {}", args.join(" ")))?;
    if !out.status.success() {
        bail!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&out.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&out.stdout).to_string())
}
