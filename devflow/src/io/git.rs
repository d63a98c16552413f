//! Git adapter for the workflow.
//!
//! Branch switching and publishing print git's own output to the console so
//! the user sees conflicts and auth prompts directly; only queries capture.

use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};

/// Parsed `git status --porcelain` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// 2-letter XY code, or "??" for untracked.
    pub code: String,
    /// Path for the changed file.
    pub path: String,
}

/// Version-control operations the workflow needs.
///
/// Mutating operations return `Ok(false)` when git ran but exited non-zero, and
/// `Err` only when git could not be run at all.
pub trait VersionControl {
    fn current_branch(&self) -> Result<String>;
    fn changed_files(&self) -> Result<Vec<StatusEntry>>;
    fn checkout(&self, branch: &str) -> Result<bool>;
    fn pull(&self, remote: &str, branch: &str) -> Result<bool>;
    fn add_all(&self) -> Result<bool>;
    fn commit(&self, message: &str) -> Result<bool>;
    fn push(&self, remote: &str, branch: &str) -> Result<bool>;
}

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    program: String,
    workdir: PathBuf,
    quiet: bool,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            program: "git".to_string(),
            workdir: workdir.into(),
            quiet: false,
        }
    }

    /// Use a different git executable.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Discard git's console output instead of passing it through.
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new(&self.program)
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }

    /// Run with the console attached; report whether git exited zero.
    fn run_attached(&self, args: &[&str]) -> Result<bool> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args).current_dir(&self.workdir);
        if self.quiet {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }
        let status = cmd
            .status()
            .with_context(|| format!("spawn git {}", args.join(" ")))?;
        if !status.success() {
            warn!(args = %args.join(" "), exit_code = ?status.code(), "git exited non-zero");
        }
        Ok(status.success())
    }
}

impl VersionControl for Git {
    /// Return the current branch name (errors on detached HEAD).
    #[instrument(skip_all)]
    fn current_branch(&self) -> Result<String> {
        let out = self.run_capture(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        let name = out.trim().to_string();
        if name == "HEAD" {
            return Err(anyhow!("detached HEAD"));
        }
        debug!(branch = %name, "current branch");
        Ok(name)
    }

    /// Status entries (including untracked) in porcelain format.
    fn changed_files(&self) -> Result<Vec<StatusEntry>> {
        let out = self.run_capture(&["status", "--porcelain=v1", "-uall"])?;
        let mut entries = Vec::new();
        for line in out.lines() {
            if line.trim().is_empty() {
                continue;
            }
            entries.push(parse_status_line(line)?);
        }
        Ok(entries)
    }

    #[instrument(skip_all, fields(branch))]
    fn checkout(&self, branch: &str) -> Result<bool> {
        debug!(branch, "checking out branch");
        self.run_attached(&["checkout", branch])
    }

    #[instrument(skip_all, fields(remote, branch))]
    fn pull(&self, remote: &str, branch: &str) -> Result<bool> {
        debug!(remote, branch, "pulling");
        self.run_attached(&["pull", remote, branch])
    }

    /// Stage all changes (respects .gitignore).
    fn add_all(&self) -> Result<bool> {
        self.run_attached(&["add", "-A"])
    }

    #[instrument(skip_all)]
    fn commit(&self, message: &str) -> Result<bool> {
        debug!("committing staged changes");
        self.run_attached(&["commit", "-m", message])
    }

    #[instrument(skip_all, fields(remote, branch))]
    fn push(&self, remote: &str, branch: &str) -> Result<bool> {
        debug!(remote, branch, "pushing");
        self.run_attached(&["push", remote, branch])
    }
}

fn parse_status_line(line: &str) -> Result<StatusEntry> {
    if let Some(path) = line.strip_prefix("?? ") {
        return Ok(StatusEntry {
            code: "??".to_string(),
            path: path.trim().to_string(),
        });
    }
    if line.len() < 4 {
        return Err(anyhow!("unexpected porcelain line: '{line}'"));
    }
    let code = line[..2].to_string();
    let mut path = line[3..].trim().to_string();
    if let Some((_, new)) = path.split_once("->") {
        path = new.trim().to_string();
    }
    Ok(StatusEntry { code, path })
}
