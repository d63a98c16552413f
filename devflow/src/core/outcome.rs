//! Terminal states of a workflow run.

use crate::exit_codes;

/// How a run ended.
///
/// Expected terminal conditions (a missing tool, a declined prompt, a rejected
/// push) are outcomes rather than errors: each carries a fixed message and a
/// stable exit code so callers can tell them apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Preflight passed and nothing else was requested.
    Ready,
    /// Branch switched and nothing else was requested.
    Switched { branch: String },
    /// Server ran (and was stopped, or left running detached); no deploy requested.
    Served { url: String },
    /// Changes were committed, pushed, and the dashboard opened.
    Deployed {
        commit_message: String,
        dashboard_url: String,
    },
    /// User answered anything but `y` at the deploy prompt.
    Declined,
    /// Working tree had no changes to commit.
    NothingToDeploy,
    /// A required tool could not be invoked.
    ToolMissing { tool: String },
    /// Installing missing packages failed.
    InstallFailed { packages: Vec<String> },
    /// Local server did not respond before the readiness timeout.
    ServerNotReady { url: String },
    /// `git push` exited non-zero.
    PushFailed { remote: String, branch: String },
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Ready
            | RunOutcome::Switched { .. }
            | RunOutcome::Served { .. }
            | RunOutcome::Deployed { .. }
            | RunOutcome::Declined
            | RunOutcome::NothingToDeploy => exit_codes::OK,
            RunOutcome::ToolMissing { .. } => exit_codes::TOOL_MISSING,
            RunOutcome::InstallFailed { .. } => exit_codes::INSTALL_FAILED,
            RunOutcome::PushFailed { .. } => exit_codes::PUSH_FAILED,
            RunOutcome::ServerNotReady { .. } => exit_codes::SERVER_NOT_READY,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code() == exit_codes::OK
    }

    /// Final line shown to the user.
    pub fn message(&self) -> String {
        match self {
            RunOutcome::Ready => "All tools are available.".to_string(),
            RunOutcome::Switched { branch } => format!("Now on branch {branch}."),
            RunOutcome::Served { url } => format!("Server session at {url} finished."),
            RunOutcome::Deployed {
                commit_message,
                dashboard_url,
            } => format!(
                "Deployed \"{commit_message}\". Dashboard opened at {dashboard_url}. Done."
            ),
            RunOutcome::Declined => "Deploy skipped. Changes stay local.".to_string(),
            RunOutcome::NothingToDeploy => {
                "Nothing to deploy: working tree is clean.".to_string()
            }
            RunOutcome::ToolMissing { tool } => {
                format!("{tool} not found. Install it and make sure it is on PATH.")
            }
            RunOutcome::InstallFailed { packages } => format!(
                "Package install failed ({}). Fix the install and run again.",
                packages.join(", ")
            ),
            RunOutcome::ServerNotReady { url } => {
                format!("Server at {url} did not respond in time. Browser not opened.")
            }
            RunOutcome::PushFailed { remote, branch } => format!(
                "Push to {remote} {branch} failed. Dashboard not opened."
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soft_endings_exit_ok() {
        assert!(RunOutcome::Declined.is_success());
        assert!(RunOutcome::NothingToDeploy.is_success());
        assert!(
            RunOutcome::Deployed {
                commit_message: "m".to_string(),
                dashboard_url: "https://dashboard.render.com".to_string(),
            }
            .is_success()
        );
    }

    #[test]
    fn failures_have_distinct_codes() {
        let codes = [
            RunOutcome::ToolMissing {
                tool: "python".to_string(),
            }
            .exit_code(),
            RunOutcome::InstallFailed {
                packages: vec!["uvicorn".to_string()],
            }
            .exit_code(),
            RunOutcome::PushFailed {
                remote: "origin".to_string(),
                branch: "main".to_string(),
            }
            .exit_code(),
            RunOutcome::ServerNotReady {
                url: "http://127.0.0.1:8000/".to_string(),
            }
            .exit_code(),
        ];
        for (i, code) in codes.iter().enumerate() {
            assert_ne!(*code, exit_codes::OK);
            assert!(!codes[i + 1..].contains(code), "duplicate exit code {code}");
        }
    }

    #[test]
    fn messages_name_the_problem() {
        let missing = RunOutcome::ToolMissing {
            tool: "python".to_string(),
        };
        assert!(missing.message().contains("python not found"));
        assert!(RunOutcome::Declined.message().contains("stay local"));
        let push = RunOutcome::PushFailed {
            remote: "origin".to_string(),
            branch: "main".to_string(),
        };
        assert!(push.message().contains("failed"));
    }
}
