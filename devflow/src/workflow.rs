//! Orchestration of the local-dev-and-deploy flow.
//!
//! ```text
//! Start → Preflight → (fail → Abort) → [SwitchBranch] → LaunchServer → WaitForUserStop
//!       → PromptDeploy → (No → End) → Stage → Commit → Push → (fail → Abort)
//!       → OpenDashboard → End
//! ```
//!
//! Every failure is terminal for the run. Subcommands run a subset of the
//! stages; the order never changes.

use anyhow::Result;
use chrono::{Local, NaiveDate};
use tracing::{info, instrument, warn};

use crate::core::decision::{Decision, parse_decision, resolve_commit_message};
use crate::core::outcome::RunOutcome;
use crate::io::browser::Browser;
use crate::io::console::Console;
use crate::io::git::VersionControl;
use crate::io::preflight::Preflight;
use crate::io::readiness::{Readiness, ReadinessProbe, wait_until_ready};
use crate::io::server::ServerLauncher;
use crate::plan::WorkflowPlan;

/// External collaborators of a run.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub preflight: &'a dyn Preflight,
    pub vcs: &'a dyn VersionControl,
    pub launcher: &'a dyn ServerLauncher,
    pub readiness: &'a dyn ReadinessProbe,
    pub browser: &'a dyn Browser,
    pub console: &'a dyn Console,
}

/// Which stages a command runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stages {
    /// Check out `plan.branch` (if set) before anything else.
    pub switch: bool,
    pub serve: bool,
    pub deploy: bool,
}

impl Stages {
    pub const RUN: Stages = Stages {
        switch: true,
        serve: true,
        deploy: true,
    };
    pub const SERVE: Stages = Stages {
        switch: true,
        serve: true,
        deploy: false,
    };
    pub const SWITCH: Stages = Stages {
        switch: true,
        serve: false,
        deploy: false,
    };
    pub const DEPLOY: Stages = Stages {
        switch: false,
        serve: false,
        deploy: true,
    };
}

/// Tools that must be present before a run proceeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requirements {
    pub interpreter: bool,
    pub packages: bool,
    pub git: bool,
}

impl Requirements {
    pub const ALL: Requirements = Requirements {
        interpreter: true,
        packages: true,
        git: true,
    };

    pub fn for_stages(stages: Stages, plan: &WorkflowPlan) -> Self {
        Requirements {
            interpreter: stages.serve,
            packages: stages.serve,
            git: (stages.switch && plan.branch.is_some()) || stages.deploy,
        }
    }
}

/// Run `stages` of the workflow and report how it ended.
///
/// The final outcome message is shown through the console; fatal outcomes
/// wait for acknowledgement when `plan.pause_on_error` is set.
#[instrument(skip_all, fields(profile = ?plan.profile, ?stages))]
pub fn run_workflow(
    plan: &WorkflowPlan,
    stages: Stages,
    deps: Collaborators<'_>,
) -> Result<RunOutcome> {
    let outcome = run_stages(plan, stages, deps)?;
    finish(plan, deps, outcome)
}

/// Preflight only, for `devflow check`.
pub fn run_check(plan: &WorkflowPlan, deps: Collaborators<'_>) -> Result<RunOutcome> {
    let outcome = match run_preflight(plan, Requirements::ALL, deps)? {
        Some(failed) => failed,
        None => RunOutcome::Ready,
    };
    finish(plan, deps, outcome)
}

fn run_stages(plan: &WorkflowPlan, stages: Stages, deps: Collaborators<'_>) -> Result<RunOutcome> {
    if let Some(failed) = run_preflight(plan, Requirements::for_stages(stages, plan), deps)? {
        return Ok(failed);
    }

    let mut switched = None;
    if stages.switch
        && let Some(branch) = &plan.branch
    {
        switch_branch(plan, branch, deps)?;
        switched = Some(branch.clone());
    }

    if stages.serve
        && let Some(failed) = launch_server(plan, deps)?
    {
        return Ok(failed);
    }

    if stages.deploy {
        return deploy(plan, deps, Local::now().date_naive());
    }
    if stages.serve {
        return Ok(RunOutcome::Served {
            url: plan.server.local_url(),
        });
    }
    Ok(match switched {
        Some(branch) => RunOutcome::Switched { branch },
        None => RunOutcome::Ready,
    })
}

fn finish(plan: &WorkflowPlan, deps: Collaborators<'_>, outcome: RunOutcome) -> Result<RunOutcome> {
    deps.console.say(&outcome.message());
    if !outcome.is_success() && plan.pause_on_error {
        deps.console.acknowledge("Press Enter to exit")?;
    }
    info!(exit_code = outcome.exit_code(), "workflow finished");
    Ok(outcome)
}

/// Check required tools, then packages. `Some(outcome)` means the run must stop.
///
/// Missing packages are installed in one invocation and the result is
/// checked; a failed install stops the run.
pub fn run_preflight(
    plan: &WorkflowPlan,
    requirements: Requirements,
    deps: Collaborators<'_>,
) -> Result<Option<RunOutcome>> {
    if requirements.interpreter
        && !deps
            .preflight
            .tool_available(&plan.interpreter, &plan.version_arg)
    {
        return Ok(Some(RunOutcome::ToolMissing {
            tool: plan.interpreter.clone(),
        }));
    }
    if requirements.git
        && !deps
            .preflight
            .tool_available(&plan.git_program, &plan.version_arg)
    {
        return Ok(Some(RunOutcome::ToolMissing {
            tool: plan.git_program.clone(),
        }));
    }
    if !requirements.packages || plan.packages.is_empty() {
        return Ok(None);
    }

    let missing: Vec<String> = plan
        .packages
        .iter()
        .filter(|pkg| !deps.preflight.package_installed(pkg))
        .cloned()
        .collect();
    if missing.is_empty() {
        return Ok(None);
    }

    deps.console
        .say(&format!("Installing missing packages: {}", missing.join(" ")));
    let report = deps.preflight.install_packages(&missing)?;
    if !report.succeeded {
        if !report.detail.is_empty() {
            deps.console.say(&report.detail);
        }
        return Ok(Some(RunOutcome::InstallFailed { packages: missing }));
    }
    info!(count = missing.len(), "packages installed");
    Ok(None)
}

/// Check out `branch` once, then optionally pull it.
///
/// Git prints its own errors; failures here are logged and the run continues.
pub fn switch_branch(plan: &WorkflowPlan, branch: &str, deps: Collaborators<'_>) -> Result<()> {
    deps.console.say(&format!("Switching to branch {branch}"));
    if !deps.vcs.checkout(branch)? {
        warn!(branch, "checkout failed; continuing on the current branch");
    }
    if plan.pull_after_checkout && !deps.vcs.pull(&plan.remote, branch)? {
        warn!(branch, remote = %plan.remote, "pull failed; continuing");
    }
    Ok(())
}

/// Start the app server and open the local URL once it answers.
///
/// Attached: blocks until the server exits (the user stops it with Ctrl-C).
/// Detached: returns as soon as the server answers; `Some(ServerNotReady)` if
/// it does not answer in time.
pub fn launch_server(plan: &WorkflowPlan, deps: Collaborators<'_>) -> Result<Option<RunOutcome>> {
    let url = plan.server.local_url();
    let request = plan.server_request();

    if plan.server.spawn_detached {
        deps.console
            .say(&format!("Starting {} in a separate window", plan.server.app));
        deps.launcher.spawn_detached(&request)?;
        return match wait_until_ready(
            deps.readiness,
            &url,
            plan.server.ready_timeout,
            plan.server.poll_interval,
            None,
        )? {
            Readiness::Ready => {
                open_url(deps, &url);
                Ok(None)
            }
            Readiness::TimedOut | Readiness::Exited(_) => {
                Ok(Some(RunOutcome::ServerNotReady { url }))
            }
        };
    }

    deps.console.say(&format!(
        "Starting {} at {url} (press Ctrl+C to stop the server)",
        plan.server.app
    ));
    let mut server = deps.launcher.start_attached(&request)?;
    match wait_until_ready(
        deps.readiness,
        &url,
        plan.server.ready_timeout,
        plan.server.poll_interval,
        Some(server.as_mut()),
    )? {
        Readiness::Ready => open_url(deps, &url),
        Readiness::TimedOut => deps.console.say(&format!(
            "Server is not answering at {url} yet; open it manually once it is up."
        )),
        Readiness::Exited(code) => deps
            .console
            .say(&format!("Server exited before it was ready (exit code {code:?}).")),
    }
    let code = server.wait()?;
    info!(exit_code = ?code, "server stopped");
    deps.console.say("Server stopped.");
    Ok(None)
}

/// Confirm, commit, push, and open the deploy dashboard.
pub fn deploy(
    plan: &WorkflowPlan,
    deps: Collaborators<'_>,
    today: NaiveDate,
) -> Result<RunOutcome> {
    match deps.vcs.current_branch() {
        Ok(branch) => {
            deps.console.say(&format!("On branch {branch}"));
            if branch != plan.push_branch {
                warn!(
                    branch = %branch,
                    push_branch = %plan.push_branch,
                    "pushing a different branch"
                );
                deps.console.say(&format!(
                    "Warning: the commit lands on {branch}, but the push sends local {} to {}.",
                    plan.push_branch, plan.remote
                ));
            }
        }
        Err(err) => warn!(err = %format!("{err:#}"), "could not read current branch"),
    }

    let changed = deps.vcs.changed_files()?;
    if changed.is_empty() {
        return Ok(RunOutcome::NothingToDeploy);
    }
    deps.console.say("Changed files:");
    for entry in &changed {
        deps.console.say(&format!("  {} {}", entry.code, entry.path));
    }

    if !plan.assume_yes {
        let answer = deps.console.ask(&format!(
            "Deploy these changes to {} {}? (Y/N)",
            plan.remote, plan.push_branch
        ))?;
        if parse_decision(&answer) == Decision::Decline {
            return Ok(RunOutcome::Declined);
        }
    }

    let typed = match &plan.commit_message {
        Some(message) => message.clone(),
        None => deps
            .console
            .ask("Commit message (leave blank for default)")?,
    };
    let message = resolve_commit_message(Some(typed.as_str()), &plan.default_commit_message, today);

    if !deps.vcs.add_all()? {
        warn!("git add failed; committing what is staged");
    }
    if !deps.vcs.commit(&message)? {
        warn!("git commit failed; pushing anyway");
    }
    if !deps.vcs.push(&plan.remote, &plan.push_branch)? {
        return Ok(RunOutcome::PushFailed {
            remote: plan.remote.clone(),
            branch: plan.push_branch.clone(),
        });
    }

    open_url(deps, &plan.dashboard_url);
    Ok(RunOutcome::Deployed {
        commit_message: message,
        dashboard_url: plan.dashboard_url.clone(),
    })
}

fn open_url(deps: Collaborators<'_>, url: &str) {
    if let Err(err) = deps.browser.open(url) {
        warn!(err = %format!("{err:#}"), url, "could not open browser");
        deps.console.say(&format!("Open {url} in your browser."));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Harness, plan};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).expect("valid date")
    }

    #[test]
    fn requirements_follow_stages() {
        let mut p = plan();
        assert_eq!(
            Requirements::for_stages(Stages::SWITCH, &p),
            Requirements {
                interpreter: false,
                packages: false,
                git: false,
            }
        );
        p.branch = Some("pro-features".to_string());
        assert!(Requirements::for_stages(Stages::SWITCH, &p).git);
        assert!(Requirements::for_stages(Stages::DEPLOY, &p).git);
        assert!(!Requirements::for_stages(Stages::DEPLOY, &p).interpreter);
        assert!(Requirements::for_stages(Stages::SERVE, &p).interpreter);
    }

    #[test]
    fn missing_git_stops_deploy() {
        let harness = Harness::new();
        harness.preflight.set_missing_tools(&["git"]);
        let outcome = deploy_only(&harness);
        assert_eq!(
            outcome,
            RunOutcome::ToolMissing {
                tool: "git".to_string()
            }
        );
        assert!(harness.calls.matching("git:").is_empty());
    }

    fn deploy_only(harness: &Harness) -> RunOutcome {
        run_workflow(&plan(), Stages::DEPLOY, harness.collaborators()).expect("run")
    }

    #[test]
    fn clean_tree_has_nothing_to_deploy() {
        let harness = Harness::new();
        harness.git.set_changed(&[]);
        assert_eq!(deploy_only(&harness), RunOutcome::NothingToDeploy);
        assert!(harness.console.asked().is_empty());
        assert!(harness.calls.matching("git:push").is_empty());
    }

    #[test]
    fn preset_message_and_assume_yes_skip_prompts() {
        let harness = Harness::new();
        let mut p = plan();
        p.assume_yes = true;
        p.commit_message = Some("ship heat sheet parser".to_string());

        let outcome = deploy(&p, harness.collaborators(), day()).expect("deploy");
        assert_eq!(
            outcome,
            RunOutcome::Deployed {
                commit_message: "ship heat sheet parser".to_string(),
                dashboard_url: p.dashboard_url.clone(),
            }
        );
        assert!(harness.console.asked().is_empty());
    }

    #[test]
    fn failed_commit_still_pushes() {
        let harness = Harness::new();
        harness.git.set_commit_ok(false);
        harness.console.answer("y");
        harness.console.answer("");
        let outcome = deploy(&plan(), harness.collaborators(), day()).expect("deploy");
        assert!(matches!(outcome, RunOutcome::Deployed { .. }));
        assert_eq!(harness.calls.matching("git:push").len(), 1);
    }

    #[test]
    fn failed_checkout_continues_to_server() {
        let harness = Harness::new();
        harness.git.set_checkout_ok(false);
        let mut p = plan();
        p.branch = Some("timeline-dev".to_string());

        let outcome = run_workflow(&p, Stages::SERVE, harness.collaborators()).expect("run");
        assert!(matches!(outcome, RunOutcome::Served { .. }));
        assert_eq!(harness.calls.matching("server:start-attached").len(), 1);
    }

    #[test]
    fn failed_pull_continues_to_server() {
        let harness = Harness::new();
        harness.git.set_pull_ok(false);
        let mut p = plan();
        p.branch = Some("timeline-dev".to_string());

        let outcome = run_workflow(&p, Stages::SERVE, harness.collaborators()).expect("run");
        assert!(matches!(outcome, RunOutcome::Served { .. }));
        assert_eq!(harness.calls.matching("git:pull").len(), 1);
        assert_eq!(harness.calls.matching("server:start-attached").len(), 1);
    }

    #[test]
    fn deploy_from_other_branch_warns_about_push_target() {
        let harness = Harness::new();
        harness.console.answer("y");
        harness.console.answer("");
        let mut p = plan();
        p.branch = Some("timeline-dev".to_string());

        let outcome = run_workflow(&p, Stages::RUN, harness.collaborators()).expect("run");
        assert!(matches!(outcome, RunOutcome::Deployed { .. }));
        let said = harness.console.said();
        let warning = said
            .iter()
            .position(|line| line.contains("push sends local main to origin"))
            .expect("branch warning");
        let prompt = said
            .iter()
            .position(|line| line.starts_with("Changed files"))
            .expect("changed files");
        assert!(warning < prompt);
        assert!(said[warning].contains("timeline-dev"));
    }

    #[test]
    fn deploy_from_push_branch_has_no_warning() {
        let harness = Harness::new();
        harness.console.answer("n");
        deploy_only(&harness);
        assert!(
            !harness
                .console
                .said()
                .iter()
                .any(|line| line.starts_with("Warning:"))
        );
    }

    #[test]
    fn attached_server_not_ready_skips_browser_but_waits() {
        let harness = Harness::new();
        harness.readiness.never_ready();
        let outcome = run_workflow(&plan(), Stages::SERVE, harness.collaborators()).expect("run");
        assert!(matches!(outcome, RunOutcome::Served { .. }));
        assert!(harness.calls.matching("browser:").is_empty());
        assert_eq!(harness.calls.matching("server:wait").len(), 1);
    }

    #[test]
    fn detached_server_not_ready_aborts() {
        let harness = Harness::new();
        harness.readiness.never_ready();
        let mut p = plan();
        p.server.spawn_detached = true;
        let outcome = run_workflow(&p, Stages::RUN, harness.collaborators()).expect("run");
        assert_eq!(
            outcome,
            RunOutcome::ServerNotReady {
                url: p.server.local_url()
            }
        );
        assert!(harness.calls.matching("browser:").is_empty());
        assert!(harness.calls.matching("git:add").is_empty());
        assert_eq!(harness.console.acknowledged(), 1);
    }

    #[test]
    fn failed_install_stops_before_launch() {
        let harness = Harness::new();
        harness.preflight.set_missing_packages(&["uvicorn"]);
        harness.preflight.set_install_ok(false);
        let outcome = run_workflow(&plan(), Stages::SERVE, harness.collaborators()).expect("run");
        assert_eq!(
            outcome,
            RunOutcome::InstallFailed {
                packages: vec!["uvicorn".to_string()]
            }
        );
        assert!(harness.calls.matching("server:").is_empty());
    }

    #[test]
    fn browser_failure_is_not_fatal() {
        let harness = Harness::new();
        harness.browser.fail();
        harness.console.answer("y");
        harness.console.answer("msg");
        let outcome = deploy(&plan(), harness.collaborators(), day()).expect("deploy");
        assert!(matches!(outcome, RunOutcome::Deployed { .. }));
        assert!(
            harness
                .console
                .said()
                .iter()
                .any(|line| line.contains("in your browser"))
        );
    }

    #[test]
    fn check_reports_ready() {
        let harness = Harness::new();
        let outcome = run_check(&plan(), harness.collaborators()).expect("check");
        assert_eq!(outcome, RunOutcome::Ready);
        assert_eq!(harness.calls.matching("probe:").len(), 2);
    }
}
