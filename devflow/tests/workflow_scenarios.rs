//! End-to-end workflow scenarios driven through `run_workflow`.
//!
//! Every collaborator is scripted and writes to one call log, so the tests
//! check both what happened and in which order.

use chrono::Local;

use devflow::core::outcome::RunOutcome;
use devflow::exit_codes;
use devflow::test_support::{Harness, plan};
use devflow::workflow::{Stages, run_workflow};

/// Interpreter absent: fixed "not found" message, no server launch, no git.
#[test]
fn missing_interpreter_stops_before_anything_runs() {
    let harness = Harness::new();
    let p = plan();
    harness.preflight.set_missing_tools(&[p.interpreter.as_str()]);

    let outcome = run_workflow(&p, Stages::RUN, harness.collaborators()).expect("run");

    assert_eq!(
        outcome,
        RunOutcome::ToolMissing {
            tool: p.interpreter.clone()
        }
    );
    assert_eq!(outcome.exit_code(), exit_codes::TOOL_MISSING);
    assert!(
        harness
            .console
            .said()
            .iter()
            .any(|line| line.contains(&format!("{} not found", p.interpreter)))
    );
    assert!(harness.calls.matching("server:").is_empty());
    assert!(harness.calls.matching("git:").is_empty());
    assert_eq!(harness.console.acknowledged(), 1);
}

/// Interpreter present, package absent: one install, then the server starts.
#[test]
fn missing_package_is_installed_once_then_server_starts() {
    let harness = Harness::new();
    harness
        .preflight
        .set_missing_packages(&["uvicorn", "python-multipart"]);
    harness.console.answer("n");

    let outcome = run_workflow(&plan(), Stages::RUN, harness.collaborators()).expect("run");

    assert_eq!(outcome, RunOutcome::Declined);
    assert_eq!(
        harness.calls.matching("install:"),
        vec!["install:uvicorn python-multipart".to_string()]
    );
    let install = harness.calls.position("install:").expect("install");
    let start = harness
        .calls
        .position("server:start-attached")
        .expect("server start");
    assert!(install < start);
}

/// Server runs, user stops it, answers "n": changes stay local, no git writes.
#[test]
fn declining_keeps_changes_local() {
    let harness = Harness::new();
    harness.console.answer("n");

    let outcome = run_workflow(&plan(), Stages::RUN, harness.collaborators()).expect("run");

    assert_eq!(outcome, RunOutcome::Declined);
    assert_eq!(outcome.exit_code(), exit_codes::OK);
    assert!(
        harness
            .console
            .said()
            .iter()
            .any(|line| line.contains("Changes stay local"))
    );
    assert!(harness.calls.matching("git:add").is_empty());
    assert!(harness.calls.matching("git:commit").is_empty());
    assert!(harness.calls.matching("git:push").is_empty());
    assert!(harness.calls.matching("browser:https://").is_empty());

    let stopped = harness.calls.position("server:wait").expect("server waited");
    let asked = harness.calls.position("ask:Deploy").expect("deploy prompt");
    assert!(stopped < asked, "deploy prompt must follow server stop");
}

/// Any answer other than a lone y/Y declines.
#[test]
fn non_y_answers_decline() {
    for answer in ["yes", "", "N", "maybe"] {
        let harness = Harness::new();
        harness.console.answer(answer);
        let outcome =
            run_workflow(&plan(), Stages::DEPLOY, harness.collaborators()).expect("run");
        assert_eq!(outcome, RunOutcome::Declined, "answer {answer:?}");
        assert!(harness.calls.matching("git:push").is_empty());
    }
}

/// "y", blank message, push succeeds: default message + date, dashboard opened.
#[test]
fn accepted_deploy_uses_default_message_and_opens_dashboard() {
    let harness = Harness::new();
    harness.console.answer("Y");
    harness.console.answer("");
    let p = plan();

    let outcome = run_workflow(&p, Stages::RUN, harness.collaborators()).expect("run");

    let expected_message = format!(
        "{} {}",
        p.default_commit_message,
        Local::now().date_naive().format("%Y-%m-%d")
    );
    assert_eq!(
        outcome,
        RunOutcome::Deployed {
            commit_message: expected_message.clone(),
            dashboard_url: p.dashboard_url.clone(),
        }
    );
    let entries = harness.calls.entries();
    let add = harness.calls.position("git:add -A").expect("add");
    let commit = harness.calls.position("git:commit").expect("commit");
    let push = harness.calls.position("git:push origin main").expect("push");
    let dashboard = harness
        .calls
        .position(&format!("browser:{}", p.dashboard_url))
        .expect("dashboard");
    assert!(add < commit && commit < push && push < dashboard);
    assert_eq!(entries[commit], format!("git:commit {expected_message}"));
}

/// Same as above but the push fails: message shown, dashboard never opened.
#[test]
fn failed_push_never_opens_dashboard() {
    let harness = Harness::new();
    harness.git.set_push_ok(false);
    harness.console.answer("y");
    harness.console.answer("");
    let p = plan();

    let outcome = run_workflow(&p, Stages::RUN, harness.collaborators()).expect("run");

    assert_eq!(outcome.exit_code(), exit_codes::PUSH_FAILED);
    assert!(
        harness
            .console
            .said()
            .iter()
            .any(|line| line.contains("Push to origin main failed"))
    );
    assert!(
        harness
            .calls
            .matching(&format!("browser:{}", p.dashboard_url))
            .is_empty()
    );
}

/// Branch profiles check out their branch exactly once, before the server.
#[test]
fn branch_checkout_happens_once_before_launch() {
    let harness = Harness::new();
    harness.console.answer("n");
    let mut p = plan();
    p.branch = Some("timeline-dev".to_string());

    run_workflow(&p, Stages::RUN, harness.collaborators()).expect("run");

    assert_eq!(
        harness.calls.matching("git:checkout"),
        vec!["git:checkout timeline-dev".to_string()]
    );
    let checkout = harness.calls.position("git:checkout").expect("checkout");
    let pull = harness.calls.position("git:pull").expect("pull");
    let start = harness.calls.position("server:").expect("server");
    assert!(checkout < pull && pull < start);
}

/// Detached launch never waits on the server before opening the browser.
#[test]
fn detached_launch_reaches_browser_without_waiting() {
    let harness = Harness::new();
    harness.console.answer("n");
    let mut p = plan();
    p.branch = Some("pro-features".to_string());
    p.server.spawn_detached = true;

    let outcome = run_workflow(&p, Stages::RUN, harness.collaborators()).expect("run");

    assert_eq!(outcome, RunOutcome::Declined);
    let spawn = harness
        .calls
        .position("server:spawn-detached")
        .expect("spawn");
    let ready = harness.calls.position("ready:").expect("readiness poll");
    let browser = harness
        .calls
        .position(&format!("browser:{}", p.server.local_url()))
        .expect("local browser");
    assert!(spawn < ready && ready < browser);
    assert!(harness.calls.matching("server:wait").is_empty());
    assert!(harness.calls.matching("server:start-attached").is_empty());
}
