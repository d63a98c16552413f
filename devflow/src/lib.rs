//! Local development and deploy workflow runner.
//!
//! One linear flow replaces a set of near-duplicate launcher scripts: check
//! the toolchain, optionally switch branch, run the app server, then
//! optionally commit, push and open the hosting dashboard.
//!
//! - **[`core`]**: Pure decisions (prompt parsing, commit messages, outcomes).
//! - **[`io`]**: Side-effecting collaborators behind traits.
//! - **[`plan`]**: Config + profile + flags resolved into a [`plan::WorkflowPlan`].
//! - **[`workflow`]**: The flow itself, driven over [`workflow::Collaborators`].

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod plan;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod workflow;
