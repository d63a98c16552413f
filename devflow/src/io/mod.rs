//! Side-effecting collaborators of the workflow: processes, git, HTTP, browser,
//! terminal. Each sits behind a trait so the workflow can run against fakes.

pub mod browser;
pub mod config;
pub mod console;
pub mod git;
pub mod interrupt;
pub mod preflight;
pub mod process;
pub mod readiness;
pub mod server;
