//! Stable exit codes for devflow commands.

/// Run finished: success, declined deploy, or nothing to deploy.
pub const OK: i32 = 0;
/// Invalid config or an unexpected error.
pub const INVALID: i32 = 1;
/// A required tool (interpreter, git) is not callable.
pub const TOOL_MISSING: i32 = 2;
/// Installing missing packages failed.
pub const INSTALL_FAILED: i32 = 3;
/// `git push` exited non-zero.
pub const PUSH_FAILED: i32 = 4;
/// Local server did not answer before the readiness timeout.
pub const SERVER_NOT_READY: i32 = 5;
/// Ctrl-C outside a running server.
pub const INTERRUPTED: i32 = 130;
