//! Pure, deterministic logic for the workflow runner.
//!
//! Nothing in here touches the filesystem, processes, or the network, so every
//! rule can be tested in isolation.

pub mod decision;
pub mod outcome;
pub mod url;
