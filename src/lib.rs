//! tidyup library.
//!
//! Pre-commit cleanup of dirty files: pick the files version control reports
//! as changed, filter them by suffix policy, skip the ones already formatted
//! since their last change, and run the formatter over the rest.

pub mod cli;
pub mod config;
pub mod error;
pub mod host;
pub mod ipc;
pub mod orchestrator;
pub mod policy;
pub mod staleness;
pub mod vcs;

pub use error::Error;
pub use orchestrator::{CleanupOrchestrator, CleanupReport, SkipReason};
