//! CLI commands for tidyup.

pub mod daemon;
pub mod hooks;
pub mod init;
pub mod run;
pub mod status;
