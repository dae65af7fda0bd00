//! IPC between `tidyup run` and the tidyup daemon.

pub mod client;
pub mod server;
pub mod types;

pub use client::IpcClient;
pub use server::{run_server, CleanupJob};
