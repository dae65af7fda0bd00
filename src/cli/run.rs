//! Commit-intent trigger: clean up the current working tree.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::Error;
use crate::host::FsHost;
use crate::ipc::IpcClient;
use crate::orchestrator::{CleanupOrchestrator, CleanupReport};
use crate::staleness::StalenessCache;
use crate::vcs::GitCli;

/// Orchestrator for a working tree on disk, with a cold cache.
pub fn build_orchestrator(
    root: Option<PathBuf>,
    config: Config,
) -> CleanupOrchestrator<FsHost, GitCli> {
    CleanupOrchestrator::new(
        FsHost::new(root, config.formatter),
        GitCli::new(),
        config.policy,
        StalenessCache::new(),
    )
}

/// Run cleanup, through the daemon when one is listening.
pub async fn run(root: Option<PathBuf>, config: Config, no_daemon: bool) -> Result<(), Error> {
    if !no_daemon {
        if let Some(root) = &root {
            if let Some(report) = try_daemon(root, &config).await {
                println!("{}", report);
                return Ok(());
            }
        }
    }

    let mut orchestrator = build_orchestrator(root, config);
    let report = tokio::task::spawn_blocking(move || orchestrator.run())
        .await
        .map_err(|e| Error::other(format!("cleanup task failed: {}", e)))?;

    println!("{}", report);
    Ok(())
}

async fn try_daemon(root: &Path, config: &Config) -> Option<CleanupReport> {
    let client = IpcClient::new(config.daemon.socket_path.clone());
    if !client.is_daemon_running().await {
        debug!(socket = %config.daemon.socket_path, "No daemon, cleaning up in-process");
        return None;
    }

    match client.cleanup(root).await {
        Ok(report) => {
            info!(root = %root.display(), "Cleanup done by daemon");
            Some(report)
        }
        Err(e) => {
            warn!(error = %e, "Daemon cleanup failed, falling back to in-process run");
            None
        }
    }
}
