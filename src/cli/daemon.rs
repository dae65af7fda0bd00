//! Background daemon.
//!
//! Keeps one orchestrator per working tree alive between commits so the
//! staleness cache stays warm. All runs happen on one worker thread.

use std::collections::HashMap;
use std::path::PathBuf;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cli::run::build_orchestrator;
use crate::config::Config;
use crate::error::Error;
use crate::host::FsHost;
use crate::ipc::{run_server, CleanupJob};
use crate::orchestrator::CleanupOrchestrator;
use crate::vcs::GitCli;

/// Pending requests the worker may queue before clients wait to send.
const JOB_QUEUE_SIZE: usize = 16;

/// Run the daemon until interrupted.
pub async fn run(config: &Config) -> Result<(), Error> {
    let socket_path = config.daemon.socket_path.clone();
    info!(socket = %socket_path, "Starting tidyup daemon");

    let (jobs_tx, jobs_rx) = mpsc::channel::<CleanupJob>(JOB_QUEUE_SIZE);
    // Detached: it exits with the process, or once every job sender is gone.
    std::thread::Builder::new()
        .name("tidyup-cleanup".to_string())
        .spawn(move || cleanup_worker(jobs_rx))?;

    let result = tokio::select! {
        result = run_server(&socket_path, jobs_tx) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            Ok(())
        }
    };

    // The socket belongs to the daemon that is still running.
    if matches!(result, Err(Error::DaemonRunning(_))) {
        return result;
    }
    if let Err(e) = std::fs::remove_file(&socket_path) {
        warn!(socket = %socket_path, error = %e, "Failed to remove socket");
    }

    result
}

/// Serve cleanup jobs one at a time until every sender is dropped.
fn cleanup_worker(mut jobs: mpsc::Receiver<CleanupJob>) {
    let mut trees: HashMap<PathBuf, CleanupOrchestrator<FsHost, GitCli>> = HashMap::new();

    while let Some(job) = jobs.blocking_recv() {
        let orchestrator = trees.entry(job.root.clone()).or_insert_with(|| {
            let config = Config::load(Some(&job.root)).unwrap_or_else(|e| {
                warn!(root = %job.root.display(), error = %e, "Invalid config, using defaults");
                Config::default()
            });
            info!(root = %job.root.display(), "Tracking working tree");
            build_orchestrator(Some(job.root.clone()), config)
        });

        let report = orchestrator.run();
        debug!(
            root = %job.root.display(),
            cached = orchestrator.cache().len(),
            "Cleanup run finished"
        );
        if job.reply.send(report).is_err() {
            warn!(root = %job.root.display(), "Client went away before cleanup finished");
        }
    }
}
