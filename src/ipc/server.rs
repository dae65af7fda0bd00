//! JSON-RPC 2.0 server over Unix socket.
//!
//! Connections are handled concurrently, but every cleanup request is handed
//! to a single worker through a channel, so runs never overlap.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::client::IpcClient;
use super::types::{CleanupParams, JsonRpcRequest, JsonRpcResponse, METHOD_CLEANUP};
use crate::error::{Error, IpcErrorCode};
use crate::orchestrator::CleanupReport;

/// A cleanup request waiting for the worker.
#[derive(Debug)]
pub struct CleanupJob {
    pub root: PathBuf,
    pub reply: oneshot::Sender<CleanupReport>,
}

/// Accept connections on `socket_path` until the task is dropped.
///
/// Fails with [`Error::DaemonRunning`] if another daemon answers on the socket.
pub async fn run_server(socket_path: &str, jobs: mpsc::Sender<CleanupJob>) -> Result<(), Error> {
    let path = Path::new(socket_path);
    if path.exists() {
        if IpcClient::new(socket_path).is_daemon_running().await {
            return Err(Error::DaemonRunning(socket_path.to_string()));
        }
        // Left behind by a daemon that didn't shut down cleanly.
        std::fs::remove_file(path)?;
    }

    let listener = UnixListener::bind(path)?;
    info!(socket = %socket_path, "IPC server listening");

    loop {
        let (stream, _) = listener.accept().await?;
        let jobs = jobs.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, jobs).await {
                warn!(error = %e, "IPC connection failed");
            }
        });
    }
}

async fn handle_connection(
    stream: UnixStream,
    jobs: mpsc::Sender<CleanupJob>,
) -> Result<(), Error> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = dispatch(&line, &jobs).await;
        let mut out = serde_json::to_string(&response)?;
        out.push('\n');
        writer.write_all(out.as_bytes()).await?;
        writer.flush().await?;
    }

    Ok(())
}

async fn dispatch(line: &str, jobs: &mpsc::Sender<CleanupJob>) -> JsonRpcResponse<CleanupReport> {
    let request: JsonRpcRequest<Value> = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => {
            return JsonRpcResponse::err(0, IpcErrorCode::ParseError as i32, e.to_string());
        }
    };
    debug!(method = %request.method, id = request.id, "IPC request");

    if request.method != METHOD_CLEANUP {
        return JsonRpcResponse::err(
            request.id,
            IpcErrorCode::MethodNotFound as i32,
            format!("Method not found: {}", request.method),
        );
    }

    let params: CleanupParams = match serde_json::from_value(request.params) {
        Ok(params) => params,
        Err(e) => {
            return JsonRpcResponse::err(
                request.id,
                IpcErrorCode::InvalidParams as i32,
                e.to_string(),
            );
        }
    };

    let (reply, result) = oneshot::channel();
    let job = CleanupJob {
        root: params.root,
        reply,
    };
    if jobs.send(job).await.is_err() {
        error!("Cleanup worker has stopped");
        return JsonRpcResponse::err(
            request.id,
            IpcErrorCode::InternalError as i32,
            "cleanup worker stopped",
        );
    }

    match result.await {
        Ok(report) => JsonRpcResponse::ok(request.id, report),
        Err(_) => JsonRpcResponse::err(
            request.id,
            IpcErrorCode::InternalError as i32,
            "cleanup worker dropped the request",
        ),
    }
}
