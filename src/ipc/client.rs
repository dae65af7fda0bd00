//! JSON-RPC 2.0 client over Unix socket.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::time::timeout;
use tracing::{debug, error};

use super::types::{CleanupParams, JsonRpcRequest, JsonRpcResponse, METHOD_CLEANUP};
use crate::orchestrator::CleanupReport;
use crate::Error;

/// How long to wait for the daemon to accept a connection.
const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

/// Client for the tidyup daemon.
pub struct IpcClient {
    socket_path: String,
    request_id: AtomicU64,
}

impl IpcClient {
    pub fn new(socket_path: impl Into<String>) -> Self {
        Self {
            socket_path: socket_path.into(),
            request_id: AtomicU64::new(1),
        }
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Check if the daemon is accepting connections.
    pub async fn is_daemon_running(&self) -> bool {
        matches!(
            timeout(CONNECT_TIMEOUT, UnixStream::connect(&self.socket_path)).await,
            Ok(Ok(_))
        )
    }

    /// Ask the daemon to clean up the working tree at `root`.
    pub async fn cleanup(&self, root: &Path) -> Result<CleanupReport, Error> {
        let params = CleanupParams {
            root: root.to_path_buf(),
        };
        let request = JsonRpcRequest::new(METHOD_CLEANUP, params, self.next_id());
        self.send_request(request).await
    }

    /// Send one request line and read one response line.
    async fn send_request<T, R>(&self, request: JsonRpcRequest<T>) -> Result<R, Error>
    where
        T: serde::Serialize,
        R: serde::de::DeserializeOwned,
    {
        debug!(method = %request.method, id = request.id, "Sending IPC request");

        let stream = timeout(CONNECT_TIMEOUT, UnixStream::connect(&self.socket_path))
            .await
            .map_err(|_| Error::Ipc(format!("Timed out connecting to {}", self.socket_path)))?
            .map_err(|e| Error::Ipc(format!("Failed to connect to {}: {}", self.socket_path, e)))?;

        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        let mut line = serde_json::to_string(&request)?;
        line.push('\n');
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| Error::Ipc(format!("Failed to write request: {}", e)))?;
        writer
            .flush()
            .await
            .map_err(|e| Error::Ipc(format!("Failed to flush: {}", e)))?;

        // No read timeout: a cleanup run lasts as long as the formatter does.
        let mut response_line = String::new();
        reader
            .read_line(&mut response_line)
            .await
            .map_err(|e| Error::Ipc(format!("Failed to read response: {}", e)))?;

        let response: JsonRpcResponse<R> = serde_json::from_str(&response_line)
            .map_err(|e| Error::Ipc(format!("Failed to parse response: {}", e)))?;

        if let Some(error) = response.error {
            error!(code = error.code, message = %error.message, "IPC error");
            return Err(Error::Ipc(error.to_string()));
        }

        response
            .result
            .ok_or_else(|| Error::Ipc("No result in response".to_string()))
    }
}
