//! Command listener.
//!
//! A TCP socket accepting one newline-terminated JSON command per
//! connection, e.g. `{"action": "reload", "data": {}}`. Valid commands are
//! logged and acknowledged with `OK\n`; nothing is executed. Invalid input
//! closes the connection without a response.
//!
//! There is no authentication; bind it to a private interface.

use crate::observability::metrics;
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Longest request line accepted, newline included.
pub const MAX_COMMAND_BYTES: u64 = 64 * 1024;

/// How long a client may take to send its request.
pub const READ_TIMEOUT: Duration = Duration::from_secs(10);

const OK_RESPONSE: &[u8] = b"OK\n";

/// A command received on the listener socket.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ListenCommand {
    #[serde(default, alias = "Action")]
    pub action: String,

    #[serde(default, alias = "Data")]
    pub data: serde_json::Value,
}

/// Per-connection listener errors. None of these stop the accept loop.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Client did not send a request within {0:?}")]
    ReadTimeout(Duration),

    #[error("Request exceeds {0} bytes")]
    TooLarge(u64),

    #[error("Malformed command: {0}")]
    Malformed(String),

    #[error("Command has no action")]
    MissingAction,

    #[error("Command data is empty")]
    EmptyData,
}

/// Parse and validate one request line.
///
/// # Errors
///
/// - `ListenerError::Malformed` - not a JSON object of the expected shape
/// - `ListenerError::MissingAction` - `action` absent or empty
/// - `ListenerError::EmptyData` - `data` is the empty string
pub fn parse_command(line: &[u8]) -> Result<ListenCommand, ListenerError> {
    let command: ListenCommand =
        serde_json::from_slice(line).map_err(|e| ListenerError::Malformed(e.to_string()))?;

    if command.action.is_empty() {
        return Err(ListenerError::MissingAction);
    }
    if command.data.as_str() == Some("") {
        return Err(ListenerError::EmptyData);
    }

    Ok(command)
}

/// Accept connections until the cancellation token is triggered.
///
/// Each connection is handled on its own task. Accept errors are logged and
/// the loop continues.
#[instrument(skip_all, name = "reconciler.listener")]
pub async fn start_command_listener(listener: TcpListener, cancel_token: CancellationToken) {
    if let Ok(addr) = listener.local_addr() {
        info!(target: "reconciler.listener", address = %addr, "Command listener started");
    }

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        tokio::spawn(handle_connection(stream, peer));
                    }
                    Err(e) => {
                        warn!(target: "reconciler.listener", error = %e, "Failed to accept connection");
                    }
                }
            }
            () = cancel_token.cancelled() => {
                info!(
                    target: "reconciler.listener",
                    "Command listener received shutdown signal, exiting"
                );
                break;
            }
        }
    }

    info!(target: "reconciler.listener", "Command listener stopped");
}

async fn handle_connection(mut stream: TcpStream, peer: SocketAddr) {
    debug!(target: "reconciler.listener", peer = %peer, "New connection");

    match serve_one(&mut stream).await {
        Ok(command) => {
            info!(
                target: "reconciler.listener",
                peer = %peer,
                action = %command.action,
                data = %command.data,
                "Execute command"
            );
            metrics::record_listener_command("ok");
            if let Err(e) = stream.write_all(OK_RESPONSE).await {
                debug!(target: "reconciler.listener", peer = %peer, error = %e, "Failed to write response");
            }
        }
        Err(e) => {
            warn!(target: "reconciler.listener", peer = %peer, error = %e, "Invalid request");
            metrics::record_listener_command("invalid");
        }
    }

    let _ = stream.shutdown().await;
}

/// Read one request line and validate it.
async fn serve_one(stream: &mut TcpStream) -> Result<ListenCommand, ListenerError> {
    let mut reader = BufReader::new(stream).take(MAX_COMMAND_BYTES + 1);
    let mut line = Vec::new();

    tokio::time::timeout(READ_TIMEOUT, reader.read_until(b'\n', &mut line))
        .await
        .map_err(|_| ListenerError::ReadTimeout(READ_TIMEOUT))??;

    if u64::try_from(line.len()).unwrap_or(u64::MAX) > MAX_COMMAND_BYTES {
        return Err(ListenerError::TooLarge(MAX_COMMAND_BYTES));
    }

    parse_command(&line)
}
