// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket server and connection handling.

use agsync_daemon::protocol::{self, Request, Response, DEFAULT_TIMEOUT, PROTOCOL_VERSION};
use agsync_engine::SyncError;
use std::time::Duration;
use tokio::net::UnixStream;
use tracing::{debug, error};

use crate::lifecycle::DaemonState;

/// How long `SyncNow` waits for its drain pass before answering
const SYNC_WAIT: Duration = Duration::from_secs(10);

/// Handle a single client connection
pub async fn handle_connection(
    daemon: &mut DaemonState,
    stream: UnixStream,
) -> Result<(), ServerError> {
    let (mut reader, mut writer) = stream.into_split();

    let request = match protocol::read_request(&mut reader, DEFAULT_TIMEOUT).await {
        Ok(req) => req,
        Err(protocol::ProtocolError::Timeout) => {
            error!("Request read timeout");
            return Err(ServerError::Timeout);
        }
        Err(protocol::ProtocolError::ConnectionClosed) => {
            debug!("Client disconnected before sending request");
            return Ok(());
        }
        Err(e) => {
            error!("Failed to read request: {}", e);
            return Err(ServerError::Protocol(e));
        }
    };

    debug!("Received request: {:?}", request);
    let response = handle_request(daemon, request).await;
    debug!("Sending response: {:?}", response);

    protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT)
        .await
        .map_err(ServerError::Protocol)?;

    Ok(())
}

/// Handle a single request and return a response
async fn handle_request(daemon: &mut DaemonState, request: Request) -> Response {
    let client = &daemon.client;
    match request {
        Request::Ping => Response::Pong,

        Request::Hello { version: _ } => Response::Hello {
            version: PROTOCOL_VERSION.to_string(),
        },

        Request::Submit {
            kind,
            target_type,
            payload,
        } => match client.submit(kind, &target_type, payload) {
            Ok(result) => Response::Submitted { id: result.id },
            Err(SyncError::StorageFull { capacity }) => Response::StorageFull { capacity },
            Err(e) => Response::Error {
                message: e.to_string(),
            },
        },

        Request::Status => Response::Status {
            status: client.status(),
        },

        Request::DeadLetters => Response::DeadLetters {
            operations: client.dead_letters(),
        },

        Request::Requeue { id } => match client.requeue_dead_letter(&id) {
            Ok(requeued) => Response::Requeued { requeued },
            Err(e) => Response::Error {
                message: e.to_string(),
            },
        },

        Request::SyncNow => {
            client.sync_and_wait(SYNC_WAIT).await;
            Response::Status {
                status: client.status(),
            }
        }

        Request::ReportLink { up } => {
            client.monitor().report_link(up);
            Response::Ok
        }

        Request::Shutdown => {
            daemon.shutdown_requested = true;
            Response::ShuttingDown
        }
    }
}

/// Server errors
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] protocol::ProtocolError),

    #[error("Request timeout")]
    Timeout,
}
