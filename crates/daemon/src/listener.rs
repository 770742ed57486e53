// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Command Server Project

//! Unix-socket accept loop translating wire [`Request`]s into
//! [`ExecutorManager`] calls.

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;

use cmdserv_runtime::ExecutorManager;
use cmdserv_wire::{Envelope, ErrorBody, Request, Response};

const MAX_FRAME_BYTES: u32 = 16 * 1024 * 1024;

/// Accept connections until `shutdown` fires. Each connection handles
/// exactly one request/response round trip, matching the control plane's
/// request-response contract.
pub async fn run(listener: UnixListener, manager: Arc<ExecutorManager>, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            biased;
            () = shutdown.cancelled() => {
                tracing::info!("listener shutting down");
                return;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _addr)) => {
                        let manager = Arc::clone(&manager);
                        tokio::spawn(async move {
                            if let Err(err) = handle_connection(stream, &manager).await {
                                tracing::warn!(error = %err, "connection handling failed");
                            }
                        });
                    }
                    Err(err) => tracing::error!(error = %err, "accept failed"),
                }
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum ConnectionError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed request: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("request frame of {0} bytes exceeds the {MAX_FRAME_BYTES}-byte limit")]
    FrameTooLarge(u32),
}

async fn handle_connection(mut stream: UnixStream, manager: &Arc<ExecutorManager>) -> Result<(), ConnectionError> {
    let payload = read_frame(&mut stream).await?;
    let request: Request = serde_json::from_slice(&payload)?;
    tracing::info!(?request, "received request");

    let envelope = dispatch(manager, request).await;
    let body = serde_json::to_vec(&envelope).unwrap_or_else(|_| b"{}".to_vec());
    write_frame(&mut stream, &body).await?;
    Ok(())
}

async fn dispatch(manager: &Arc<ExecutorManager>, request: Request) -> Envelope {
    let result = match request {
        Request::JobStart { cwd, args, stdio } => {
            manager.start_job(cwd, args, stdio).await.map(|job| Response::Job { job })
        }
        Request::JobSignal { id, signal } => {
            manager.signal_job(id, signal).map(|actual_signal| Response::Signalled { actual_signal })
        }
        Request::JobWait { id } => {
            manager.wait_for_job(id).await.map(|exit_code| Response::ExitCode { exit_code })
        }
        Request::ExecutorReload { stdio, config_overrides } => manager
            .reload_executor(stdio, config_overrides)
            .await
            .map(|executor| Response::Executor { executor }),
        Request::ExecutorCancelReload { id, signal } => {
            manager.cancel_reload(id, signal).await.map(|executor| Response::Executor { executor })
        }
        Request::ExecutorWaitReady { id } => {
            manager.wait_for_reload(id).await.map(|executor| Response::Executor { executor })
        }
        Request::CommandServerStop => {
            manager.stop_server();
            Ok(Response::Stopped)
        }
        Request::CommandServerListJobs { include_completed } => {
            Ok(Response::Jobs { jobs: manager.list_jobs(include_completed) })
        }
        Request::CommandServerListExecutors { include_closed } => {
            Ok(Response::Executors { executors: manager.list_executors(include_closed) })
        }
    };

    match result {
        Ok(response) => Envelope::Ok(response),
        Err(err) => Envelope::Err(ErrorBody::from(&err)),
    }
}

async fn read_frame(stream: &mut UnixStream) -> Result<Vec<u8>, ConnectionError> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_BYTES {
        return Err(ConnectionError::FrameTooLarge(len));
    }
    let mut payload = vec![0u8; len as usize];
    stream.read_exact(&mut payload).await?;
    Ok(payload)
}

async fn write_frame(stream: &mut UnixStream, payload: &[u8]) -> Result<(), ConnectionError> {
    let len = (payload.len() as u32).to_be_bytes();
    stream.write_all(&len).await?;
    stream.write_all(payload).await?;
    stream.flush().await?;
    Ok(())
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
