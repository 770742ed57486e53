// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Command Server Project

//! The control-plane request/response envelope exchanged over the Unix
//! socket: one JSON object per connection, tagged by `method`.

use std::collections::HashMap;

use cmdserv_core::{ExecutorConfigOverrides, ExecutorId, ExecutorInfo, JobId, JobInfo, Signal, Stdio};
use serde::{Deserialize, Serialize};

/// One control-plane call, tagged by its `method` name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "kebab-case")]
pub enum Request {
    #[serde(rename = "job.start")]
    JobStart { cwd: std::path::PathBuf, args: Vec<String>, stdio: Stdio },

    #[serde(rename = "job.signal")]
    JobSignal { id: JobId, signal: Signal },

    #[serde(rename = "job.wait")]
    JobWait { id: JobId },

    #[serde(rename = "executor.reload")]
    ExecutorReload { stdio: Stdio, config_overrides: ExecutorConfigOverrides },

    #[serde(rename = "executor.cancel-reload")]
    ExecutorCancelReload { id: ExecutorId, signal: Signal },

    #[serde(rename = "executor.wait-ready")]
    ExecutorWaitReady {
        #[serde(default)]
        id: Option<ExecutorId>,
    },

    #[serde(rename = "command_server.stop")]
    CommandServerStop,

    #[serde(rename = "command_server.list-jobs")]
    CommandServerListJobs { include_completed: bool },

    #[serde(rename = "command_server.list-executors")]
    CommandServerListExecutors { include_closed: bool },
}

/// The matching `result` payload for a successful [`Request`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result")]
pub enum Response {
    Job { job: JobInfo },
    Signalled { actual_signal: Signal },
    ExitCode { exit_code: i32 },
    Executor { executor: ExecutorInfo },
    Stopped,
    Jobs { jobs: HashMap<JobId, JobInfo> },
    Executors { executors: HashMap<ExecutorId, ExecutorInfo> },
}

/// Wire-level error body: a stable numeric `code` plus a human message,
/// mirroring [`cmdserv_core::JobApiError::code`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: u32,
    pub message: String,
}

impl From<&cmdserv_core::JobApiError> for ErrorBody {
    fn from(err: &cmdserv_core::JobApiError) -> Self {
        Self { code: err.code(), message: err.to_string() }
    }
}

/// The full envelope written back to the caller for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Envelope {
    Ok(Response),
    Err(ErrorBody),
}

#[cfg(test)]
#[path = "control_tests.rs"]
mod tests;
