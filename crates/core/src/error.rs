// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Command Server Project

//! The stable error vocabulary the control plane reports back to callers.
//!
//! Numeric codes are part of the wire contract and must not be renumbered.

use std::path::PathBuf;

use crate::id::{ExecutorId, JobId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileErrorType {
    CreateFailed,
    OpenFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, serde::Serialize, serde::Deserialize)]
#[error("{kind:?} for {path}: {detail}")]
pub struct FileError {
    pub kind: FileErrorType,
    pub path: PathBuf,
    pub detail: String,
}

/// Errors the job API surfaces to control-plane callers, each carrying the
/// numeric code the original implementation assigned it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobApiError {
    #[error("job {0} not found")]
    JobNotFound(JobId),

    #[error("executor {0} not found")]
    ExecutorNotFound(ExecutorId),

    #[error("executor {0} is already loaded")]
    ExecutorAlreadyLoaded(ExecutorId),

    #[error("a reload is already in progress for executor {0}")]
    ExecutorReloadActive(ExecutorId),

    #[error("reload failed for executor {executor_id}: {detail}")]
    ExecutorReloadFailed { executor_id: ExecutorId, detail: String },

    #[error("executor {0} is not running")]
    ExecutorNotRunning(ExecutorId),

    #[error(transparent)]
    FileError(#[from] FileError),

    #[error("failed to start job on executor {executor_id}: {detail}")]
    JobStartFailed { executor_id: ExecutorId, detail: String },

    #[error("invalid executor config: {0}")]
    InvalidExecutorConfig(String),
}

impl JobApiError {
    /// The stable numeric code for this error, matching the original
    /// implementation's `JobApiErrorCode` values.
    pub const fn code(&self) -> u32 {
        match self {
            Self::JobNotFound(_) => 33001,
            Self::ExecutorNotFound(_) => 33002,
            Self::ExecutorAlreadyLoaded(_) => 33003,
            Self::ExecutorReloadActive(_) => 33004,
            Self::ExecutorReloadFailed { .. } => 33005,
            Self::ExecutorNotRunning(_) => 33006,
            Self::FileError(_) => 33007,
            Self::JobStartFailed { .. } => 33008,
            Self::InvalidExecutorConfig(_) => 33009,
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
