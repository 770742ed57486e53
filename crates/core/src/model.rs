// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Command Server Project

//! Wire-facing snapshots of executor and job state.

use std::path::PathBuf;

use crate::id::{ExecutorId, JobId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorStatus {
    Loading,
    Running,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ExecutorState {
    pub status: ExecutorStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl ExecutorState {
    pub const fn loading() -> Self {
        Self { status: ExecutorStatus::Loading, exit_code: None }
    }

    pub const fn running() -> Self {
        Self { status: ExecutorStatus::Running, exit_code: None }
    }

    pub const fn closed(exit_code: i32) -> Self {
        Self { status: ExecutorStatus::Closed, exit_code: Some(exit_code) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ExecutorInfo {
    pub id: ExecutorId,
    pub cwd: PathBuf,
    pub command: String,
    pub args: Vec<String>,
    pub state: ExecutorState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct JobState {
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl JobState {
    pub const fn running() -> Self {
        Self { status: JobStatus::Running, exit_code: None }
    }

    pub const fn done(exit_code: Option<i32>) -> Self {
        Self { status: JobStatus::Done, exit_code }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct JobInfo {
    pub id: JobId,
    pub executor_id: ExecutorId,
    pub cwd: PathBuf,
    pub args: Vec<String>,
    pub state: JobState,
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
