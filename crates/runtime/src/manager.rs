// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Command Server Project

//! The lifecycle engine: the single owner of the executor/job registries,
//! the reload state machine, and the concurrency cap.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{Mutex as AsyncMutex, Semaphore};
use tokio_util::sync::CancellationToken;

use cmdserv_core::{
    BaseExecutorConfig, ExecutorConfigOverrides, ExecutorId, ExecutorInfo, ExecutorState, FileErrorType,
    JobApiError, JobId, JobInfo, JobState, JobStatus, Signal, Stdio,
};
use cmdserv_wire::TokenWriter;

use crate::executor::{self, Executor, ExecutorPhase, StartJobError};
use crate::fifo::{self, OpenMode};
use crate::job::Job;

pub struct ManagerConfig {
    pub concurrency: usize,
    pub rundir: PathBuf,
    pub base_executor_config: BaseExecutorConfig,
}

/// Owns every executor and job the daemon knows about, and serializes the
/// reload state machine behind `reload_lock`.
pub struct ExecutorManager {
    executors: RwLock<HashMap<ExecutorId, Arc<Executor>>>,
    jobs: RwLock<HashMap<JobId, Arc<Job>>>,
    current_executor_id: RwLock<Option<ExecutorId>>,
    reloading_executor_id: RwLock<Option<ExecutorId>>,
    reload_lock: AsyncMutex<()>,
    semaphore: Arc<Semaphore>,
    shutdown: CancellationToken,
    rundir: PathBuf,
    base_config: RwLock<BaseExecutorConfig>,
}

impl ExecutorManager {
    pub fn new(config: ManagerConfig) -> Arc<Self> {
        Arc::new(Self {
            executors: RwLock::new(HashMap::new()),
            jobs: RwLock::new(HashMap::new()),
            current_executor_id: RwLock::new(None),
            reloading_executor_id: RwLock::new(None),
            reload_lock: AsyncMutex::new(()),
            semaphore: Arc::new(Semaphore::new(config.concurrency.max(1))),
            shutdown: CancellationToken::new(),
            rundir: config.rundir,
            base_config: RwLock::new(config.base_executor_config),
        })
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    fn get_executor(&self, id: ExecutorId) -> Result<Arc<Executor>, JobApiError> {
        self.executors.read().get(&id).cloned().ok_or(JobApiError::ExecutorNotFound(id))
    }

    /// Apply `config_overrides` on top of the base config, spawn a new
    /// executor, and kick off its readiness wait in the background.
    /// Returns the new executor's (still-LOADING) info.
    pub async fn reload_executor(
        self: &Arc<Self>,
        stdio: Stdio,
        config_overrides: ExecutorConfigOverrides,
    ) -> Result<ExecutorInfo, JobApiError> {
        let _guard = self.reload_lock.lock().await;

        let config = {
            let base = self.base_config.read();
            base.apply_overrides(&config_overrides).map_err(JobApiError::InvalidExecutorConfig)?
        };

        if let Some(active) = *self.reloading_executor_id.read() {
            return Err(JobApiError::ExecutorReloadActive(active));
        }

        let id = ExecutorId::new();
        let executor = executor::make_executor(id, config, stdio.clone(), &self.rundir)
            .await
            .map_err(|err| match err {
                executor::ExecutorStartError::File(fe) => {
                    JobApiError::FileError(fe.into_core(FileErrorType::OpenFailed))
                }
                executor::ExecutorStartError::Spawn(detail) => JobApiError::FileError(
                    cmdserv_core::FileError {
                        kind: FileErrorType::OpenFailed,
                        path: PathBuf::from(config_overrides.cwd.clone().unwrap_or_default()),
                        detail,
                    },
                ),
            })?;

        self.executors.write().insert(id, Arc::clone(&executor));
        *self.reloading_executor_id.write() = Some(id);

        let manager = Arc::clone(self);
        let status_pipe = stdio.status_pipe.clone();
        let executor_for_task = Arc::clone(&executor);
        tokio::spawn(async move {
            match executor_for_task.wait_ready().await {
                Ok(()) => {
                    *manager.current_executor_id.write() = Some(id);
                }
                Err(exit_code) => {
                    write_status_pipe(&status_pipe, exit_code).await;
                }
            }
            *manager.reloading_executor_id.write() = None;
        });

        Ok(snapshot_executor(&executor))
    }

    /// Cancel a LOADING executor by delivering `signal` and awaiting its
    /// close.
    pub async fn cancel_reload(&self, id: ExecutorId, signal: Signal) -> Result<ExecutorInfo, JobApiError> {
        let executor = self.get_executor(id)?;
        if executor.phase() != ExecutorPhase::Loading {
            return Err(JobApiError::ExecutorAlreadyLoaded(id));
        }
        executor.cleanup(signal).await;
        Ok(snapshot_executor(&executor))
    }

    /// Await the named (or currently-reloading) executor's readiness.
    pub async fn wait_for_reload(&self, id: Option<ExecutorId>) -> Result<ExecutorInfo, JobApiError> {
        let id = match id.or_else(|| *self.reloading_executor_id.read()) {
            Some(id) => id,
            None => return Err(JobApiError::ExecutorNotFound(ExecutorId::new())),
        };
        let executor = self.get_executor(id)?;
        match executor.wait_ready().await {
            Ok(()) => Ok(snapshot_executor(&executor)),
            Err(exit_code) => Err(JobApiError::ExecutorReloadFailed {
                executor_id: id,
                detail: format!("executor exited with code {exit_code} before becoming ready"),
            }),
        }
    }

    /// Start a job on the current executor, queueing on the concurrency
    /// cap (first-come-first-served via the semaphore's own wake order)
    /// if it is exhausted. A caller stuck on that queue when the server
    /// shuts down never gets a job id; its status pipe is written
    /// `128 + SIGINT` instead.
    pub async fn start_job(
        self: &Arc<Self>,
        cwd: PathBuf,
        args: Vec<String>,
        stdio: Stdio,
    ) -> Result<JobInfo, JobApiError> {
        let permit = tokio::select! {
            biased;
            () = self.shutdown.cancelled() => None,
            permit = Arc::clone(&self.semaphore).acquire_owned() => permit.ok(),
        };

        let Some(permit) = permit else {
            write_status_pipe(&stdio.status_pipe, 128 + Signal::Int.number()).await;
            return Err(JobApiError::ExecutorNotRunning(ExecutorId::new()));
        };

        let current_id = (*self.current_executor_id.read())
            .ok_or_else(|| JobApiError::ExecutorNotRunning(ExecutorId::new()))?;
        let executor = self.get_executor(current_id)?;
        if executor.phase() != ExecutorPhase::Running {
            return Err(JobApiError::ExecutorNotRunning(current_id));
        }

        let job_id = JobId::new();
        let job = executor.start_job(job_id, cwd, args, stdio.clone()).await.map_err(|err| match err {
            StartJobError::File(fe) => JobApiError::FileError(fe.into_core(FileErrorType::OpenFailed)),
            StartJobError::NonIntegerPid(raw) => JobApiError::JobStartFailed {
                executor_id: current_id,
                detail: format!("executor replied with non-integer pid: {raw:?}"),
            },
        })?;

        self.jobs.write().insert(job_id, Arc::clone(&job));

        let status_pipe = stdio.status_pipe;
        let job_for_task = Arc::clone(&job);
        tokio::spawn(async move {
            let code = job_for_task.wait().await.unwrap_or(-1);
            write_status_pipe(&status_pipe, code).await;
            drop(permit);
        });

        Ok(snapshot_job(&job))
    }

    pub fn signal_job(&self, id: JobId, signal: Signal) -> Result<Signal, JobApiError> {
        let job = self.jobs.read().get(&id).cloned().ok_or(JobApiError::JobNotFound(id))?;
        Ok(job.signal(signal))
    }

    pub async fn wait_for_job(&self, id: JobId) -> Result<i32, JobApiError> {
        let job = self.jobs.read().get(&id).cloned().ok_or(JobApiError::JobNotFound(id))?;
        Ok(job.wait().await.unwrap_or(-1))
    }

    /// Signal the serving loop to stop; teardown happens in [`Self::teardown`].
    pub fn stop_server(&self) {
        self.shutdown.cancel();
    }

    /// Close every job and executor. Run once the serving loop has
    /// observed the shutdown token.
    pub async fn teardown(&self) {
        self.shutdown.cancel();

        let jobs: Vec<Arc<Job>> = self.jobs.read().values().cloned().collect();
        let job_closes = jobs.into_iter().map(|job| tokio::spawn(async move { job.close().await }));
        for handle in job_closes {
            let _ = handle.await;
        }

        let executors: Vec<Arc<Executor>> = self.executors.read().values().cloned().collect();
        let executor_closes =
            executors.into_iter().map(|ex| tokio::spawn(async move { ex.cleanup(Signal::Term).await }));
        for handle in executor_closes {
            let _ = handle.await;
        }
    }

    pub fn list_jobs(&self, include_completed: bool) -> HashMap<JobId, JobInfo> {
        self.jobs
            .read()
            .values()
            .filter(|job| include_completed || job.is_running())
            .map(|job| (job.id, snapshot_job(job)))
            .collect()
    }

    pub fn list_executors(&self, include_closed: bool) -> HashMap<ExecutorId, ExecutorInfo> {
        self.executors
            .read()
            .values()
            .filter(|ex| include_closed || !matches!(ex.phase(), ExecutorPhase::Closed { .. }))
            .map(|ex| (ex.id, snapshot_executor(ex)))
            .collect()
    }
}

fn snapshot_executor(executor: &Executor) -> ExecutorInfo {
    let state = match executor.phase() {
        ExecutorPhase::Loading => ExecutorState::loading(),
        ExecutorPhase::Running => ExecutorState::running(),
        ExecutorPhase::Closed { exit_code } => ExecutorState::closed(exit_code),
    };
    ExecutorInfo {
        id: executor.id,
        cwd: executor.config.cwd.clone(),
        command: executor.config.command.clone(),
        args: executor.config.args.clone(),
        state,
    }
}

fn snapshot_job(job: &Job) -> JobInfo {
    let state =
        if job.is_running() { JobState { status: JobStatus::Running, exit_code: None } } else { JobState::done(job.exit_code()) };
    JobInfo { id: job.id, executor_id: job.executor_id, cwd: job.cwd.clone(), args: job.args.clone(), state }
}

/// Best-effort: open `path` and write `value` as a single integer token.
/// Failures are logged, never propagated — the status-pipe contract is a
/// notification, not a request/response.
async fn write_status_pipe(path: &std::path::Path, value: i32) {
    match fifo::open_file(path, OpenMode::Write).await {
        Ok(file) => {
            let mut writer = TokenWriter::new(file);
            if let Err(err) = writer.write(&[&value.to_string()]).await {
                tracing::info!(path = %path.display(), error = %err, "failed writing status pipe");
            }
        }
        Err(err) => {
            tracing::info!(path = %path.display(), error = %err, "failed opening status pipe");
        }
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
