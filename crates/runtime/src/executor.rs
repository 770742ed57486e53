// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Command Server Project

//! The persistent executor subprocess: a long-lived helper program the
//! daemon talks to over a pair of FIFOs, spawning one job per
//! `start_job` call.

use std::path::{Path, PathBuf};
use std::process::Stdio as ProcStdio;
use std::sync::Arc;

use tokio::fs::File;
use tokio::process::{Child, Command};
use tokio::sync::{watch, Mutex as AsyncMutex};

use cmdserv_core::{ExecutorConfig, ExecutorId, JobId, Stdio};
use cmdserv_wire::{TokenReader, TokenWriter};

use crate::fifo::{self, FifoError, OpenMode, TempFifo};
use crate::job::Job;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutorPhase {
    Loading,
    Running,
    Closed { exit_code: i32 },
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutorStartError {
    #[error(transparent)]
    File(#[from] FifoError),
    #[error("failed to spawn executor program: {0}")]
    Spawn(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StartJobError {
    #[error(transparent)]
    File(#[from] FifoError),
    #[error("executor returned a non-integer pid: {0:?}")]
    NonIntegerPid(String),
}

/// A loaded executor subprocess plus the two FIFOs used to talk to it.
pub struct Executor {
    pub id: ExecutorId,
    pub config: ExecutorConfig,
    phase: watch::Sender<ExecutorPhase>,
    pipe: AsyncMutex<ExecutorPipe>,
    child: AsyncMutex<Child>,
    rundir: PathBuf,
}

struct ExecutorPipe {
    writer: TokenWriter<File>,
    reader: TokenReader<File>,
}

/// Construct a new executor: open its stdio, spawn the subprocess, and
/// kick off the background readiness wait. Returns immediately once the
/// subprocess has been spawned; the caller observes readiness via
/// [`Executor::wait_ready`].
pub async fn make_executor(
    id: ExecutorId,
    config: ExecutorConfig,
    stdio: Stdio,
    rundir: &Path,
) -> Result<Arc<Executor>, ExecutorStartError> {
    let opened = fifo::open_multiple(&[
        (stdio.stdin.clone(), OpenMode::Read),
        (stdio.stdout.clone(), OpenMode::Write),
        (stdio.stderr.clone(), OpenMode::Write),
    ])
    .await?;
    let mut std_opened = std::collections::HashMap::new();
    for (path, file) in opened {
        std_opened.insert(path, file.into_std().await);
    }

    let write_fifo = TempFifo::create(rundir, "exec-write")?;
    let read_fifo = TempFifo::create(rundir, "exec-read")?;

    let stdin = clone_stdio(&std_opened, &stdio.stdin);
    let stdout = clone_stdio(&std_opened, &stdio.stdout);
    let stderr = clone_stdio(&std_opened, &stdio.stderr);

    let child = Command::new(&config.command)
        .arg(write_fifo.path())
        .arg(read_fifo.path())
        .args(&config.args)
        .current_dir(&config.cwd)
        .stdin(stdin)
        .stdout(stdout)
        .stderr(stderr)
        .kill_on_drop(false)
        .spawn()
        .map_err(|e| ExecutorStartError::Spawn(e.to_string()))?;

    let (writer_file, reader_file) =
        tokio::try_join!(write_fifo.open_write(), read_fifo.open_read())?;

    let (phase_tx, _phase_rx) = watch::channel(ExecutorPhase::Loading);
    let executor = Arc::new(Executor {
        id,
        config,
        phase: phase_tx,
        pipe: AsyncMutex::new(ExecutorPipe {
            writer: TokenWriter::new(writer_file),
            reader: TokenReader::new(reader_file),
        }),
        child: AsyncMutex::new(child),
        rundir: rundir.to_path_buf(),
    });

    tokio::spawn({
        let executor = Arc::clone(&executor);
        async move {
            executor.await_ready().await;
        }
    });

    Ok(executor)
}

fn clone_stdio(opened: &std::collections::HashMap<PathBuf, std::fs::File>, path: &Path) -> ProcStdio {
    opened
        .get(path)
        .and_then(|f| f.try_clone().ok())
        .map(ProcStdio::from)
        .unwrap_or_else(ProcStdio::null)
}

impl Executor {
    /// Current lifecycle phase.
    pub fn phase(&self) -> ExecutorPhase {
        self.phase.borrow().clone()
    }

    async fn await_ready(self: Arc<Self>) {
        let ready = {
            let mut pipe = self.pipe.lock().await;
            pipe.reader.read_one().await
        };
        match ready {
            Ok(token) if token == "0" => {
                let _ = self.phase.send(ExecutorPhase::Running);
                tracing::info!(executor_id = %self.id, "executor ready");
            }
            Ok(other) => {
                let exit_code = other.parse::<i32>().unwrap_or(127);
                tracing::warn!(executor_id = %self.id, ready_status = %other, "executor never became ready");
                self.force_close(exit_code).await;
            }
            Err(err) => {
                tracing::warn!(executor_id = %self.id, error = %err, "readiness read failed");
                self.force_close(127).await;
            }
        }
    }

    async fn force_close(&self, exit_code: i32) {
        let _ = self.cleanup(cmdserv_core::Signal::Term).await;
        let _ = self.phase.send(ExecutorPhase::Closed { exit_code });
    }

    /// Await until the executor leaves LOADING. `Ok(())` if it became
    /// RUNNING; `Err(exit_code)` if it went straight to CLOSED.
    pub async fn wait_ready(&self) -> Result<(), i32> {
        let mut rx = self.phase.subscribe();
        loop {
            match &*rx.borrow() {
                ExecutorPhase::Running => return Ok(()),
                ExecutorPhase::Closed { exit_code } => return Err(*exit_code),
                ExecutorPhase::Loading => {}
            }
            if rx.changed().await.is_err() {
                return Err(127);
            }
        }
    }

    /// Await until the executor reaches CLOSED, returning its exit code.
    pub async fn wait_closed(&self) -> i32 {
        let mut rx = self.phase.subscribe();
        loop {
            if let ExecutorPhase::Closed { exit_code } = &*rx.borrow() {
                return *exit_code;
            }
            if rx.changed().await.is_err() {
                return 127;
            }
        }
    }

    /// Spawn one job on this executor: write a start-job frame, read back
    /// the child pid, and hand back a live [`Job`] reading its exit code
    /// in the background.
    pub async fn start_job(
        self: &Arc<Self>,
        id: JobId,
        cwd: PathBuf,
        args: Vec<String>,
        stdio: Stdio,
    ) -> Result<Arc<Job>, StartJobError> {
        let exit_fifo = TempFifo::create(&self.rundir, "job-exit")?;

        let cwd_str = cwd.to_string_lossy().into_owned();
        let stdin_str = stdio.stdin.to_string_lossy().into_owned();
        let stdout_str = stdio.stdout.to_string_lossy().into_owned();
        let stderr_str = stdio.stderr.to_string_lossy().into_owned();
        let exit_fifo_str = exit_fifo.path().to_string_lossy().into_owned();
        let n_args = args.len().to_string();

        let (raw, exit_reader_file) = {
            let mut pipe = self.pipe.lock().await;

            let mut frame: Vec<&str> =
                vec![&cwd_str, &stdin_str, &stdout_str, &stderr_str, &exit_fifo_str, &n_args];
            frame.extend(args.iter().map(String::as_str));
            pipe.writer.write(&frame).await.map_err(|e| {
                StartJobError::File(FifoError::FileOpenFailed {
                    path: PathBuf::from("<executor write pipe>"),
                    cause: e.to_string(),
                })
            })?;

            let exit_reader_file = exit_fifo.open_read().await?;

            let raw = pipe.reader.read_one().await.map_err(|e| {
                StartJobError::File(FifoError::FileOpenFailed {
                    path: PathBuf::from("<executor read pipe>"),
                    cause: e.to_string(),
                })
            })?;
            (raw, exit_reader_file)
        };

        let pid: u32 = raw
            .parse()
            .map_err(|_| StartJobError::NonIntegerPid(raw.clone()))?;

        Ok(Job::spawn(
            id,
            self.id,
            pid,
            cwd,
            args,
            self.config.signal_translator.clone(),
            exit_fifo,
            exit_reader_file,
        ))
    }

    /// Deliver `signal` to the subprocess and await its exit. Closing the
    /// jobs this executor originated (the `kill_jobs` half of cleanup) is
    /// the manager's responsibility, since jobs are tracked there.
    /// Idempotent: safe to call on an already-CLOSED executor.
    pub async fn cleanup(&self, signal: cmdserv_core::Signal) -> i32 {
        if let ExecutorPhase::Closed { exit_code } = self.phase() {
            return exit_code;
        }

        let pid = {
            let child = self.child.lock().await;
            child.id()
        };
        if let Some(pid) = pid {
            let nix_pid = nix::unistd::Pid::from_raw(pid as i32);
            if let Err(err) = nix::sys::signal::kill(nix_pid, to_nix_signal(signal)) {
                tracing::info!(executor_id = %self.id, error = %err, "signal delivery to executor failed");
            }
        }

        let status = {
            let mut child = self.child.lock().await;
            child.wait().await
        };
        let exit_code = status.ok().and_then(|s| s.code()).unwrap_or(128 + signal.number());
        let _ = self.phase.send(ExecutorPhase::Closed { exit_code });
        exit_code
    }
}

pub(crate) fn to_nix_signal(signal: cmdserv_core::Signal) -> nix::sys::signal::Signal {
    use cmdserv_core::Signal::*;
    match signal {
        Term => nix::sys::signal::Signal::SIGTERM,
        Int => nix::sys::signal::Signal::SIGINT,
        Hup => nix::sys::signal::Signal::SIGHUP,
        Quit => nix::sys::signal::Signal::SIGQUIT,
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
