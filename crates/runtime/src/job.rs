// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Command Server Project

//! A single job: one child process spawned by an [`Executor`] on the
//! daemon's behalf, tracked until its exit code is known.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::fs::File;
use tokio::sync::watch;

use cmdserv_core::{ExecutorId, JobId, Signal, SignalTranslator};
use cmdserv_wire::TokenReader;

use crate::executor::to_nix_signal;
use crate::fifo::TempFifo;

#[derive(Debug, Clone, PartialEq, Eq)]
enum JobPhase {
    Running,
    Done(Option<i32>),
}

/// A running (or finished) job, bound to a pid and an exit-code future
/// that starts reading the moment the job is constructed.
pub struct Job {
    pub id: JobId,
    pub executor_id: ExecutorId,
    pub pid: u32,
    pub cwd: PathBuf,
    pub args: Vec<String>,
    signal_translator: SignalTranslator,
    phase: watch::Sender<JobPhase>,
}

impl Job {
    /// Construct a job and immediately spawn the background task that
    /// reads its exit code off `exit_reader`, unlinking `exit_fifo` the
    /// moment that read completes.
    pub fn spawn(
        id: JobId,
        executor_id: ExecutorId,
        pid: u32,
        cwd: PathBuf,
        args: Vec<String>,
        signal_translator: SignalTranslator,
        exit_fifo: TempFifo,
        exit_reader: File,
    ) -> Arc<Self> {
        let (phase_tx, _phase_rx) = watch::channel(JobPhase::Running);
        let job = Arc::new(Self { id, executor_id, pid, cwd, args, signal_translator, phase: phase_tx });

        tokio::spawn({
            let phase_tx = job.phase.clone();
            let job_id = job.id;
            async move {
                let _exit_fifo = exit_fifo;
                let mut reader = TokenReader::new(exit_reader);
                let code = match reader.read_int().await {
                    Ok(Ok(n)) => Some(n as i32),
                    Ok(Err(raw)) => {
                        tracing::warn!(job_id = %job_id, raw, "job exit token was not an integer");
                        None
                    }
                    Err(err) => {
                        tracing::warn!(job_id = %job_id, error = %err, "failed reading job exit code");
                        None
                    }
                };
                let _ = phase_tx.send(JobPhase::Done(code));
            }
        });

        job
    }

    /// Translate `logical` through the owning executor's signal map and
    /// deliver it to the job's pid. Delivery failures are swallowed and
    /// logged, since the process may have already exited. Returns the
    /// signal that was actually sent.
    pub fn signal(&self, logical: Signal) -> Signal {
        let effective = self.signal_translator.translate(logical);
        let pid = nix::unistd::Pid::from_raw(self.pid as i32);
        if let Err(err) = nix::sys::signal::kill(pid, to_nix_signal(effective)) {
            tracing::info!(job_id = %self.id, signal = %effective, error = %err, "signal delivery failed (process may have exited)");
        }
        effective
    }

    /// Await the job's exit code; `None` on EOF or a non-integer token.
    pub async fn wait(&self) -> Option<i32> {
        let mut rx = self.phase.subscribe();
        loop {
            if let JobPhase::Done(code) = &*rx.borrow() {
                return *code;
            }
            if rx.changed().await.is_err() {
                return None;
            }
        }
    }

    /// If still running, signal TERM and await exit; otherwise this is a
    /// no-op beyond awaiting the already-resolved exit code.
    pub async fn close(&self) -> Option<i32> {
        if matches!(&*self.phase.subscribe().borrow(), JobPhase::Running) {
            self.signal(Signal::Term);
        }
        self.wait().await
    }

    pub fn is_running(&self) -> bool {
        matches!(&*self.phase.subscribe().borrow(), JobPhase::Running)
    }

    /// The job's exit code if it has finished; `None` while running or if
    /// its exit token failed to parse.
    pub fn exit_code(&self) -> Option<i32> {
        match &*self.phase.subscribe().borrow() {
            JobPhase::Done(code) => *code,
            JobPhase::Running => None,
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
