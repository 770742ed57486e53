// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Command Server Project

//! Named-pipe and file-descriptor plumbing: the runtime directory, scoped
//! FIFO handles, and the coalescing multi-open used to hand a child its
//! stdio triple.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use nix::sys::stat::Mode;
use nix::unistd::mkfifo as nix_mkfifo;
use tokio::fs::{File, OpenOptions};

#[derive(Debug, thiserror::Error)]
pub enum FifoError {
    #[error("failed to create fifo at {path}: {cause}")]
    FifoCreateFailed { path: PathBuf, cause: String },

    #[error("failed to open {path}: {cause}")]
    FileOpenFailed { path: PathBuf, cause: String },
}

impl FifoError {
    pub fn into_core(self, kind_for_open: cmdserv_core::FileErrorType) -> cmdserv_core::FileError {
        match self {
            Self::FifoCreateFailed { path, cause } => cmdserv_core::FileError {
                kind: cmdserv_core::FileErrorType::CreateFailed,
                path,
                detail: cause,
            },
            Self::FileOpenFailed { path, cause } => {
                cmdserv_core::FileError { kind: kind_for_open, path, detail: cause }
            }
        }
    }
}

/// Resolve the runtime directory, creating it if absent:
/// `$XDG_RUNTIME_DIR/command-server`, falling back to
/// `$HOME/.cache/command-server`.
pub fn runtime_dir() -> std::io::Result<PathBuf> {
    let base = std::env::var_os("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".cache")))
        .unwrap_or_else(|| PathBuf::from("/tmp"));
    let dir = base.join("command-server");
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// A named pipe created under the runtime directory, unlinked when dropped.
#[derive(Debug)]
pub struct TempFifo {
    path: PathBuf,
}

impl TempFifo {
    /// Create a new FIFO named `<rundir>/<pid>.<random>.<hint>.pipe`.
    pub fn create(rundir: &Path, hint: &str) -> Result<Self, FifoError> {
        let name = format!("{}.{}.{}.pipe", std::process::id(), nanoid::nanoid!(8), hint);
        let path = rundir.join(name);
        nix_mkfifo(&path, Mode::from_bits_truncate(0o600)).map_err(|e| {
            FifoError::FifoCreateFailed { path: path.clone(), cause: e.to_string() }
        })?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the daemon-side end for reading. Blocks (on a worker thread)
    /// until the peer opens its end.
    pub async fn open_read(&self) -> Result<File, FifoError> {
        open_file(&self.path, OpenMode::Read).await
    }

    /// Open the daemon-side end for writing.
    pub async fn open_write(&self) -> Result<File, FifoError> {
        open_file(&self.path, OpenMode::Write).await
    }
}

impl Drop for TempFifo {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenMode {
    Read,
    Write,
    ReadWrite,
}

impl OpenMode {
    fn union(self, other: Self) -> Self {
        if self == other {
            return self;
        }
        Self::ReadWrite
    }
}

/// Open one path in the given mode. For a FIFO, blocks until the peer end
/// is opened; dispatched to a blocking-safe task so the async runtime stays
/// responsive.
pub async fn open_file(path: &Path, mode: OpenMode) -> Result<File, FifoError> {
    let mut opts = OpenOptions::new();
    match mode {
        OpenMode::Read => {
            opts.read(true);
        }
        OpenMode::Write => {
            opts.write(true);
        }
        OpenMode::ReadWrite => {
            opts.read(true).write(true);
        }
    }
    opts.open(path)
        .await
        .map_err(|e| FifoError::FileOpenFailed { path: path.to_path_buf(), cause: e.to_string() })
}

/// Open several `(path, mode)` pairs, coalescing duplicate paths by
/// OR-ing their modes, all-or-nothing: any failure closes everything
/// already opened and returns the error for the failing path.
pub async fn open_multiple(
    requests: &[(PathBuf, OpenMode)],
) -> Result<HashMap<PathBuf, File>, FifoError> {
    let mut coalesced: Vec<(PathBuf, OpenMode)> = Vec::new();
    for (path, mode) in requests {
        if let Some(existing) = coalesced.iter_mut().find(|(p, _)| p == path) {
            existing.1 = existing.1.union(*mode);
        } else {
            coalesced.push((path.clone(), *mode));
        }
    }

    let mut opened = HashMap::new();
    for (path, mode) in coalesced {
        match open_file(&path, mode).await {
            Ok(file) => {
                opened.insert(path, file);
            }
            Err(err) => {
                // opened handles drop here, closing their fds.
                drop(opened);
                return Err(err);
            }
        }
    }
    Ok(opened)
}

#[cfg(test)]
#[path = "fifo_tests.rs"]
mod tests;
