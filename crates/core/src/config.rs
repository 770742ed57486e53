// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Command Server Project

//! Executor configuration and the override/merge rules `executor.reload`
//! applies on top of the daemon's base config.

use std::path::PathBuf;

use crate::signal::SignalTranslator;

/// Fully resolved configuration for one executor instance: everything
/// needed to spawn and run it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    pub cwd: PathBuf,
    pub command: String,
    pub args: Vec<String>,
    pub signal_translator: SignalTranslator,
}

/// The daemon-wide defaults for an executor, some of which may be `None`
/// until overridden by a particular `executor.reload` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseExecutorConfig {
    pub cwd: Option<PathBuf>,
    pub command: String,
    pub args: Vec<String>,
    pub signal_translator: SignalTranslator,
}

impl BaseExecutorConfig {
    /// Merge per-reload overrides onto the base config. `cwd` must resolve
    /// to *something* (base or override) or the config is invalid.
    pub fn apply_overrides(
        &self,
        overrides: &ExecutorConfigOverrides,
    ) -> Result<ExecutorConfig, String> {
        let cwd = overrides
            .cwd
            .clone()
            .or_else(|| self.cwd.clone())
            .ok_or_else(|| "cwd must be specified".to_string())?;

        let args = overrides.args.clone().unwrap_or_else(|| self.args.clone());

        Ok(ExecutorConfig {
            cwd,
            command: self.command.clone(),
            args,
            signal_translator: self.signal_translator.clone(),
        })
    }
}

/// Partial overrides a caller may supply on `executor.reload`.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ExecutorConfigOverrides {
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    #[serde(default)]
    pub args: Option<Vec<String>>,
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
