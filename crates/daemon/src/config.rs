// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Command Server Project

//! TOML config file parsing and CLI-argument precedence.
//!
//! Precedence is CLI args > config file > built-in default, mirroring the
//! original Python daemon's `server_config.py`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use cmdserv_core::{BaseExecutorConfig, Signal, SignalTranslator};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {cause}")]
    Read { path: PathBuf, cause: String },
    #[error("failed to parse config file {path}: {cause}")]
    Parse { path: PathBuf, cause: String },
    #[error("config file {path} names an unknown signal {signal:?} in [signal_translations]")]
    UnknownSignal { path: PathBuf, signal: String },
    #[error("no executor command configured (set [executor] command in the config file)")]
    MissingCommand,
}

#[derive(Debug, Default, serde::Deserialize)]
struct FileConfig {
    #[serde(default)]
    core: CoreSection,
    #[serde(default)]
    executor: ExecutorSection,
    #[serde(default)]
    signal_translations: HashMap<String, String>,
}

#[derive(Debug, Default, serde::Deserialize)]
struct CoreSection {
    max_concurrency: Option<usize>,
    log_level: Option<String>,
    log_file: Option<PathBuf>,
}

#[derive(Debug, Default, serde::Deserialize)]
struct ExecutorSection {
    working_dir: Option<PathBuf>,
    command: Option<String>,
    #[serde(default)]
    args: Vec<String>,
}

/// Fully resolved daemon configuration, CLI overrides already folded in.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub max_concurrency: usize,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    pub base_executor_config: BaseExecutorConfig,
}

/// Overrides a caller may supply on the command line, taking precedence
/// over whatever the config file says.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
    pub executor_args: Vec<String>,
}

const DEFAULT_MAX_CONCURRENCY: usize = 4;
const DEFAULT_LOG_LEVEL: &str = "info";

pub fn load(config_path: &Path, cli: CliOverrides) -> Result<DaemonConfig, ConfigError> {
    let text = std::fs::read_to_string(config_path)
        .map_err(|e| ConfigError::Read { path: config_path.to_path_buf(), cause: e.to_string() })?;
    let file: FileConfig = toml::from_str(&text)
        .map_err(|e| ConfigError::Parse { path: config_path.to_path_buf(), cause: e.to_string() })?;

    let command = file.executor.command.ok_or(ConfigError::MissingCommand)?;
    let args = if cli.executor_args.is_empty() { file.executor.args } else { cli.executor_args };

    let mut translations = HashMap::new();
    for (logical, effective) in &file.signal_translations {
        let logical = Signal::parse(logical).ok_or_else(|| ConfigError::UnknownSignal {
            path: config_path.to_path_buf(),
            signal: logical.clone(),
        })?;
        let effective = Signal::parse(effective).ok_or_else(|| ConfigError::UnknownSignal {
            path: config_path.to_path_buf(),
            signal: effective.clone(),
        })?;
        translations.insert(logical, effective);
    }

    Ok(DaemonConfig {
        max_concurrency: file.core.max_concurrency.unwrap_or(DEFAULT_MAX_CONCURRENCY),
        log_level: cli.log_level.unwrap_or_else(|| {
            file.core.log_level.unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
        }),
        log_file: cli.log_file.or(file.core.log_file),
        base_executor_config: BaseExecutorConfig {
            cwd: file.executor.working_dir,
            command,
            args,
            signal_translator: SignalTranslator::new(translations),
        },
    })
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
