// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Command Server Project

//! Daemon entry point: parse CLI args, load config, install signal
//! handlers, and run the request listener until told to stop.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::UnixListener;

use cmdserv_daemon::{config, listener};
use cmdserv_runtime::{runtime_dir, ExecutorManager, ManagerConfig};

/// A persistent command-execution server.
#[derive(Debug, Parser)]
#[command(name = "command-serverd", version)]
struct Args {
    /// Path of the Unix socket to listen on.
    socket_path: PathBuf,

    /// Path of the TOML config file.
    config_file: PathBuf,

    /// Arguments to pass to the executor program, overriding the config
    /// file's `[executor] args`.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    executor_args: Vec<String>,

    /// Override the config file's `[core] log_level`.
    #[arg(long)]
    log_level: Option<String>,

    /// Override the config file's `[core] log_file`.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match config::load(
        &args.config_file,
        config::CliOverrides {
            log_level: args.log_level,
            log_file: args.log_file,
            executor_args: args.executor_args,
        },
    ) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("command-serverd: {err}");
            std::process::exit(1);
        }
    };

    let _log_guard = init_logging(&config);
    set_command_server_lib();
    let exit_signal = run(args.socket_path, config).await;
    std::process::exit(exit_signal.clamp(0, 255));
}

/// Exports `COMMAND_SERVER_LIB`, pointing at the `lib/` directory shipped
/// next to this binary, for helper scripts the executor program may
/// source. Process-wide state, set once at startup; subprocesses spawned
/// afterward inherit it.
fn set_command_server_lib() {
    let lib_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("lib")))
        .unwrap_or_else(|| PathBuf::from("lib"));
    std::env::set_var("COMMAND_SERVER_LIB", lib_dir);
}

/// Returns the number of the signal that stopped the daemon, 0 on a
/// clean `command_server.stop` shutdown, or 128 if the socket bind
/// itself failed.
async fn run(socket_path: PathBuf, config: config::DaemonConfig) -> i32 {
    if socket_path.exists() {
        let _ = std::fs::remove_file(&socket_path);
    }
    let unix_listener = match UnixListener::bind(&socket_path) {
        Ok(listener) => listener,
        Err(err) => {
            let message = format!(
                "command-serverd: failed to bind socket at {}: {err}",
                socket_path.display()
            );
            eprintln!("{message}");
            tracing::error!(path = %socket_path.display(), error = %err, "failed to bind socket");
            return 128;
        }
    };

    let rundir = runtime_dir().unwrap_or_else(|_| std::env::temp_dir().join("command-server"));
    let manager = ExecutorManager::new(ManagerConfig {
        concurrency: config.max_concurrency,
        rundir,
        base_executor_config: config.base_executor_config,
    });
    let shutdown = manager.shutdown_token();

    let listener_task = tokio::spawn(listener::run(unix_listener, Arc::clone(&manager), shutdown.clone()));

    let terminating_signal = tokio::select! {
        signal = wait_for_terminating_signal() => signal,
        () = shutdown.cancelled() => 0,
    };

    manager.stop_server();
    let _ = listener_task.await;
    manager.teardown().await;
    let _ = std::fs::remove_file(&socket_path);

    terminating_signal
}

/// Races SIGTERM/SIGINT/SIGQUIT/SIGHUP, returning the POSIX number of
/// whichever arrives first.
async fn wait_for_terminating_signal() -> i32 {
    use tokio::signal::unix::{signal, SignalKind};

    let installed = (|| -> std::io::Result<_> {
        Ok((
            signal(SignalKind::terminate())?,
            signal(SignalKind::interrupt())?,
            signal(SignalKind::quit())?,
            signal(SignalKind::hangup())?,
        ))
    })();

    let Ok((mut term, mut int, mut quit, mut hup)) = installed else {
        tracing::error!("failed to install signal handlers");
        return cmdserv_core::Signal::Term.number();
    };

    tokio::select! {
        _ = term.recv() => cmdserv_core::Signal::Term.number(),
        _ = int.recv() => cmdserv_core::Signal::Int.number(),
        _ = quit.recv() => cmdserv_core::Signal::Quit.number(),
        _ = hup.recv() => cmdserv_core::Signal::Hup.number(),
    }
}

fn init_logging(config: &config::DaemonConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    match &config.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new().create(true).append(true).open(path).ok()?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer).init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}
