use super::*;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use cmdserv_core::{ExecutorConfigOverrides, Stdio};
use cmdserv_runtime::ManagerConfig;

fn write_stub_executor(dir: &std::path::Path) -> PathBuf {
    let script = dir.join("stub-executor.sh");
    std::fs::write(
        &script,
        r#"#!/bin/bash
set -u
write_fifo="$1"
read_fifo="$2"
exec 3>"$read_fifo"
exec 4<"$write_fifo"
echo "0" >&3
while IFS= read -r -u 4 cwd && IFS= read -r -u 4 stdin_p && IFS= read -r -u 4 stdout_p \
    && IFS= read -r -u 4 stderr_p && IFS= read -r -u 4 exit_fifo && IFS= read -r -u 4 nargs; do
  args=()
  for ((i = 0; i < nargs; i++)); do
    IFS= read -r -u 4 a
    args+=("$a")
  done
  ( cd "$cwd" && "${args[@]}" < "$stdin_p" > "$stdout_p" 2> "$stderr_p"
    echo $? > "$exit_fifo" ) &
  child_pid=$!
  echo "$child_pid" >&3
done
"#,
    )
    .expect("write stub");
    let mut perms = std::fs::metadata(&script).expect("meta").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&script, perms).expect("chmod");
    script
}

fn seeded_stdio(dir: &std::path::Path, prefix: &str) -> Stdio {
    let stdin = dir.join(format!("{prefix}-stdin"));
    let stdout = dir.join(format!("{prefix}-stdout"));
    let stderr = dir.join(format!("{prefix}-stderr"));
    std::fs::write(&stdin, b"").expect("seed");
    std::fs::write(&stdout, b"").expect("seed");
    std::fs::write(&stderr, b"").expect("seed");
    Stdio { stdin, stdout, stderr, status_pipe: dir.join(format!("{prefix}-status")) }
}

async fn roundtrip(socket_path: &std::path::Path, request: &Request) -> Envelope {
    let mut stream = UnixStream::connect(socket_path).await.expect("connect");
    let body = serde_json::to_vec(request).expect("encode request");
    write_frame(&mut stream, &body).await.expect("write frame");
    let response = read_frame(&mut stream).await.expect("read frame");
    serde_json::from_slice(&response).expect("decode envelope")
}

#[tokio::test]
async fn job_start_wait_and_list_round_trip_over_the_socket() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = write_stub_executor(dir.path());
    let rundir = dir.path().join("run");
    std::fs::create_dir_all(&rundir).expect("rundir");

    let manager = ExecutorManager::new(ManagerConfig {
        concurrency: 2,
        rundir,
        base_executor_config: cmdserv_core::BaseExecutorConfig {
            cwd: Some(dir.path().to_path_buf()),
            command: script.to_string_lossy().into_owned(),
            args: Vec::new(),
            signal_translator: cmdserv_core::SignalTranslator::default(),
        },
    });

    let socket_path = dir.path().join("command-server.sock");
    let unix_listener = UnixListener::bind(&socket_path).expect("bind");
    let shutdown = manager.shutdown_token();
    let listener_task = tokio::spawn(run(unix_listener, Arc::clone(&manager), shutdown.clone()));

    let reload = roundtrip(
        &socket_path,
        &Request::ExecutorReload {
            stdio: seeded_stdio(dir.path(), "reload"),
            config_overrides: ExecutorConfigOverrides::default(),
        },
    )
    .await;
    let Envelope::Ok(Response::Executor { executor }) = reload else {
        panic!("unexpected reload response: {reload:?}");
    };

    let ready = roundtrip(&socket_path, &Request::ExecutorWaitReady { id: Some(executor.id) }).await;
    assert!(matches!(ready, Envelope::Ok(Response::Executor { .. })));

    let start = roundtrip(
        &socket_path,
        &Request::JobStart {
            cwd: dir.path().to_path_buf(),
            args: vec!["sh".to_string(), "-c".to_string(), "exit 4".to_string()],
            stdio: seeded_stdio(dir.path(), "job"),
        },
    )
    .await;
    let Envelope::Ok(Response::Job { job }) = start else {
        panic!("unexpected job.start response: {start:?}");
    };

    let wait = roundtrip(&socket_path, &Request::JobWait { id: job.id }).await;
    assert!(matches!(wait, Envelope::Ok(Response::ExitCode { exit_code: 4 })));

    let jobs = roundtrip(&socket_path, &Request::CommandServerListJobs { include_completed: true }).await;
    let Envelope::Ok(Response::Jobs { jobs }) = jobs else { panic!("unexpected list-jobs response") };
    assert!(jobs.contains_key(&job.id));

    let stop = roundtrip(&socket_path, &Request::CommandServerStop).await;
    assert!(matches!(stop, Envelope::Ok(Response::Stopped)));
    let _ = listener_task.await;
}

#[tokio::test]
async fn job_wait_on_unknown_id_returns_job_not_found() {
    let dir = tempfile::tempdir().expect("tempdir");
    let rundir = dir.path().join("run");
    std::fs::create_dir_all(&rundir).expect("rundir");

    let manager = ExecutorManager::new(ManagerConfig {
        concurrency: 1,
        rundir,
        base_executor_config: cmdserv_core::BaseExecutorConfig {
            cwd: Some(dir.path().to_path_buf()),
            command: "/bin/true".to_string(),
            args: Vec::new(),
            signal_translator: cmdserv_core::SignalTranslator::default(),
        },
    });

    let socket_path = dir.path().join("command-server.sock");
    let unix_listener = UnixListener::bind(&socket_path).expect("bind");
    let shutdown = manager.shutdown_token();
    tokio::spawn(run(unix_listener, Arc::clone(&manager), shutdown));

    let response = roundtrip(&socket_path, &Request::JobWait { id: cmdserv_core::JobId::new() }).await;
    let Envelope::Err(error) = response else { panic!("expected an error envelope: {response:?}") };
    assert_eq!(error.code, cmdserv_core::JobApiError::JobNotFound(cmdserv_core::JobId::new()).code());
}
