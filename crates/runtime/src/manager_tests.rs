use super::*;
use std::os::unix::fs::PermissionsExt;

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

fn base_config(dir: &std::path::Path, script: &std::path::Path) -> BaseExecutorConfig {
    BaseExecutorConfig {
        cwd: Some(dir.to_path_buf()),
        command: script.to_string_lossy().into_owned(),
        args: Vec::new(),
        signal_translator: cmdserv_core::SignalTranslator::default(),
    }
}

#[tokio::test]
async fn reload_then_start_job_runs_to_completion_and_appears_in_list_jobs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = write_stub_executor(dir.path());
    let rundir = dir.path().join("run");
    std::fs::create_dir_all(&rundir).expect("rundir");

    let manager = ExecutorManager::new(ManagerConfig {
        concurrency: 2,
        rundir,
        base_executor_config: base_config(dir.path(), &script),
    });

    let reload_stdio = seeded_stdio(dir.path(), "reload");
    let info = manager
        .reload_executor(reload_stdio, ExecutorConfigOverrides::default())
        .await
        .expect("reload_executor");
    assert_eq!(info.state.status, cmdserv_core::ExecutorStatus::Loading);

    let ready = manager.wait_for_reload(Some(info.id)).await.expect("wait_for_reload");
    assert_eq!(ready.state.status, cmdserv_core::ExecutorStatus::Running);

    let job_stdio = seeded_stdio(dir.path(), "job");
    let job_info = manager
        .start_job(
            dir.path().to_path_buf(),
            vec!["sh".to_string(), "-c".to_string(), "exit 9".to_string()],
            job_stdio,
        )
        .await
        .expect("start_job");

    let exit_code = manager.wait_for_job(job_info.id).await.expect("wait_for_job");
    assert_eq!(exit_code, 9);

    let jobs = manager.list_jobs(true);
    assert!(jobs.contains_key(&job_info.id));

    let executors = manager.list_executors(true);
    assert!(executors.contains_key(&info.id));

    manager.teardown().await;
}

#[tokio::test]
async fn start_job_fails_with_no_current_executor() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = write_stub_executor(dir.path());
    let rundir = dir.path().join("run");
    std::fs::create_dir_all(&rundir).expect("rundir");

    let manager = ExecutorManager::new(ManagerConfig {
        concurrency: 1,
        rundir,
        base_executor_config: base_config(dir.path(), &script),
    });

    let stdio = seeded_stdio(dir.path(), "no-exec");
    let err = manager.start_job(dir.path().to_path_buf(), Vec::new(), stdio).await.unwrap_err();
    assert!(matches!(err, JobApiError::ExecutorNotRunning(_)));
}

#[tokio::test]
async fn second_reload_while_one_is_loading_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = dir.path().join("slow-ready.sh");
    std::fs::write(&script, "#!/bin/bash\nexec 3>\"$2\"\nsleep 30\necho 0 >&3\n").expect("write");
    let mut perms = std::fs::metadata(&script).expect("meta").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&script, perms).expect("chmod");

    let rundir = dir.path().join("run");
    std::fs::create_dir_all(&rundir).expect("rundir");

    let manager = ExecutorManager::new(ManagerConfig {
        concurrency: 1,
        rundir,
        base_executor_config: base_config(dir.path(), &script),
    });

    let first = manager
        .reload_executor(seeded_stdio(dir.path(), "first"), ExecutorConfigOverrides::default())
        .await
        .expect("first reload");
    assert_eq!(first.state.status, cmdserv_core::ExecutorStatus::Loading);

    let err = manager
        .reload_executor(seeded_stdio(dir.path(), "second"), ExecutorConfigOverrides::default())
        .await
        .unwrap_err();
    assert!(matches!(err, JobApiError::ExecutorReloadActive(id) if id == first.id));

    manager.cancel_reload(first.id, Signal::Term).await.expect("cancel_reload");
}

#[tokio::test]
async fn missing_cwd_in_overrides_and_base_is_invalid_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = write_stub_executor(dir.path());
    let rundir = dir.path().join("run");
    std::fs::create_dir_all(&rundir).expect("rundir");

    let mut config = base_config(dir.path(), &script);
    config.cwd = None;

    let manager =
        ExecutorManager::new(ManagerConfig { concurrency: 1, rundir, base_executor_config: config });

    let err = manager
        .reload_executor(seeded_stdio(dir.path(), "bad"), ExecutorConfigOverrides::default())
        .await
        .unwrap_err();
    assert!(matches!(err, JobApiError::InvalidExecutorConfig(_)));
}
