// Copyright (c) The stbt-batch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Basic tests for the batch runner.
//!
//! These drive real child processes through the full run lifecycle and
//! assert on the result directory left behind. The fixtures are shell
//! one-liners, so the whole file is Unix-only.

#![cfg(unix)]

use batch_metadata::{
    DURATION_FILE, EXIT_STATUS_FILE, FAILURE_REASON_FILE, FAILURE_REASON_MANUAL_FILE,
    RunSummary, STDERR_LOG_FILE, STDOUT_LOG_FILE, TEMPLATE_FILE, TEST_ARGS_FILE, TEST_NAME_FILE,
    UNRECOVERABLE_ERROR_FILE, VERSION_FILE,
};
use batch_runner::{
    config::BatchConfig,
    errors::RunError,
    run_store::{RunDir, RunStore},
    runner::{BatchRunner, BatchRunnerBuilder, RunOutcome, RunRequest},
    signal::SignalGuardKind,
};
use camino::Utf8Path;
use camino_tempfile::Utf8TempDir;
use pretty_assertions::assert_eq;

/// A request that runs `script` through the shell.
fn sh_request(script: &str) -> RunRequest {
    let mut request = RunRequest::new("/bin/sh", vec!["-c".to_owned(), script.to_owned()]);
    request.set_html_report(false);
    request
}

/// An explicit empty config, so ambient `stbt.conf` files can't leak in.
fn empty_config(dir: &Utf8Path) -> BatchConfig {
    config_from(dir, "")
}

fn config_from(dir: &Utf8Path, contents: &str) -> BatchConfig {
    let path = dir.join("stbt.conf");
    std::fs::write(&path, contents).unwrap();
    BatchConfig::from_sources(Some(path.as_path())).unwrap()
}

/// Writes an executable hook script and returns its path.
fn write_script(dir: &Utf8Path, name: &str, contents: &str) -> camino::Utf8PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Runs `request` in a fresh run directory under `output`, with the
/// standard guard replaced by a no-op.
fn run_in(
    output: &Utf8Path,
    request: &RunRequest,
    config: &BatchConfig,
) -> (RunDir, Result<RunOutcome, RunError>) {
    let store = RunStore::new(output, None).unwrap();
    let run_dir = store.create_run_dir().unwrap();
    run_dir.write_intro_files(request, None).unwrap();

    let mut builder = BatchRunnerBuilder::default();
    builder.set_signal_guard(SignalGuardKind::Noop);
    let runner = builder.build(request, config, &run_dir).unwrap();
    let result = runner.execute();

    store.mark_latest(&run_dir).unwrap();
    (run_dir, result)
}

fn read(run_dir: &RunDir, name: &str) -> String {
    std::fs::read_to_string(run_dir.path().join(name))
        .unwrap_or_else(|err| panic!("reading {name}: {err}"))
}

#[test]
fn passing_run_writes_the_required_files() {
    let output = Utf8TempDir::new().unwrap();
    let config = empty_config(output.path());

    let request = sh_request("echo all good");
    let (run_dir, result) = run_in(output.path(), &request, &config);
    let outcome = result.unwrap();

    assert!(outcome.is_success());
    assert_eq!(outcome.exit_status(), 0);
    assert_eq!(read(&run_dir, EXIT_STATUS_FILE), "0\n");
    assert_eq!(
        read(&run_dir, VERSION_FILE),
        format!("{}\n", BatchRunner::VERSION)
    );
    let _: u64 = read(&run_dir, DURATION_FILE).trim().parse().unwrap();

    // Captured output is timestamp-prefixed.
    let stdout_log = read(&run_dir, STDOUT_LOG_FILE);
    assert!(stdout_log.starts_with('['), "stamped: {stdout_log:?}");
    assert!(stdout_log.trim_end().ends_with("all good"));
    assert_eq!(read(&run_dir, STDERR_LOG_FILE), "");

    // Intro files describe what was run.
    assert_eq!(read(&run_dir, TEST_NAME_FILE).trim_end(), "/bin/sh");
    assert!(read(&run_dir, TEST_ARGS_FILE).starts_with("-c\n"));

    // A clean pass leaves no failure artifacts behind.
    assert!(!run_dir.path().join(FAILURE_REASON_FILE).exists());
    assert!(!run_dir.path().join(UNRECOVERABLE_ERROR_FILE).exists());
    assert!(!run_dir.path().join(TEMPLATE_FILE).exists());

    let summary = RunSummary::from_result_dir(run_dir.path()).unwrap();
    assert!(summary.is_success());
    assert!(!summary.unrecoverable);
    assert_eq!(summary.failure_reason, None);

    // `latest` points at the finished run.
    let latest = std::fs::read_link(output.path().join("latest")).unwrap();
    assert_eq!(latest.to_str().unwrap(), run_dir.name());
}

#[test]
fn failing_run_records_the_exit_status_verbatim() {
    let output = Utf8TempDir::new().unwrap();
    let config = empty_config(output.path());

    let (run_dir, result) = run_in(output.path(), &sh_request("exit 7"), &config);
    let outcome = result.unwrap();

    assert!(!outcome.is_success());
    assert_eq!(outcome.exit_status(), 7);
    assert_eq!(read(&run_dir, EXIT_STATUS_FILE), "7\n");
    // A plain test failure is not classified as anything.
    assert!(!run_dir.path().join(FAILURE_REASON_FILE).exists());
    assert!(!run_dir.path().join(UNRECOVERABLE_ERROR_FILE).exists());
}

#[test]
fn duration_reflects_the_child_running_time() {
    let output = Utf8TempDir::new().unwrap();
    let config = empty_config(output.path());

    let (run_dir, result) = run_in(output.path(), &sh_request("sleep 1"), &config);
    let outcome = result.unwrap();

    assert!(outcome.duration_secs() >= 1);
    let recorded: u64 = read(&run_dir, DURATION_FILE).trim().parse().unwrap();
    assert_eq!(recorded, outcome.duration_secs());
}

#[test]
fn streams_are_captured_separately() {
    let output = Utf8TempDir::new().unwrap();
    let config = empty_config(output.path());

    let script = "echo on stdout; echo on stderr >&2";
    let (run_dir, result) = run_in(output.path(), &sh_request(script), &config);
    result.unwrap();

    let stdout_log = read(&run_dir, STDOUT_LOG_FILE);
    let stderr_log = read(&run_dir, STDERR_LOG_FILE);
    assert!(stdout_log.contains("on stdout") && !stdout_log.contains("on stderr"));
    assert!(stderr_log.contains("on stderr") && !stderr_log.contains("on stdout"));
    for line in stdout_log.lines().chain(stderr_log.lines()) {
        assert!(line.starts_with('['), "unstamped line: {line:?}");
    }
}

#[test]
fn match_timeout_saves_the_template_image() {
    let output = Utf8TempDir::new().unwrap();
    let config = empty_config(output.path());

    let store = RunStore::new(output.path(), None).unwrap();
    let run_dir = store.create_run_dir().unwrap();
    // The reference image the test was searching for, in the run's working
    // directory.
    std::fs::write(run_dir.path().join("banner.png"), b"\x89PNG fake image data").unwrap();

    let request = sh_request(
        "printf 'FAIL: test: MatchTimeout\\nSearching for banner.png\\n'; exit 1",
    );
    let mut builder = BatchRunnerBuilder::default();
    builder.set_signal_guard(SignalGuardKind::Noop);
    let runner = builder.build(&request, &config, &run_dir).unwrap();
    let outcome = runner.execute().unwrap();

    assert_eq!(outcome.exit_status(), 1);
    let template = outcome.template_path().expect("template was saved");
    assert_eq!(template, run_dir.path().join(TEMPLATE_FILE));
    assert_eq!(
        std::fs::read(template).unwrap(),
        std::fs::read(run_dir.path().join("banner.png")).unwrap()
    );
    assert!(RunSummary::from_result_dir(run_dir.path()).unwrap().has_template);
}

#[test]
fn the_last_searched_template_wins() {
    let output = Utf8TempDir::new().unwrap();
    let config = empty_config(output.path());

    let store = RunStore::new(output.path(), None).unwrap();
    let run_dir = store.create_run_dir().unwrap();
    std::fs::write(run_dir.path().join("first.png"), b"first").unwrap();
    std::fs::write(run_dir.path().join("second.png"), b"second").unwrap();

    let request = sh_request(
        "printf 'Searching for first.png\\nSearching for second.png\\nMatchTimeout\\n'; exit 1",
    );
    let mut builder = BatchRunnerBuilder::default();
    builder.set_signal_guard(SignalGuardKind::Noop);
    let runner = builder.build(&request, &config, &run_dir).unwrap();
    runner.execute().unwrap();

    assert_eq!(
        std::fs::read(run_dir.path().join(TEMPLATE_FILE)).unwrap(),
        b"second"
    );
}

#[test]
fn a_deleted_template_is_not_an_error() {
    let output = Utf8TempDir::new().unwrap();
    let config = empty_config(output.path());

    let request =
        sh_request("printf 'MatchTimeout\\nSearching for vanished.png\\n'; exit 1");
    let (run_dir, result) = run_in(output.path(), &request, &config);
    let outcome = result.unwrap();

    assert_eq!(outcome.exit_status(), 1);
    assert_eq!(outcome.template_path(), None);
    assert!(!run_dir.path().join(TEMPLATE_FILE).exists());
}

#[test]
fn hooks_fire_in_lifecycle_order() {
    let output = Utf8TempDir::new().unwrap();
    let witness = output.path().join("hook-witness");
    let hook = write_script(
        output.path(),
        "hook.sh",
        &format!("#!/bin/sh\necho \"$1\" >> {witness}\n"),
    );
    let config = config_from(
        output.path(),
        &format!("[batch]\npre_run = \"{hook}\"\npost_run = \"{hook}\"\n"),
    );

    let (_run_dir, result) = run_in(output.path(), &sh_request("true"), &config);
    result.unwrap();

    assert_eq!(std::fs::read_to_string(&witness).unwrap(), "start\nstop\n");
}

#[test]
fn failed_recovery_marks_the_run_unrecoverable() {
    let output = Utf8TempDir::new().unwrap();
    let recover = write_script(output.path(), "recover.sh", "#!/bin/sh\nexit 1\n");
    let config = config_from(output.path(), &format!("[batch]\nrecover = \"{recover}\"\n"));

    let (run_dir, result) = run_in(output.path(), &sh_request("exit 3"), &config);
    let outcome = result.unwrap();

    // The original exit status is preserved; only the unrecoverable flag
    // changes.
    assert_eq!(outcome.exit_status(), 3);
    assert!(outcome.unrecoverable());
    assert_eq!(read(&run_dir, EXIT_STATUS_FILE), "3\n");
    assert!(run_dir.path().join(UNRECOVERABLE_ERROR_FILE).exists());
}

#[test]
fn successful_recovery_leaves_the_run_retryable() {
    let output = Utf8TempDir::new().unwrap();
    let recover = write_script(output.path(), "recover.sh", "#!/bin/sh\nexit 0\n");
    let config = config_from(output.path(), &format!("[batch]\nrecover = \"{recover}\"\n"));

    let (run_dir, result) = run_in(output.path(), &sh_request("exit 3"), &config);
    let outcome = result.unwrap();

    assert!(!outcome.unrecoverable());
    assert!(!run_dir.path().join(UNRECOVERABLE_ERROR_FILE).exists());
}

#[test]
fn recovery_does_not_run_after_a_pass() {
    let output = Utf8TempDir::new().unwrap();
    let witness = output.path().join("recover-witness");
    let recover = write_script(
        output.path(),
        "recover.sh",
        &format!("#!/bin/sh\ntouch {witness}\n"),
    );
    let config = config_from(output.path(), &format!("[batch]\nrecover = \"{recover}\"\n"));

    let (_run_dir, result) = run_in(output.path(), &sh_request("true"), &config);
    result.unwrap();

    assert!(!witness.exists(), "recover hook ran after a passing test");
}

#[test]
fn a_gone_usb_capture_device_is_unrecoverable() {
    let output = Utf8TempDir::new().unwrap();
    let config = config_from(output.path(), "[global]\nsource = \"v4l2src\"\n");

    let script = "echo 'stbt.NoVideo: No video'; \
                  echo \"v4l2src0: Cannot identify device '/dev/video0'.\" >&2; exit 1";
    let (run_dir, result) = run_in(output.path(), &sh_request(script), &config);
    let outcome = result.unwrap();

    assert!(outcome.unrecoverable());
    let reason = read(&run_dir, FAILURE_REASON_FILE);
    assert!(reason.contains("Cannot identify device"), "reason: {reason:?}");
    // A human has to plug the device back in.
    assert_eq!(read(&run_dir, FAILURE_REASON_MANUAL_FILE), reason);
    assert!(run_dir.path().join(UNRECOVERABLE_ERROR_FILE).exists());
}

#[test]
fn no_video_with_an_unknown_backend_is_recorded_but_not_classified() {
    let output = Utf8TempDir::new().unwrap();
    let config = config_from(output.path(), "[global]\nsource = \"fancysrc\"\n");

    let (run_dir, result) = run_in(
        output.path(),
        &sh_request("echo 'stbt.NoVideo: No video'; exit 1"),
        &config,
    );
    let outcome = result.unwrap();

    assert_eq!(outcome.exit_status(), 1);
    assert!(!outcome.unrecoverable());
    assert!(!run_dir.path().join(FAILURE_REASON_FILE).exists());
}

#[test]
fn launch_failure_is_distinct_from_a_test_failure() {
    let output = Utf8TempDir::new().unwrap();
    let config = empty_config(output.path());

    let mut request = RunRequest::new("/nonexistent/stbt-test-binary", vec![]);
    request.set_html_report(false);
    let (run_dir, result) = run_in(output.path(), &request, &config);

    assert!(matches!(result, Err(RunError::Launch(_))));
    // Nothing beyond the intro files was written: the run never started.
    assert!(!run_dir.path().join(EXIT_STATUS_FILE).exists());
    assert!(!run_dir.path().join(DURATION_FILE).exists());
}

#[test]
fn termination_signal_does_not_interrupt_result_writing() {
    let output = Utf8TempDir::new().unwrap();
    let config = empty_config(output.path());

    let store = RunStore::new(output.path(), None).unwrap();
    let run_dir = store.create_run_dir().unwrap();
    let request = sh_request("sleep 1; echo survived");

    // The standard guard, exactly as a production run installs it.
    let runner = BatchRunnerBuilder::default()
        .build(&request, &config, &run_dir)
        .unwrap();

    // Deliver SIGTERM to ourselves while the child is still sleeping. The
    // guard absorbs it; the run must finish and write its results.
    let killer = std::thread::spawn(|| {
        std::thread::sleep(std::time::Duration::from_millis(300));
        unsafe {
            libc::kill(std::process::id() as i32, libc::SIGTERM);
        }
    });
    let outcome = runner.execute().unwrap();
    killer.join().unwrap();

    assert_eq!(outcome.exit_status(), 0);
    assert_eq!(read(&run_dir, EXIT_STATUS_FILE), "0\n");
    assert!(read(&run_dir, STDOUT_LOG_FILE).contains("survived"));
}
