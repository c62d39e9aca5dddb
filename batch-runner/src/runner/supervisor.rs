// Copyright (c) The stbt-batch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Supervision of the test child process.
//!
//! The supervisor owns the child's whole lifetime: it wires both output
//! pipes before the exec, drains them through concurrent tees while the
//! child runs, and joins on child-exit plus both drained tees before
//! returning -- so by the time anything downstream looks at the logs, every
//! byte is on disk.

use crate::{
    errors::{LaunchError, RunError},
    runner::RunRequest,
    stream_tee::{CapturedStream, StreamName, StreamTee},
    time,
};
use batch_metadata::{SENSORS_LOG_FILE, STDERR_LOG_FILE, STDOUT_LOG_FILE};
use camino::Utf8Path;
use std::process::Stdio;

pub(super) struct Supervisor<'a> {
    request: &'a RunRequest,
    run_dir: &'a Utf8Path,
}

/// What the supervisor knows once the child has exited and both streams are
/// drained.
pub(super) struct SupervisedExit {
    pub(super) exit_status: i32,
    pub(super) duration_secs: u64,
    pub(super) stdout: CapturedStream,
    pub(super) stderr: CapturedStream,
}

impl<'a> Supervisor<'a> {
    pub(super) fn new(request: &'a RunRequest, run_dir: &'a Utf8Path) -> Self {
        Self { request, run_dir }
    }

    pub(super) async fn run(&self) -> Result<SupervisedExit, RunError> {
        let mut cmd = tokio::process::Command::new(self.request.program());
        cmd.args(self.request.args())
            .current_dir(self.run_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // The child gets its own process group, like any job-control shell
        // would arrange. Termination is the caller's business; the harness
        // never signals the child itself.
        #[cfg(unix)]
        cmd.process_group(0);

        let stopwatch = time::stopwatch();
        let mut child = cmd
            .spawn()
            .map_err(|err| LaunchError::new(self.request.command_line(), err))?;
        tracing::debug!(
            start_time = %stopwatch.start_time(),
            "launched `{}`",
            self.request.command_line()
        );

        let stdout_pipe = child.stdout.take().expect("stdout was piped");
        let stderr_pipe = child.stderr.take().expect("stderr was piped");
        let stdout_tee = StreamTee::create(
            StreamName::Stdout,
            stdout_pipe,
            &self.run_dir.join(STDOUT_LOG_FILE),
            self.request.verbosity() >= 1,
        )
        .await;
        let stderr_tee = StreamTee::create(
            StreamName::Stderr,
            stderr_pipe,
            &self.run_dir.join(STDERR_LOG_FILE),
            self.request.verbosity() >= 2,
        )
        .await;
        let (stdout_tee, stderr_tee) = match (stdout_tee, stderr_tee) {
            (Ok(stdout_tee), Ok(stderr_tee)) => (stdout_tee, stderr_tee),
            (Err(err), _) | (_, Err(err)) => {
                // A capture log we can't create is fatal, and the child has
                // already been spawned: take it down before reporting.
                let _ = child.start_kill();
                let _ = child.wait().await;
                return Err(err.into());
            }
        };

        // The join point: child exit plus both tees drained to end-of-input.
        let (stdout, stderr, status) =
            tokio::join!(stdout_tee.drain(), stderr_tee.drain(), child.wait());
        let status = status.map_err(RunError::Wait)?;
        let stdout = stdout?;
        let stderr = stderr?;
        let snapshot = stopwatch.snapshot();

        let exit_status = exit_status_of(status);
        tracing::debug!(
            "test exited with status {exit_status} after {}s",
            snapshot.whole_seconds()
        );

        collect_sensors(self.run_dir);

        Ok(SupervisedExit {
            exit_status,
            duration_secs: snapshot.whole_seconds(),
            stdout,
            stderr,
        })
    }
}

/// The child's termination status as the integer recorded in `exit-status`:
/// its exit code verbatim, or 128 + the signal number for a signal death.
fn exit_status_of(status: std::process::ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(code) = status.code() {
            code
        } else if let Some(signal) = status.signal() {
            128 + signal
        } else {
            1
        }
    }
    #[cfg(not(unix))]
    {
        status.code().unwrap_or(1)
    }
}

/// Best-effort dump of the host's hardware sensors alongside the run. A
/// host without the `sensors` tool simply doesn't get one.
fn collect_sensors(run_dir: &Utf8Path) {
    let no_args: [&str; 0] = [];
    match duct::cmd("sensors", no_args)
        .stdin_null()
        .stderr_to_stdout()
        .stdout_capture()
        .unchecked()
        .run()
    {
        Ok(output) => {
            let path = run_dir.join(SENSORS_LOG_FILE);
            if let Err(err) = std::fs::write(&path, &output.stdout) {
                tracing::warn!("failed to write {SENSORS_LOG_FILE}: {err}");
            }
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("no `sensors` tool on this host; skipping");
        }
        Err(err) => {
            tracing::warn!("failed to run sensors: {err}");
        }
    }
}
