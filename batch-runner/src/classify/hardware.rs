// Copyright (c) The stbt-batch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hardware diagnostics for the loss-of-video signature.
//!
//! When the test reports no video, the question is whether the capture
//! hardware itself is at fault (in which case re-running the test is
//! pointless and the run must be marked unrecoverable) or whether the
//! failure is transient and a retry is worthwhile. The answer depends on
//! which capture backend is configured; the harness only *detects*
//! contention for the device, it never arbitrates it.

use super::{ClassifyContext, signatures};
use crate::{
    runner::{FailureReason, RunOutcome},
    stream_tee::{CapturedStream, StreamName, StreamTee},
};
use batch_metadata::DECKLINK_LOG_FILE;
use std::process::Stdio;
use std::time::Duration;

/// How long the isolated Blackmagic diagnostic pipeline is left running.
/// Long enough for a working card to deliver dozens of frames.
const PROBE_DURATION: Duration = Duration::from_secs(1);

/// Device nodes the Blackmagic driver exposes.
const DECKLINK_DEV_PREFIX: &str = "/dev/blackmagic";

/// Classifies a loss-of-video failure against the configured capture
/// backend, marking `outcome` unrecoverable when the hardware is at fault.
pub(super) async fn diagnose(
    cx: &ClassifyContext<'_>,
    stdout: &CapturedStream,
    stderr: &CapturedStream,
    outcome: &mut RunOutcome,
) {
    match cx.config.get_string_lenient("global.source").as_deref() {
        Some("v4l2src") => diagnose_v4l2(stdout, stderr, outcome),
        Some("decklinksrc") => diagnose_decklink(cx, outcome).await,
        Some(backend) => {
            tracing::warn!("no video reported, but capture backend `{backend}` has no diagnostics");
        }
        None => {
            tracing::warn!("no video reported, but no capture backend is configured");
        }
    }
}

/// A USB capture device that has disappeared shows up in the failure log
/// itself; there is nothing further to probe.
fn diagnose_v4l2(stdout: &CapturedStream, stderr: &CapturedStream, outcome: &mut RunOutcome) {
    if signatures::device_missing(stdout.text()) || signatures::device_missing(stderr.text()) {
        outcome.set_failure_reason(FailureReason::manual(
            "video capture device is gone: v4l2src reported \"Cannot identify device\"",
        ));
        outcome.mark_unrecoverable();
    } else {
        tracing::debug!("no video but the v4l2 device is still present; leaving the run retryable");
    }
}

async fn diagnose_decklink(cx: &ClassifyContext<'_>, outcome: &mut RunOutcome) {
    let Some(probe_log) = probe_decklink(cx).await else {
        return;
    };
    apply_decklink_verdict(&probe_log, device_holders(DECKLINK_DEV_PREFIX), outcome);
}

/// The pure decision over a finished probe log.
fn apply_decklink_verdict(probe_log: &str, holders: Vec<String>, outcome: &mut RunOutcome) {
    if signatures::probe_input_failed(probe_log) {
        let reason = if holders.is_empty() {
            "decklink card is in use by another process".to_owned()
        } else {
            format!("decklink card is in use by: {}", holders.join(", "))
        };
        outcome.set_failure_reason(FailureReason::manual(reason));
        outcome.mark_unrecoverable();
    } else if !signatures::probe_frame_arrived(probe_log) {
        outcome.set_failure_reason(FailureReason::manual(
            "decklink card is wedged: no frames arrived during a 1s probe",
        ));
        outcome.mark_unrecoverable();
    } else {
        tracing::debug!("decklink probe saw frames arrive; not a hardware failure");
    }
}

/// Runs an isolated ~1 second pipeline against the card with verbose
/// backend logging, teeing the driver chatter into `decklinksrc.log`.
/// Returns the captured log text, or `None` if the probe couldn't run.
async fn probe_decklink(cx: &ClassifyContext<'_>) -> Option<String> {
    let pipeline = cx
        .config
        .get_string_lenient("global.source_pipeline")
        .unwrap_or_else(|| "decklinksrc".to_owned());

    let mut cmd = tokio::process::Command::new("gst-launch-1.0");
    cmd.args(pipeline.split_whitespace())
        .args(["!", "fakesink"])
        .env("GST_DEBUG", "decklinksrc:5")
        .env("GST_DEBUG_NO_COLOR", "1")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("gst-launch-1.0 not present; skipping decklink probe");
            return None;
        }
        Err(err) => {
            tracing::warn!("failed to start decklink probe: {err}");
            return None;
        }
    };

    // The driver's debug chatter goes to stderr.
    let stderr = child.stderr.take().expect("stderr was piped");
    let log_path = cx.run_dir.join(DECKLINK_LOG_FILE);
    let tee = match StreamTee::create(StreamName::Stderr, stderr, &log_path, false).await {
        Ok(tee) => tee,
        Err(err) => {
            tracing::warn!("failed to create decklink probe log: {err}");
            return None;
        }
    };

    let teardown = async {
        // The pipeline runs until told to stop; give the card a second to
        // prove frames are arriving, then tear it down.
        let _ = tokio::time::timeout(PROBE_DURATION, child.wait()).await;
        let _ = child.start_kill();
        let _ = child.wait().await;
    };
    let (captured, ()) = tokio::join!(tee.drain(), teardown);

    match captured {
        Ok(captured) => Some(captured.text().to_owned()),
        Err(err) => {
            tracing::warn!("decklink probe capture failed: {err}");
            None
        }
    }
}

/// Enumerates processes holding one of the card's device nodes open, by
/// inspecting open-file ownership under `/proc`.
#[cfg(unix)]
fn device_holders(dev_prefix: &str) -> Vec<String> {
    let Ok(proc_entries) = std::fs::read_dir("/proc") else {
        return Vec::new();
    };

    let mut holders = Vec::new();
    for entry in proc_entries.flatten() {
        let name = entry.file_name();
        let Some(pid) = name.to_str().and_then(|s| s.parse::<u32>().ok()) else {
            continue;
        };
        let Ok(fds) = std::fs::read_dir(entry.path().join("fd")) else {
            // Not ours to inspect (or the process just exited).
            continue;
        };
        for fd in fds.flatten() {
            let Ok(target) = std::fs::read_link(fd.path()) else {
                continue;
            };
            if target.to_string_lossy().starts_with(dev_prefix) {
                let comm = std::fs::read_to_string(entry.path().join("comm")).unwrap_or_default();
                holders.push(format!("{} (pid {pid})", comm.trim()));
                break;
            }
        }
    }
    holders.sort();
    holders
}

#[cfg(not(unix))]
fn device_holders(_dev_prefix: &str) -> Vec<String> {
    Vec::new()
}
