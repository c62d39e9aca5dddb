// Copyright (c) The stbt-batch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-run classification of captured output.
//!
//! Once the child has exited and its streams are frozen, a small set of
//! independent checks runs over the captured text: each looks for one known
//! failure signature and, where it matches, gathers a diagnostic artifact or
//! delegates to the hardware diagnostics. The checks are not mutually
//! exclusive (a run can show a match timeout *and* leave a crash dump), and
//! every one of them is best-effort: classification never fails a run.

mod backtrace;
mod hardware;
pub mod signatures;

use crate::{
    config::BatchConfig,
    runner::RunOutcome,
    stream_tee::CapturedStream,
};
use batch_metadata::TEMPLATE_FILE;
use camino::Utf8Path;

/// Everything the classification checks need to know about the run.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ClassifyContext<'a> {
    /// The run's result directory (also the child's working directory).
    pub(crate) run_dir: &'a Utf8Path,
    /// The test command's program, for the debugger.
    pub(crate) program: &'a str,
    /// Configuration view, for the capture-backend identifier.
    pub(crate) config: &'a BatchConfig,
}

/// Runs every classification check over the frozen captures, recording what
/// they find in `outcome`.
pub(crate) async fn classify_run(
    cx: &ClassifyContext<'_>,
    stdout: &CapturedStream,
    stderr: &CapturedStream,
    outcome: &mut RunOutcome,
) {
    if signatures::match_timeout(stdout.text()) {
        match signatures::last_searched_template(stdout.text()) {
            Some(template) => save_template(cx.run_dir, template, outcome),
            None => tracing::debug!("match timeout without a searched-template line"),
        }
    }

    if signatures::no_video(stdout.text()) || signatures::no_video(stderr.text()) {
        hardware::diagnose(cx, stdout, stderr, outcome).await;
    }

    if let Some(backtrace) = backtrace::inspect_core_dump(cx.run_dir, cx.program) {
        outcome.set_backtrace_path(backtrace);
    }
}

/// Copies the implicated reference image into the result directory as
/// `template.png`. The image may have been deleted since the test ran; that
/// just means no artifact.
fn save_template(run_dir: &Utf8Path, template: &str, outcome: &mut RunOutcome) {
    let template = Utf8Path::new(template);
    let source = if template.is_absolute() {
        template.to_owned()
    } else {
        // The test ran with the result directory as its working directory,
        // so relative template paths resolve against it.
        run_dir.join(template)
    };
    if !source.exists() {
        tracing::debug!("template `{source}` no longer exists; not saving it");
        return;
    }

    let dest = run_dir.join(TEMPLATE_FILE);
    match std::fs::copy(&source, &dest) {
        Ok(_) => outcome.set_template_path(dest),
        Err(err) => tracing::warn!("failed to save template `{source}`: {err}"),
    }
}
