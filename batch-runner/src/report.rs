// Copyright (c) The stbt-batch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Invocation of the external HTML report generator.
//!
//! The harness does not generate reports itself; it only decides *when* the
//! companion `report` tool runs. All invocations are best-effort: a host
//! without the tool installed still produces a complete result directory.

use camino::{Utf8Path, Utf8PathBuf};

/// How the report generator should be invoked.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReportMode {
    /// Regenerate the HTML report around the run.
    Html,

    /// Only (re)classify the run's results, without regenerating HTML.
    /// Invoked once after diagnostics are written, regardless of whether
    /// HTML reporting is enabled.
    ClassifyOnly,
}

/// Locates and invokes the companion report tool.
#[derive(Clone, Debug)]
pub struct ReportGenerator {
    program: Utf8PathBuf,
}

impl ReportGenerator {
    /// The report tool's location relative to the tool root.
    pub const REPORT_TOOL: &'static str = "stbt-batch.d/report";

    /// Creates a generator for the tools installed under `tool_root`.
    pub fn new(tool_root: &Utf8Path) -> Self {
        Self {
            program: tool_root.join(Self::REPORT_TOOL),
        }
    }

    /// Runs the report tool against `run_dir`. Best-effort: a missing tool
    /// is a debug-level no-op, any other failure a warning.
    pub fn generate(&self, mode: ReportMode, run_dir: &Utf8Path) {
        let mode_arg = match mode {
            ReportMode::Html => "--html-only",
            ReportMode::ClassifyOnly => "--classify-only",
        };
        let result = duct::cmd(self.program.as_std_path(), [mode_arg, run_dir.as_str()])
            .stdin_null()
            .unchecked()
            .run();
        match result {
            Ok(output) if output.status.success() => {}
            Ok(output) => {
                tracing::warn!(
                    "report generator `{}` exited with {}",
                    self.program,
                    output.status
                );
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("report generator `{}` not present; skipping", self.program);
            }
            Err(err) => {
                tracing::warn!("failed to run report generator `{}`: {err}", self.program);
            }
        }
    }
}
