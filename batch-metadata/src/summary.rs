// Copyright (c) The stbt-batch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    BACKTRACE_LOG_FILE, DURATION_FILE, EXIT_STATUS_FILE, FAILURE_REASON_FILE,
    FAILURE_REASON_MANUAL_FILE, RunSummaryReadError, TEMPLATE_FILE, UNRECOVERABLE_ERROR_FILE,
};
use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A structured view of one run's result directory.
///
/// This is the form in which report generators and batch drivers consume a
/// finished run. It is derived entirely from the result files; the harness
/// itself never reads it back.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// The test's exit status (0 = pass).
    pub exit_status: i32,

    /// Wall-clock duration in whole seconds.
    pub duration_secs: u64,

    /// True if the run was classified as unrecoverable (the
    /// `unrecoverable-error` marker is present).
    pub unrecoverable: bool,

    /// The hardware-classified failure reason, if one was recorded.
    pub failure_reason: Option<String>,

    /// True if the failure reason was duplicated to `failure-reason.manual`,
    /// signalling that a human must intervene.
    pub needs_human: bool,

    /// True if a reference image implicated in a match timeout was saved.
    pub has_template: bool,

    /// True if a debugger backtrace was extracted from a crash dump.
    pub has_backtrace: bool,
}

impl RunSummary {
    /// Reads the summary out of a result directory.
    ///
    /// Only `exit-status` and `duration` are required; everything else is
    /// optional and its absence is represented in the summary itself.
    pub fn from_result_dir(dir: &Utf8Path) -> Result<Self, RunSummaryReadError> {
        let exit_status = read_int::<i32>(&dir.join(EXIT_STATUS_FILE))?;
        let duration_secs = read_int::<u64>(&dir.join(DURATION_FILE))?;

        let failure_reason = match std::fs::read_to_string(dir.join(FAILURE_REASON_FILE)) {
            Ok(text) => Some(text.trim_end().to_owned()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => None,
            Err(error) => {
                return Err(RunSummaryReadError::Read {
                    path: dir.join(FAILURE_REASON_FILE),
                    error,
                });
            }
        };

        Ok(Self {
            exit_status,
            duration_secs,
            unrecoverable: dir.join(UNRECOVERABLE_ERROR_FILE).exists(),
            failure_reason,
            needs_human: dir.join(FAILURE_REASON_MANUAL_FILE).exists(),
            has_template: dir.join(TEMPLATE_FILE).exists(),
            has_backtrace: dir.join(BACKTRACE_LOG_FILE).exists(),
        })
    }

    /// Returns true if the test passed.
    pub fn is_success(&self) -> bool {
        self.exit_status == 0
    }
}

fn read_int<T: FromStr>(path: &Utf8Path) -> Result<T, RunSummaryReadError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            return Err(RunSummaryReadError::MissingFile { path: path.into() });
        }
        Err(error) => {
            return Err(RunSummaryReadError::Read {
                path: path.into(),
                error,
            });
        }
    };
    contents
        .trim()
        .parse()
        .map_err(|_| RunSummaryReadError::Parse {
            path: path.into(),
            contents,
        })
}
