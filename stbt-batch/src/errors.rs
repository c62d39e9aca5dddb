// Copyright (c) The stbt-batch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::StderrStyles;
use batch_metadata::BatchExitCode;
use batch_runner::errors::{ConfigReadError, LaunchError, RunError, RunStoreError};
use owo_colors::OwoColorize;
use std::error::Error;
use thiserror::Error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

// The #[error()] strings are placeholders -- the expected way to print these
// out is with the display_to_stderr method, which colorizes the chain.

/// An error that prevented a run from being supervised to completion.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("config read error")]
    ConfigRead {
        #[from]
        err: ConfigReadError,
    },
    #[error("result store error")]
    Store {
        #[from]
        err: RunStoreError,
    },
    #[error("the test could not be launched")]
    LaunchFailed { err: LaunchError },
    #[error("run error")]
    RunFailed { err: RunError },
}

impl ExpectedError {
    /// Splits launch failures (which get their own reserved exit code) from
    /// every other run error.
    pub(crate) fn from_run_error(err: RunError) -> Self {
        match err {
            RunError::Launch(err) => Self::LaunchFailed { err },
            other => Self::RunFailed { err: other },
        }
    }

    /// Returns the exit code the process should exit with.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::ConfigRead { .. } | Self::Store { .. } => BatchExitCode::SETUP_ERROR,
            Self::LaunchFailed { .. } => BatchExitCode::LAUNCH_FAILED,
            Self::RunFailed { .. } => 1,
        }
    }

    /// Displays this error and its causes to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let top: &dyn Error = match self {
            Self::ConfigRead { err } => err,
            Self::Store { err } => err,
            Self::LaunchFailed { err } => err,
            Self::RunFailed { err } => err,
        };

        eprintln!("{}: {}", "error".style(styles.error), top);
        let mut next_error = top.source();
        while let Some(err) = next_error {
            eprintln!("  {}: {}", "caused by".style(styles.bold), err);
            next_error = err.source();
        }
    }
}
