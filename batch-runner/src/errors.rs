// Copyright (c) The stbt-batch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by the batch runner.

use crate::stream_tee::StreamName;
use camino::Utf8PathBuf;
use thiserror::Error;

/// An error that occurred while reading the harness configuration.
#[derive(Debug, Error)]
#[error("failed to read batch configuration from `{config_file}`")]
pub struct ConfigReadError {
    config_file: Utf8PathBuf,
    #[source]
    err: config::ConfigError,
}

impl ConfigReadError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, err: config::ConfigError) -> Self {
        Self {
            config_file: config_file.into(),
            err,
        }
    }
}

/// An error that occurred while looking up a single configuration key.
///
/// Key *absence* is not an error (lookups return `None` for that); this is
/// produced when a key exists but holds something other than a string.
#[derive(Debug, Error)]
#[error("configuration key `{key}` is not a string value")]
pub struct ConfigKeyError {
    key: String,
    #[source]
    err: config::ConfigError,
}

impl ConfigKeyError {
    pub(crate) fn new(key: impl Into<String>, err: config::ConfigError) -> Self {
        Self {
            key: key.into(),
            err,
        }
    }
}

/// The test child process could not be launched at all.
///
/// This is distinct from a test failure: the test never started, so the
/// harness reports it with its own reserved exit code rather than the
/// child's.
#[derive(Debug, Error)]
#[error("failed to launch test command `{command}`")]
pub struct LaunchError {
    command: String,
    #[source]
    err: std::io::Error,
}

impl LaunchError {
    pub(crate) fn new(command: impl Into<String>, err: std::io::Error) -> Self {
        Self {
            command: command.into(),
            err,
        }
    }
}

/// An error capturing one of the child's output streams.
#[derive(Debug, Error)]
pub enum StreamCaptureError {
    /// An error occurred while reading from the child's pipe.
    #[error("error reading from the child's {stream} pipe")]
    Read {
        /// The stream the tee was draining.
        stream: StreamName,
        /// The error that occurred.
        #[source]
        err: std::io::Error,
    },

    /// An error occurred while writing the durable capture log. There are no
    /// retries: the log is the primary record of the run.
    #[error("error writing capture log `{path}`")]
    LogWrite {
        /// The log file being written.
        path: Utf8PathBuf,
        /// The error that occurred.
        #[source]
        err: std::io::Error,
    },
}

/// An error that occurred while setting up signal absorption.
#[derive(Debug, Error)]
#[error("error setting up signal handlers")]
pub struct SignalGuardSetupError(#[from] std::io::Error);

/// An error that occurred while creating or writing a run's result
/// directory.
#[derive(Debug, Error)]
pub enum RunStoreError {
    /// The run directory could not be created.
    #[error("failed to create run directory `{run_dir}`")]
    RunDirCreate {
        /// The directory that failed to be created.
        run_dir: Utf8PathBuf,
        /// The error that occurred.
        #[source]
        error: std::io::Error,
    },

    /// A result file could not be written. Result files are write-once, so
    /// this also fires on an attempt to overwrite an existing one.
    #[error("failed to write result file `{path}`")]
    ResultWrite {
        /// The file that failed to be written.
        path: Utf8PathBuf,
        /// The error that occurred.
        #[source]
        error: std::io::Error,
    },

    /// A `current`/`latest` symlink could not be updated.
    #[error("failed to update symlink `{link}`")]
    Symlink {
        /// The link that failed to be updated.
        link: Utf8PathBuf,
        /// The error that occurred.
        #[source]
        error: std::io::Error,
    },
}

/// An error that occurred while supervising a run.
#[derive(Debug, Error)]
pub enum RunError {
    /// The child could not be launched.
    #[error(transparent)]
    Launch(#[from] LaunchError),

    /// One of the capture streams failed.
    #[error(transparent)]
    StreamCapture(#[from] StreamCaptureError),

    /// Waiting for the child to exit failed.
    #[error("error waiting for the test child process")]
    Wait(#[source] std::io::Error),

    /// Signal absorption could not be set up.
    #[error(transparent)]
    SignalGuardSetup(#[from] SignalGuardSetupError),

    /// The tokio runtime could not be created.
    #[error("failed to create the tokio runtime")]
    RuntimeCreate(#[source] std::io::Error),

    /// The result directory could not be finalized.
    #[error(transparent)]
    Store(#[from] RunStoreError),
}
