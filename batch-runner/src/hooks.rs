// Copyright (c) The stbt-batch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Externally-configured lifecycle hooks.
//!
//! Operators can attach commands to fixed points of a run's lifecycle under
//! the `batch` configuration namespace. A hook that isn't configured is
//! simply skipped. Resolution happens at each invocation, not once per run,
//! so a configuration change (via environment) between hook points is
//! honored.

use crate::config::BatchConfig;
use std::fmt;

/// A fixed lifecycle point that can have an external command attached.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Hook {
    /// Runs before the test child is launched. Invoked with the argument
    /// `start`; outcome ignored.
    PreRun,

    /// Runs after the child has exited and its output has been captured.
    /// Invoked with the argument `stop`; outcome ignored.
    PostRun,

    /// Runs only if the child exited non-zero, with no argument. A non-zero
    /// exit from this hook means the device could not be recovered and the
    /// run is marked unrecoverable.
    Recover,
}

impl Hook {
    fn config_key(self) -> &'static str {
        match self {
            Self::PreRun => "batch.pre_run",
            Self::PostRun => "batch.post_run",
            Self::Recover => "batch.recover",
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PreRun => write!(f, "pre_run"),
            Self::PostRun => write!(f, "post_run"),
            Self::Recover => write!(f, "recover"),
        }
    }
}

/// What happened when a hook point was reached.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HookStatus {
    /// No command is configured for this hook; nothing was run.
    NotConfigured,

    /// The hook command ran and exited 0.
    Completed,

    /// The hook command exited non-zero, or could not be run at all.
    Failed,
}

/// Resolves and invokes lifecycle hooks against a configuration view.
#[derive(Clone, Copy, Debug)]
pub struct HookRunner<'cfg> {
    config: &'cfg BatchConfig,
}

impl<'cfg> HookRunner<'cfg> {
    /// Creates a hook runner over the given configuration.
    pub fn new(config: &'cfg BatchConfig) -> Self {
        Self { config }
    }

    /// Invokes `hook` synchronously with `arg` as its sole argument (if
    /// any), stdin unattached.
    ///
    /// Never fails: a missing configuration key, a malformed one, or a
    /// command that can't be spawned all degrade to a status the caller can
    /// inspect. Only the `recover` hook's status affects the run.
    pub fn invoke(&self, hook: Hook, arg: Option<&str>) -> HookStatus {
        let Some(command) = self.config.get_string_lenient(hook.config_key()) else {
            tracing::debug!("no {hook} hook configured");
            return HookStatus::NotConfigured;
        };
        if command.is_empty() {
            tracing::debug!("{hook} hook configured empty; skipping");
            return HookStatus::NotConfigured;
        }

        tracing::debug!("running {hook} hook: {command}");
        let args: Vec<&str> = arg.into_iter().collect();
        match duct::cmd(command.as_str(), args).stdin_null().unchecked().run() {
            Ok(output) if output.status.success() => HookStatus::Completed,
            Ok(output) => {
                tracing::warn!("{hook} hook `{command}` exited with {}", output.status);
                HookStatus::Failed
            }
            Err(err) => {
                tracing::warn!("failed to run {hook} hook `{command}`: {err}");
                HookStatus::Failed
            }
        }
    }
}
