// Copyright (c) The stbt-batch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! File names within a run's result directory.
//!
//! The result directory is the sole source of truth consumed by external
//! reporting: every fact about a finished run is one of these files. The
//! first four are always present for a run that launched; the rest are
//! optional.

/// The test's exit status as integer text (always present).
pub const EXIT_STATUS_FILE: &str = "exit-status";

/// Wall-clock duration of the run in whole seconds (always present).
pub const DURATION_FILE: &str = "duration";

/// Timestamped capture of the test's standard output (always present).
pub const STDOUT_LOG_FILE: &str = "stdout.log";

/// Timestamped capture of the test's standard error (always present).
pub const STDERR_LOG_FILE: &str = "stderr.log";

/// Output of the host's hardware-monitoring probe, if one was found.
pub const SENSORS_LOG_FILE: &str = "sensors.log";

/// Copy of the reference image implicated in a match timeout.
pub const TEMPLATE_FILE: &str = "template.png";

/// Debugger backtrace extracted from a crash dump.
pub const BACKTRACE_LOG_FILE: &str = "backtrace.log";

/// Free-text diagnostic explaining a hardware-classified failure.
pub const FAILURE_REASON_FILE: &str = "failure-reason";

/// Copy of [`FAILURE_REASON_FILE`] signalling that a human must intervene.
pub const FAILURE_REASON_MANUAL_FILE: &str = "failure-reason.manual";

/// Marker file: present iff the failure is environmental and re-running the
/// same test is pointless without human intervention.
pub const UNRECOVERABLE_ERROR_FILE: &str = "unrecoverable-error";

/// The harness's own version string.
pub const VERSION_FILE: &str = "stbt-version.log";

/// Timestamped capture of the Blackmagic capture-card diagnostic probe.
pub const DECKLINK_LOG_FILE: &str = "decklinksrc.log";

/// Name of the test that was run, relative to its git work tree if known.
pub const TEST_NAME_FILE: &str = "test-name";

/// Arguments passed to the test, one per line.
pub const TEST_ARGS_FILE: &str = "test-args";

/// `git describe` output for the test's work tree, if it is in one.
pub const GIT_COMMIT_FILE: &str = "git-commit";

/// Full commit hash for the test's work tree, if it is in one.
pub const GIT_COMMIT_SHA_FILE: &str = "git-commit-sha";

/// Extra tab-separated report columns (currently just the run's tag).
pub const EXTRA_COLUMNS_FILE: &str = "extra-columns";
