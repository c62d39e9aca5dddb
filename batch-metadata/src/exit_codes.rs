// Copyright (c) The stbt-batch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `stbt-batch` failures.
///
/// The harness's own exit status normally equals the supervised test's exit
/// status, so most of the exit-code space belongs to the test. The constants
/// here are the codes the harness produces itself; they are chosen outside
/// the range tests conventionally use.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum BatchExitCode {}

impl BatchExitCode {
    /// The test ran and exited with status 0.
    pub const OK: i32 = 0;

    /// The test command could not be launched at all (missing binary,
    /// permission denied, resource exhaustion). Distinct from any test
    /// failure: the test never started.
    pub const LAUNCH_FAILED: i32 = 96;

    /// The harness failed before attempting to launch the test (unreadable
    /// configuration, result directory could not be created).
    pub const SETUP_ERROR: i32 = 95;
}
