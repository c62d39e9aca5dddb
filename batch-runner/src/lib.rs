// Copyright (c) The stbt-batch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for [stbt-batch](https://crates.io/crates/stbt-batch):
//! supervising one test run against a device under test.
//!
//! One run means: launch the test command, capture and timestamp both of its
//! output streams while it executes, absorb termination signals so results
//! are always written, classify known failure signatures in the captured
//! output, probe the capture hardware when the signature implicates it, and
//! persist everything as a directory of result files for external reporting.

pub mod classify;
pub mod config;
pub mod errors;
pub mod hooks;
pub mod report;
pub mod run_store;
pub mod runner;
pub mod signal;
pub mod stream_tee;
mod time;
