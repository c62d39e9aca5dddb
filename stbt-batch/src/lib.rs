// Copyright (c) The stbt-batch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Supervise a single stb-tester test run and record structured results.
//!
//! This binary runs one test command under supervision: it captures and
//! timestamps the test's output, classifies known failure signatures, and
//! leaves behind a result directory for `stbt batch report` and batch
//! drivers to consume.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::{OutputContext, StderrStyles};
