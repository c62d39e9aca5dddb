// Copyright (c) The stbt-batch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The batch runner.
//!
//! The main structure in this module is [`BatchRunner`].

mod imp;
mod supervisor;

pub use imp::*;
