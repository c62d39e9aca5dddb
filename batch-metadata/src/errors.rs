// Copyright (c) The stbt-batch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::Utf8PathBuf;
use thiserror::Error;

/// An error that occurs while reading a result directory into a
/// [`RunSummary`](crate::RunSummary).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunSummaryReadError {
    /// A required result file was missing from the directory.
    #[error("required result file `{path}` is missing")]
    MissingFile {
        /// The path that was expected to exist.
        path: Utf8PathBuf,
    },

    /// A result file could not be read.
    #[error("error reading result file `{path}`")]
    Read {
        /// The path that failed to be read.
        path: Utf8PathBuf,
        /// The error that occurred.
        #[source]
        error: std::io::Error,
    },

    /// A result file did not contain the expected integer.
    #[error("result file `{path}` does not contain an integer: {contents:?}")]
    Parse {
        /// The path that failed to parse.
        path: Utf8PathBuf,
        /// The offending file contents.
        contents: String,
    },
}
