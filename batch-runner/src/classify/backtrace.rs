// Copyright (c) The stbt-batch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Backtrace extraction from crash dumps.
//!
//! A test that brings its runtime down hard leaves a core file in the run's
//! working directory. The harness drives gdb non-interactively over it and
//! keeps the backtrace as a result artifact. Everything here is
//! best-effort: a host without gdb still produces a complete run.

use batch_metadata::BACKTRACE_LOG_FILE;
use camino::{Utf8Path, Utf8PathBuf};

/// The transient command file that drives the debugger. Deleted once the
/// debugger has run.
const GDB_COMMANDS_FILE: &str = "backtrace.gdb";

/// If a core dump is present in `run_dir`, extracts a backtrace for
/// `program` into `backtrace.log` and returns its path.
pub(super) fn inspect_core_dump(run_dir: &Utf8Path, program: &str) -> Option<Utf8PathBuf> {
    let core = find_core_dump(run_dir)?;
    tracing::info!("found crash dump `{core}`; extracting a backtrace");

    let commands_path = run_dir.join(GDB_COMMANDS_FILE);
    if let Err(err) = std::fs::write(&commands_path, "thread apply all bt\n") {
        tracing::warn!("failed to write gdb command file: {err}");
        return None;
    }

    let backtrace_path = run_dir.join(BACKTRACE_LOG_FILE);
    let result = duct::cmd(
        "gdb",
        ["-batch", "-x", commands_path.as_str(), program, core.as_str()],
    )
    .stdin_null()
    .stderr_to_stdout()
    .stdout_path(backtrace_path.as_std_path())
    .unchecked()
    .run();
    let _ = std::fs::remove_file(&commands_path);

    match result {
        Ok(output) => {
            if !output.status.success() {
                tracing::warn!("gdb exited with {}", output.status);
            }
            match std::fs::metadata(&backtrace_path) {
                Ok(meta) if meta.len() > 0 => Some(backtrace_path),
                _ => {
                    tracing::debug!("gdb produced no backtrace");
                    let _ = std::fs::remove_file(&backtrace_path);
                    None
                }
            }
        }
        Err(err) => {
            if err.kind() == std::io::ErrorKind::NotFound {
                tracing::debug!("gdb not available; skipping backtrace extraction");
            } else {
                tracing::warn!("failed to run gdb: {err}");
            }
            let _ = std::fs::remove_file(&backtrace_path);
            None
        }
    }
}

/// Finds a core-dump-style file (`core`, `core.<pid>`) in the run
/// directory. If several are present, takes the lexicographically first for
/// reproducibility.
fn find_core_dump(run_dir: &Utf8Path) -> Option<Utf8PathBuf> {
    let mut dumps: Vec<Utf8PathBuf> = run_dir
        .read_dir_utf8()
        .ok()?
        .flatten()
        .filter(|entry| {
            let name = entry.file_name();
            name == "core" || name.starts_with("core.")
        })
        .map(|entry| entry.into_path())
        .collect();
    dumps.sort();
    dumps.into_iter().next()
}
