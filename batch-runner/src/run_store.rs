// Copyright (c) The stbt-batch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Creation and persistence of run result directories.
//!
//! Each run owns one directory under the output root, named after its start
//! time. While a run is in flight the `current` symlink points at it; once
//! it finishes, `latest` does. The result files themselves are write-once:
//! they are written atomically and never overwritten, so a half-written
//! directory is distinguishable from a finished one.

use crate::{
    errors::RunStoreError,
    runner::{RunOutcome, RunRequest},
};
use atomicwrites::{AtomicFile, OverwriteBehavior};
use batch_metadata::{
    DURATION_FILE, EXIT_STATUS_FILE, EXTRA_COLUMNS_FILE, FAILURE_REASON_FILE,
    FAILURE_REASON_MANUAL_FILE, GIT_COMMIT_FILE, GIT_COMMIT_SHA_FILE, TEST_ARGS_FILE,
    TEST_NAME_FILE, UNRECOVERABLE_ERROR_FILE, VERSION_FILE,
};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::Local;
use std::io::Write;

/// The strftime pattern run directories are named after.
const RUN_DIR_FORMAT: &str = "%Y-%m-%d_%H.%M.%S";

/// Manages the output root that run directories are created under.
#[derive(Clone, Debug)]
pub struct RunStore {
    output_dir: Utf8PathBuf,
    tag: Option<String>,
}

impl RunStore {
    /// Creates a store rooted at `output_dir`, creating the directory if
    /// needed. `tag` differentiates directories when results from multiple
    /// machines are merged.
    pub fn new(output_dir: impl Into<Utf8PathBuf>, tag: Option<&str>) -> Result<Self, RunStoreError> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir).map_err(|error| RunStoreError::RunDirCreate {
            run_dir: output_dir.clone(),
            error,
        })?;
        Ok(Self {
            output_dir,
            tag: tag.map(|t| t.to_owned()),
        })
    }

    fn suffix(&self) -> String {
        match &self.tag {
            Some(tag) => format!("-{tag}"),
            None => String::new(),
        }
    }

    /// Creates the timestamp-named directory for a new run and points the
    /// `current` symlink at it.
    ///
    /// If the previous run took under a second the name can collide; in
    /// that case wait out the second and try once more.
    pub fn create_run_dir(&self) -> Result<RunDir, RunStoreError> {
        let suffix = self.suffix();
        let mut attempts = 0;
        let name = loop {
            let name = format!("{}{}", Local::now().format(RUN_DIR_FORMAT), suffix);
            match std::fs::create_dir(self.output_dir.join(&name)) {
                Ok(()) => break name,
                Err(error) if error.kind() == std::io::ErrorKind::AlreadyExists && attempts == 0 => {
                    attempts += 1;
                    std::thread::sleep(std::time::Duration::from_secs(1));
                }
                Err(error) => {
                    return Err(RunStoreError::RunDirCreate {
                        run_dir: self.output_dir.join(&name),
                        error,
                    });
                }
            }
        };

        self.update_symlink(&name, &format!("current{suffix}"))?;
        Ok(RunDir {
            path: self.output_dir.join(&name),
            name,
        })
    }

    /// Points the `latest` symlink at a finished run. Called even when the
    /// run itself failed, so callers always find the most recent results.
    pub fn mark_latest(&self, run_dir: &RunDir) -> Result<(), RunStoreError> {
        self.update_symlink(&run_dir.name, &format!("latest{}", self.suffix()))
    }

    /// Atomically points `link_name` at `target`: symlink to a unique
    /// temporary name, then rename over the existing link.
    fn update_symlink(&self, target: &str, link_name: &str) -> Result<(), RunStoreError> {
        let link = self.output_dir.join(link_name);
        let tmp = self.output_dir.join(format!(
            "{link_name}-{:06}~",
            Local::now().timestamp_subsec_micros() % 1_000_000
        ));

        symlink(target, &tmp).map_err(|error| RunStoreError::Symlink {
            link: link.clone(),
            error,
        })?;
        if let Err(error) = std::fs::rename(&tmp, &link) {
            let _ = std::fs::remove_file(&tmp);
            return Err(RunStoreError::Symlink { link, error });
        }
        Ok(())
    }
}

#[cfg(unix)]
fn symlink(target: &str, link: &Utf8Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &str, link: &Utf8Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_dir(target, link)
}

/// One run's result directory.
#[derive(Clone, Debug)]
pub struct RunDir {
    path: Utf8PathBuf,
    name: String,
}

impl RunDir {
    /// The directory's full path.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// The directory's name under the output root.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Records what is being run: the test's name (relative to its git work
    /// tree when it is in one), its arguments one per line, the work tree's
    /// commit, and the run's tag as an extra report column.
    ///
    /// Git information is best-effort: no git on the host or a test outside
    /// any work tree simply produces no git files.
    pub fn write_intro_files(
        &self,
        request: &RunRequest,
        tag: Option<&str>,
    ) -> Result<(), RunStoreError> {
        let program = Utf8Path::new(request.program());
        let test_dir = match program.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent,
            _ => Utf8Path::new("."),
        };

        match GitInfo::read(test_dir) {
            Some(git) => {
                self.write_file(TEST_NAME_FILE, &format!("{}\n", relative_to(program, &git.top_level)))?;
                self.write_file(GIT_COMMIT_FILE, &format!("{}\n", git.commit))?;
                self.write_file(GIT_COMMIT_SHA_FILE, &format!("{}\n", git.commit_sha))?;
            }
            None => {
                self.write_file(TEST_NAME_FILE, &format!("{}\n", absolute(program)))?;
            }
        }

        let args = request.args();
        let contents = if args.is_empty() {
            String::new()
        } else {
            format!("{}\n", args.join("\n"))
        };
        self.write_file(TEST_ARGS_FILE, &contents)?;

        if let Some(tag) = tag {
            self.write_file(EXTRA_COLUMNS_FILE, &format!("Tag\t{tag}\n"))?;
        }
        Ok(())
    }

    /// Persists the final outcome as discrete write-once files. The capture
    /// logs and extracted artifacts are already in place by the time this
    /// runs; this writes everything derived from the outcome itself.
    pub fn persist(&self, outcome: &RunOutcome, version: &str) -> Result<(), RunStoreError> {
        self.write_file(EXIT_STATUS_FILE, &format!("{}\n", outcome.exit_status()))?;
        self.write_file(DURATION_FILE, &format!("{}\n", outcome.duration_secs()))?;
        self.write_file(VERSION_FILE, &format!("{version}\n"))?;

        if let Some(reason) = outcome.failure_reason() {
            let contents = format!("{}\n", reason.text());
            self.write_file(FAILURE_REASON_FILE, &contents)?;
            if reason.needs_human() {
                self.write_file(FAILURE_REASON_MANUAL_FILE, &contents)?;
            }
        }

        if outcome.unrecoverable() {
            self.write_file(UNRECOVERABLE_ERROR_FILE, "")?;
        }
        Ok(())
    }

    fn write_file(&self, name: &str, contents: &str) -> Result<(), RunStoreError> {
        let path = self.path.join(name);
        AtomicFile::new(&path, OverwriteBehavior::DisallowOverwrite)
            .write(|file| file.write_all(contents.as_bytes()))
            .map_err(|error| RunStoreError::ResultWrite {
                path,
                error: match error {
                    atomicwrites::Error::Internal(error) => error,
                    atomicwrites::Error::User(error) => error,
                },
            })
    }
}

fn absolute(path: &Utf8Path) -> Utf8PathBuf {
    std::path::absolute(path)
        .ok()
        .and_then(|p| Utf8PathBuf::from_path_buf(p).ok())
        .unwrap_or_else(|| path.to_owned())
}

fn relative_to(path: &Utf8Path, base: &Utf8Path) -> Utf8PathBuf {
    let abs = absolute(path);
    abs.strip_prefix(base).map(Utf8Path::to_owned).unwrap_or(abs)
}

/// Version-control facts about the work tree a test lives in.
#[derive(Clone, Debug)]
struct GitInfo {
    commit: String,
    commit_sha: String,
    top_level: Utf8PathBuf,
}

impl GitInfo {
    /// Reads git info for `dir`. Returns `None` if git is not installed,
    /// `dir` is not inside a work tree, or `dir` doesn't exist.
    fn read(dir: &Utf8Path) -> Option<Self> {
        let git = |args: &[&str]| -> Option<String> {
            let output = match duct::cmd("git", args)
                .dir(dir.as_std_path())
                .stdin_null()
                .stdout_capture()
                .stderr_null()
                .unchecked()
                .run()
            {
                Ok(output) => output,
                Err(err) => {
                    if err.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!("git invocation failed: {err}");
                    }
                    return None;
                }
            };
            output
                .status
                .success()
                .then(|| String::from_utf8_lossy(&output.stdout).trim().to_owned())
        };

        Some(Self {
            commit: git(&["describe", "--always", "--dirty"])?,
            commit_sha: git(&["rev-parse", "HEAD"])?,
            top_level: git(&["rev-parse", "--show-toplevel"])?.into(),
        })
    }
}
