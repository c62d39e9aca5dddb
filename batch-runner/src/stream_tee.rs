// Copyright (c) The stbt-batch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Timestamped capture of a child process's output streams.
//!
//! Each stream of the child is drained by one [`StreamTee`]: every line is
//! prefixed with a capture timestamp and written to a durable log file, and
//! optionally mirrored to the corresponding console stream. The tee performs
//! blocking buffered reads, so if neither sink keeps up the child simply
//! experiences ordinary pipe backpressure.

use crate::errors::StreamCaptureError;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Local};
use std::fmt;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};

/// The size of the buffered reader's buffer. This is the (normal) page size
/// on most systems.
const CHUNK_SIZE: usize = 4 * 1024;

/// Identifies which child stream a tee is draining.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum StreamName {
    /// The child's standard output.
    Stdout,
    /// The child's standard error.
    Stderr,
}

impl fmt::Display for StreamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => write!(f, "stdout"),
            Self::Stderr => write!(f, "stderr"),
        }
    }
}

/// The frozen capture of a single child stream.
///
/// Owned exclusively by its tee while the child is alive; handed out
/// read-only once the stream has reached end-of-input. The text is exactly
/// what was written to the durable log (modulo lossy UTF-8 replacement of
/// invalid bytes), so classification over it matches classification over the
/// log file.
#[derive(Clone, Debug)]
pub struct CapturedStream {
    name: StreamName,
    text: String,
}

impl CapturedStream {
    /// The stream this capture came from.
    pub fn name(&self) -> StreamName {
        self.name
    }

    /// The captured, timestamp-prefixed text.
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Drains one readable stream into a durable log and an optional console
/// mirror.
pub(crate) struct StreamTee<R> {
    name: StreamName,
    reader: BufReader<R>,
    log_file: tokio::fs::File,
    log_path: Utf8PathBuf,
    mirror: bool,
}

impl<R: AsyncRead + Unpin> StreamTee<R> {
    /// Creates a tee draining `reader` into a fresh log file at `log_path`.
    ///
    /// With `mirror` set, each captured line is also echoed to this
    /// process's own stream of the same name.
    pub(crate) async fn create(
        name: StreamName,
        reader: R,
        log_path: &Utf8Path,
        mirror: bool,
    ) -> Result<Self, StreamCaptureError> {
        let log_file = tokio::fs::File::create(log_path).await.map_err(|err| {
            StreamCaptureError::LogWrite {
                path: log_path.to_owned(),
                err,
            }
        })?;
        Ok(Self {
            name,
            reader: BufReader::with_capacity(CHUNK_SIZE, reader),
            log_file,
            log_path: log_path.to_owned(),
            mirror,
        })
    }

    /// Drains the stream to end-of-input, then flushes and closes the log.
    ///
    /// Every line is written to the log (and the mirror) before the next
    /// line is read. Log-write errors are fatal; mirror-write errors are
    /// not (a closed console must not lose the durable record).
    pub(crate) async fn drain(mut self) -> Result<CapturedStream, StreamCaptureError> {
        let mut text = String::new();
        let mut line = Vec::with_capacity(256);

        loop {
            line.clear();
            let read = self
                .reader
                .read_until(b'\n', &mut line)
                .await
                .map_err(|err| StreamCaptureError::Read {
                    stream: self.name,
                    err,
                })?;
            if read == 0 {
                break;
            }

            let stamped = stamp_line(Local::now(), &line);
            self.log_file
                .write_all(stamped.as_bytes())
                .await
                .map_err(|err| StreamCaptureError::LogWrite {
                    path: self.log_path.clone(),
                    err,
                })?;
            if self.mirror {
                mirror_line(self.name, stamped.as_bytes()).await;
            }
            text.push_str(&stamped);
        }

        self.log_file
            .flush()
            .await
            .map_err(|err| StreamCaptureError::LogWrite {
                path: self.log_path.clone(),
                err,
            })?;

        Ok(CapturedStream {
            name: self.name,
            text,
        })
    }
}

/// Prefixes one raw line with a capture timestamp, normalizing the trailing
/// newline (a final line without one is still stamped and terminated).
fn stamp_line(now: DateTime<Local>, raw: &[u8]) -> String {
    let mut line = String::from_utf8_lossy(raw).into_owned();
    if !line.ends_with('\n') {
        line.push('\n');
    }
    format!("[{}] {}", now.format("%Y-%m-%d %H:%M:%S%.3f"), line)
}

async fn mirror_line(name: StreamName, bytes: &[u8]) {
    // Best-effort only: the log file is the durable record.
    match name {
        StreamName::Stdout => {
            let mut out = tokio::io::stdout();
            let _ = out.write_all(bytes).await;
            let _ = out.flush().await;
        }
        StreamName::Stderr => {
            let mut err = tokio::io::stderr();
            let _ = err.write_all(bytes).await;
            let _ = err.flush().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use pretty_assertions::assert_eq;

    fn stamped_suffixes(text: &str) -> Vec<&str> {
        text.lines()
            .map(|line| {
                let (stamp, rest) = line.split_at(line.find("] ").expect("line is stamped") + 2);
                assert!(stamp.starts_with('['), "stamp starts with a bracket");
                rest
            })
            .collect()
    }

    #[tokio::test]
    async fn stamps_every_line_in_both_sinks() {
        let dir = Utf8TempDir::new().unwrap();
        let log_path = dir.path().join("stdout.log");

        let input: &[u8] = b"first line\nsecond line\n";
        let tee = StreamTee::create(StreamName::Stdout, input, &log_path, false)
            .await
            .unwrap();
        let captured = tee.drain().await.unwrap();

        assert_eq!(captured.name(), StreamName::Stdout);
        assert_eq!(
            stamped_suffixes(captured.text()),
            vec!["first line", "second line"]
        );

        // The log file holds exactly the captured text.
        let on_disk = std::fs::read_to_string(&log_path).unwrap();
        assert_eq!(on_disk, captured.text());
    }

    #[tokio::test]
    async fn partial_final_line_is_captured() {
        let dir = Utf8TempDir::new().unwrap();
        let log_path = dir.path().join("stderr.log");

        let input: &[u8] = b"complete\nno trailing newline";
        let tee = StreamTee::create(StreamName::Stderr, input, &log_path, false)
            .await
            .unwrap();
        let captured = tee.drain().await.unwrap();

        assert_eq!(
            stamped_suffixes(captured.text()),
            vec!["complete", "no trailing newline"]
        );
        assert!(captured.text().ends_with('\n'));
    }

    #[tokio::test]
    async fn empty_stream_produces_empty_log() {
        let dir = Utf8TempDir::new().unwrap();
        let log_path = dir.path().join("stdout.log");

        let input: &[u8] = b"";
        let tee = StreamTee::create(StreamName::Stdout, input, &log_path, false)
            .await
            .unwrap();
        let captured = tee.drain().await.unwrap();

        assert_eq!(captured.text(), "");
        assert_eq!(std::fs::read_to_string(&log_path).unwrap(), "");
    }

    #[test]
    fn stamp_format_has_subsecond_resolution() {
        let now = Local::now();
        let stamped = stamp_line(now, b"hello\n");
        // "[YYYY-mm-dd HH:MM:SS.mmm] hello\n"
        assert_eq!(stamped.len(), "[2015-01-01 00:00:00.000] hello\n".len());
        assert!(stamped.ends_with("] hello\n"));
    }
}
