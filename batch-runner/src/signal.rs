// Copyright (c) The stbt-batch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signal absorption for the supervisor.
//!
//! A termination signal sent to the harness (often to its whole process
//! group, child included) must not abort the harness mid-flight: stream
//! draining, classification and result writing must finish so the caller is
//! left with a consistent result directory. The guard installs handlers for
//! the termination signals and deliberately does nothing with them: an
//! explicit no-op override of the runtime's default die-on-signal behavior,
//! for this process only. The child is not shielded: if the signal also
//! terminates it, that exit status is observed and recorded normally.

use crate::errors::SignalGuardSetupError;

/// The kind of signal absorption to set up for a run.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum SignalGuardKind {
    /// The standard guard: absorb interrupt and termination signals
    /// depending on the platform.
    #[default]
    Standard,

    /// A no-op guard that leaves signal dispositions alone. Useful for
    /// tests.
    Noop,
}

impl SignalGuardKind {
    /// Installs the guard. Must be called from within a tokio runtime; the
    /// guard stays active until dropped.
    pub(crate) fn install(self) -> Result<SignalGuard, SignalGuardSetupError> {
        match self {
            Self::Standard => SignalGuard::new(),
            Self::Noop => Ok(SignalGuard::noop()),
        }
    }
}

/// The installed guard. Holds the background task that keeps the absorb
/// handlers registered; dropping it ends absorption.
#[derive(Debug)]
pub(crate) struct SignalGuard {
    task: Option<tokio::task::JoinHandle<()>>,
}

impl SignalGuard {
    fn new() -> Result<Self, SignalGuardSetupError> {
        let mut signals = imp::Signals::new()?;
        let task = tokio::spawn(async move {
            let mut absorbed: u32 = 0;
            while let Some(event) = signals.recv().await {
                absorbed += 1;
                if absorbed == 1 {
                    tracing::warn!(
                        "received {event}; waiting for the current test to complete"
                    );
                } else {
                    tracing::warn!("received {event}; still finalizing the current run");
                }
            }
        });
        Ok(Self { task: Some(task) })
    }

    fn noop() -> Self {
        Self { task: None }
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(unix)]
mod imp {
    use super::AbsorbedSignal;
    use tokio::signal::unix::{Signal, SignalKind, signal};

    /// Absorb streams for SIGINT and SIGTERM on Unix.
    #[derive(Debug)]
    pub(super) struct Signals {
        sigint: SignalWithDone,
        sigterm: SignalWithDone,
    }

    impl Signals {
        pub(super) fn new() -> std::io::Result<Self> {
            let sigint = SignalWithDone::new(SignalKind::interrupt())?;
            let sigterm = SignalWithDone::new(SignalKind::terminate())?;
            Ok(Self { sigint, sigterm })
        }

        pub(super) async fn recv(&mut self) -> Option<AbsorbedSignal> {
            loop {
                tokio::select! {
                    recv = self.sigint.signal.recv(), if !self.sigint.done => {
                        match recv {
                            Some(()) => break Some(AbsorbedSignal::Interrupt),
                            None => self.sigint.done = true,
                        }
                    }
                    recv = self.sigterm.signal.recv(), if !self.sigterm.done => {
                        match recv {
                            Some(()) => break Some(AbsorbedSignal::Term),
                            None => self.sigterm.done = true,
                        }
                    }
                    else => {
                        break None;
                    }
                }
            }
        }
    }

    #[derive(Debug)]
    struct SignalWithDone {
        signal: Signal,
        done: bool,
    }

    impl SignalWithDone {
        fn new(kind: SignalKind) -> std::io::Result<Self> {
            let signal = signal(kind)?;
            Ok(Self {
                signal,
                done: false,
            })
        }
    }
}

#[cfg(windows)]
mod imp {
    use super::AbsorbedSignal;
    use tokio::signal::windows::{CtrlC, ctrl_c};

    #[derive(Debug)]
    pub(super) struct Signals {
        ctrl_c: CtrlC,
        ctrl_c_done: bool,
    }

    impl Signals {
        pub(super) fn new() -> std::io::Result<Self> {
            let ctrl_c = ctrl_c()?;
            Ok(Self {
                ctrl_c,
                ctrl_c_done: false,
            })
        }

        pub(super) async fn recv(&mut self) -> Option<AbsorbedSignal> {
            if self.ctrl_c_done {
                return None;
            }
            match self.ctrl_c.recv().await {
                Some(()) => Some(AbsorbedSignal::Interrupt),
                None => {
                    self.ctrl_c_done = true;
                    None
                }
            }
        }
    }
}

/// A signal that was delivered to the harness and absorbed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum AbsorbedSignal {
    Interrupt,
    #[cfg(unix)]
    Term,
}

impl std::fmt::Display for AbsorbedSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Interrupt => write!(f, "interrupt signal"),
            #[cfg(unix)]
            Self::Term => write!(f, "termination signal"),
        }
    }
}
