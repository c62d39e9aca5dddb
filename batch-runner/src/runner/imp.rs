// Copyright (c) The stbt-batch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Orchestration of one supervised run.

use crate::{
    classify::{self, ClassifyContext},
    config::BatchConfig,
    errors::RunError,
    hooks::{Hook, HookRunner, HookStatus},
    report::{ReportGenerator, ReportMode},
    run_store::RunDir,
    runner::supervisor::Supervisor,
    signal::SignalGuardKind,
};
use camino::{Utf8Path, Utf8PathBuf};
use tokio::runtime::Runtime;

/// A request to run one test command under supervision.
///
/// Built once by the caller, then immutable for the whole run.
#[derive(Clone, Debug)]
pub struct RunRequest {
    program: String,
    args: Vec<String>,
    display_name: String,
    verbosity: u8,
    html_report: bool,
    tool_root: Utf8PathBuf,
}

impl RunRequest {
    /// Creates a request to run `program` with `args`.
    ///
    /// The display name defaults to the command line; HTML reporting
    /// defaults to enabled; the tool root defaults to the current
    /// directory.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        let program = program.into();
        let display_name = command_line(&program, &args);
        Self {
            program,
            args,
            display_name,
            verbosity: 0,
            html_report: true,
            tool_root: Utf8PathBuf::from("."),
        }
    }

    /// Sets the name the run is reported under.
    pub fn set_display_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.display_name = name.into();
        self
    }

    /// Sets the console verbosity: 1 mirrors the test's stdout live, 2 also
    /// mirrors its stderr.
    pub fn set_verbosity(&mut self, verbosity: u8) -> &mut Self {
        self.verbosity = verbosity;
        self
    }

    /// Sets whether the HTML report is regenerated around the run.
    pub fn set_html_report(&mut self, enabled: bool) -> &mut Self {
        self.html_report = enabled;
        self
    }

    /// Sets the root directory companion tools are found under.
    pub fn set_tool_root(&mut self, tool_root: impl Into<Utf8PathBuf>) -> &mut Self {
        self.tool_root = tool_root.into();
        self
    }

    /// The test command's program.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// The test command's arguments.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The name the run is reported under.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// The console verbosity (0/1/2).
    pub fn verbosity(&self) -> u8 {
        self.verbosity
    }

    /// Whether the HTML report is regenerated around the run.
    pub fn html_report(&self) -> bool {
        self.html_report
    }

    /// The root directory companion tools are found under.
    pub fn tool_root(&self) -> &Utf8Path {
        &self.tool_root
    }

    pub(crate) fn command_line(&self) -> String {
        command_line(&self.program, &self.args)
    }
}

fn command_line(program: &str, args: &[String]) -> String {
    if args.is_empty() {
        program.to_owned()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

/// Why a run is considered failed, beyond its exit status.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FailureReason {
    text: String,
    needs_human: bool,
}

impl FailureReason {
    /// A classification that automation may act on (e.g. retry elsewhere).
    pub fn automated(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            needs_human: false,
        }
    }

    /// A classification that requires a human to intervene; persisted as a
    /// separate marked copy of the reason file.
    pub fn manual(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            needs_human: true,
        }
    }

    /// The free-text diagnostic.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// True if a human must intervene before this configuration can run
    /// again.
    pub fn needs_human(&self) -> bool {
        self.needs_human
    }
}

/// The structured outcome of one run.
///
/// Created from the child's real termination status, then populated
/// incrementally by classification and the recovery hook. Every artifact
/// path recorded here points at a file that exists on disk.
#[derive(Clone, Debug)]
pub struct RunOutcome {
    exit_status: i32,
    duration_secs: u64,
    unrecoverable: bool,
    template_path: Option<Utf8PathBuf>,
    backtrace_path: Option<Utf8PathBuf>,
    failure_reason: Option<FailureReason>,
}

impl RunOutcome {
    pub(crate) fn new(exit_status: i32, duration_secs: u64) -> Self {
        Self {
            exit_status,
            duration_secs,
            unrecoverable: false,
            template_path: None,
            backtrace_path: None,
            failure_reason: None,
        }
    }

    /// The child's exit status, verbatim (0 = pass; signal deaths are
    /// 128 + the signal number).
    pub fn exit_status(&self) -> i32 {
        self.exit_status
    }

    /// Wall-clock duration of the run in whole seconds.
    pub fn duration_secs(&self) -> u64 {
        self.duration_secs
    }

    /// True if the test passed.
    pub fn is_success(&self) -> bool {
        self.exit_status == 0
    }

    /// True if re-running this configuration is pointless without human
    /// intervention.
    pub fn unrecoverable(&self) -> bool {
        self.unrecoverable
    }

    /// The saved copy of the reference image implicated in a match timeout.
    pub fn template_path(&self) -> Option<&Utf8Path> {
        self.template_path.as_deref()
    }

    /// The backtrace extracted from a crash dump.
    pub fn backtrace_path(&self) -> Option<&Utf8Path> {
        self.backtrace_path.as_deref()
    }

    /// The hardware-classified failure reason.
    pub fn failure_reason(&self) -> Option<&FailureReason> {
        self.failure_reason.as_ref()
    }

    pub(crate) fn mark_unrecoverable(&mut self) {
        self.unrecoverable = true;
    }

    pub(crate) fn set_template_path(&mut self, path: Utf8PathBuf) {
        self.template_path = Some(path);
    }

    pub(crate) fn set_backtrace_path(&mut self, path: Utf8PathBuf) {
        self.backtrace_path = Some(path);
    }

    pub(crate) fn set_failure_reason(&mut self, reason: FailureReason) {
        self.failure_reason = Some(reason);
    }
}

/// Builder for [`BatchRunner`].
#[derive(Debug, Default)]
pub struct BatchRunnerBuilder {
    signal_guard: SignalGuardKind,
}

impl BatchRunnerBuilder {
    /// Sets the kind of signal absorption for the run (tests use
    /// [`SignalGuardKind::Noop`]).
    pub fn set_signal_guard(&mut self, kind: SignalGuardKind) -> &mut Self {
        self.signal_guard = kind;
        self
    }

    /// Creates the runner, including the tokio runtime the run executes on.
    pub fn build<'a>(
        &self,
        request: &'a RunRequest,
        config: &'a BatchConfig,
        run_dir: &'a RunDir,
    ) -> Result<BatchRunner<'a>, RunError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("batch-runner-worker")
            .build()
            .map_err(RunError::RuntimeCreate)?;

        Ok(BatchRunner {
            request,
            config,
            run_dir,
            runtime,
            signal_guard: self.signal_guard,
        })
    }
}

/// Context for supervising one run.
///
/// Created using [`BatchRunnerBuilder::build`].
pub struct BatchRunner<'a> {
    request: &'a RunRequest,
    config: &'a BatchConfig,
    run_dir: &'a RunDir,
    runtime: Runtime,
    signal_guard: SignalGuardKind,
}

impl BatchRunner<'_> {
    /// The harness's own version string, recorded in every result
    /// directory.
    pub const VERSION: &'static str = env!("CARGO_PKG_VERSION");

    /// Runs the test to completion: hooks, supervision, classification,
    /// result persistence. Blocks until everything is on disk.
    ///
    /// A [`RunError::Launch`](crate::errors::RunError::Launch) means the
    /// test never started; any other error means the run's record could not
    /// be completed. A test that merely *fails* is an `Ok` outcome with a
    /// non-zero exit status.
    pub fn execute(&self) -> Result<RunOutcome, RunError> {
        self.runtime.block_on(async {
            // install() must be called from within the runtime. The guard
            // stays active until the results are on disk.
            let signal_guard = self.signal_guard.install()?;
            let result = self.execute_impl().await;
            drop(signal_guard);
            result
        })
    }

    async fn execute_impl(&self) -> Result<RunOutcome, RunError> {
        let hooks = HookRunner::new(self.config);
        let report = ReportGenerator::new(self.request.tool_root());

        if self.request.html_report() {
            report.generate(ReportMode::Html, self.run_dir.path());
        }
        hooks.invoke(Hook::PreRun, Some("start"));

        let exit = Supervisor::new(self.request, self.run_dir.path())
            .run()
            .await?;

        hooks.invoke(Hook::PostRun, Some("stop"));

        let mut outcome = RunOutcome::new(exit.exit_status, exit.duration_secs);
        let cx = ClassifyContext {
            run_dir: self.run_dir.path(),
            program: self.request.program(),
            config: self.config,
        };
        classify::classify_run(&cx, &exit.stdout, &exit.stderr, &mut outcome).await;

        if !outcome.is_success() && hooks.invoke(Hook::Recover, None) == HookStatus::Failed {
            tracing::warn!("recovery hook failed; marking the run unrecoverable");
            outcome.mark_unrecoverable();
        }

        self.run_dir.persist(&outcome, Self::VERSION)?;

        report.generate(ReportMode::ClassifyOnly, self.run_dir.path());
        if self.request.html_report() {
            report.generate(ReportMode::Html, self.run_dir.path());
        }

        Ok(outcome)
    }
}
