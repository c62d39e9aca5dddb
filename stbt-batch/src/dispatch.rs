// Copyright (c) The stbt-batch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    errors::{ExpectedError, Result},
    output::{OutputContext, OutputOpts},
};
use batch_runner::{
    config::BatchConfig,
    run_store::RunStore,
    runner::{BatchRunnerBuilder, RunRequest},
};
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use owo_colors::OwoColorize;

/// Supervise stb-tester test runs and record structured results.
#[derive(Debug, Parser)]
#[command(name = "stbt-batch", version)]
pub struct StbtBatchApp {
    #[command(flatten)]
    output: OutputOpts,

    #[command(subcommand)]
    command: Command,
}

impl StbtBatchApp {
    /// Initializes color handling and logging. Call once, before `exec`.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app, returning the process exit code on success.
    pub fn exec(self, output: OutputContext) -> Result<i32> {
        match self.command {
            Command::Run(opts) => opts.exec(output),
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a single test under supervision
    ///
    /// Launches the test command with both output streams captured and
    /// timestamped, classifies known failure signatures in the captured
    /// output, and writes a result directory that `stbt batch report` and
    /// batch drivers consume. The harness's exit status is the test's own,
    /// except when the test could not even be started.
    Run(RunOpts),
}

#[derive(Debug, Args)]
struct RunOpts {
    /// Don't regenerate the HTML report around the run
    ///
    /// Generating the report can be slow if there are many results in the
    /// output directory; it can still be generated afterwards with
    /// 'stbt batch report'.
    #[arg(long)]
    no_html_report: bool,

    /// Name the run is reported under [default: the test command line]
    #[arg(long, value_name = "NAME")]
    display_name: Option<String>,

    /// Root directory the companion tools are installed under
    /// [default: the harness executable's directory]
    #[arg(long, value_name = "PATH")]
    tool_root: Option<Utf8PathBuf>,

    /// Directory to create the run's result directory under
    #[arg(short = 'o', long, value_name = "DIR", default_value = ".")]
    output: Utf8PathBuf,

    /// Tag to add to the result directory name (useful to differentiate
    /// directories when merging results from multiple machines)
    #[arg(short = 't', long, value_name = "TAG")]
    tag: Option<String>,

    /// Config file [default: ./stbt.conf]
    #[arg(long, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,

    /// The test command to run, with its arguments
    #[arg(
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true,
        value_name = "COMMAND"
    )]
    command: Vec<String>,
}

impl RunOpts {
    fn exec(self, output: OutputContext) -> Result<i32> {
        let config = BatchConfig::from_sources(self.config_file.as_deref())?;

        let mut command = self.command.into_iter();
        let program = command.next().expect("clap requires a command");
        let mut request = RunRequest::new(program, command.collect());
        request.set_verbosity(output.verbose);
        request.set_html_report(!self.no_html_report);
        request.set_tool_root(match self.tool_root {
            Some(tool_root) => tool_root,
            None => default_tool_root(),
        });
        if let Some(name) = self.display_name {
            request.set_display_name(name);
        }

        let store = RunStore::new(self.output, self.tag.as_deref())?;
        let run_dir = store.create_run_dir()?;
        run_dir.write_intro_files(&request, self.tag.as_deref())?;

        println!("{} ...", request.display_name());

        let runner = BatchRunnerBuilder::default()
            .build(&request, &config, &run_dir)
            .map_err(ExpectedError::from_run_error)?;
        let exec_result = runner.execute();

        // Update `latest` even when the run errored, so callers always find
        // the most recent directory.
        if let Err(err) = store.mark_latest(&run_dir) {
            tracing::warn!("failed to update the latest symlink: {err}");
        }

        let outcome = exec_result.map_err(ExpectedError::from_run_error)?;

        let styles = output.status_styles();
        if outcome.is_success() {
            println!("{}", "OK".style(styles.pass));
        } else {
            println!("{}", "FAILED".style(styles.fail));
        }
        Ok(outcome.exit_status())
    }
}

/// By default companion tools (the report generator) are expected alongside
/// the harness binary.
fn default_tool_root() -> Utf8PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.to_path_buf()))
        .and_then(|dir| Utf8PathBuf::from_path_buf(dir).ok())
        .unwrap_or_else(|| Utf8PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_definition_is_consistent() {
        use clap::CommandFactory;
        StbtBatchApp::command().debug_assert();
    }

    #[test]
    fn trailing_command_is_collected_verbatim() {
        let app =
            StbtBatchApp::parse_from(["stbt-batch", "run", "tests/epg.py", "--channel", "4"]);
        let Command::Run(opts) = app.command;
        assert_eq!(opts.command, ["tests/epg.py", "--channel", "4"]);
        assert!(!opts.no_html_report);
    }

    #[test]
    fn verbosity_counts_and_options_precede_the_command() {
        let app = StbtBatchApp::parse_from([
            "stbt-batch",
            "run",
            "-vv",
            "--no-html-report",
            "-t",
            "machine2",
            "tests/epg.py",
        ]);
        assert_eq!(app.output.verbose, 2);
        let Command::Run(opts) = app.command;
        assert!(opts.no_html_report);
        assert_eq!(opts.tag.as_deref(), Some("machine2"));
        assert_eq!(opts.command, ["tests/epg.py"]);
    }
}
