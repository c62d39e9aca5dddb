// Copyright (c) The stbt-batch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use clap::{Args, ValueEnum};
use owo_colors::{Style, style};

#[derive(Copy, Clone, Debug, Args)]
#[must_use]
pub(crate) struct OutputOpts {
    /// Print the test's stdout live; provide twice to also print its stderr
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub(crate) verbose: u8,

    /// Produce color output: auto, always, never
    #[arg(
        long,
        value_enum,
        default_value_t,
        hide_possible_values = true,
        global = true,
        value_name = "WHEN",
        env = "STBT_BATCH_COLOR"
    )]
    pub(crate) color: Color,
}

impl OutputOpts {
    pub(crate) fn init(self) -> OutputContext {
        let OutputOpts { verbose, color } = self;

        color.init();
        init_logger();

        OutputContext { verbose, color }
    }
}

/// The resolved output settings for this invocation.
#[derive(Copy, Clone, Debug)]
#[must_use]
pub struct OutputContext {
    pub(crate) verbose: u8,
    pub(crate) color: Color,
}

impl OutputContext {
    /// Returns general stderr styles for the current output context.
    pub fn stderr_styles(&self) -> StderrStyles {
        let mut styles = StderrStyles::default();
        if self.color.should_colorize(supports_color::Stream::Stderr) {
            styles.colorize();
        }
        styles
    }

    pub(crate) fn status_styles(&self) -> StatusStyles {
        let mut styles = StatusStyles::default();
        if self.color.should_colorize(supports_color::Stream::Stdout) {
            styles.colorize();
        }
        styles
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
#[must_use]
pub(crate) enum Color {
    #[default]
    Auto,
    Always,
    Never,
}

impl Color {
    fn init(self) {
        match self {
            Self::Auto => owo_colors::unset_override(),
            Self::Always => owo_colors::set_override(true),
            Self::Never => owo_colors::set_override(false),
        }
    }

    pub(crate) fn should_colorize(self, stream: supports_color::Stream) -> bool {
        match self {
            Self::Auto => supports_color::on_cached(stream).is_some(),
            Self::Always => true,
            Self::Never => false,
        }
    }
}

/// Styles for errors printed to stderr.
#[derive(Debug, Default)]
pub struct StderrStyles {
    pub(crate) error: Style,
    pub(crate) bold: Style,
}

impl StderrStyles {
    fn colorize(&mut self) {
        self.error = style().red().bold();
        self.bold = style().bold();
    }
}

/// Styles for the one-line pass/fail status on stdout.
#[derive(Debug, Default)]
pub(crate) struct StatusStyles {
    pub(crate) pass: Style,
    pub(crate) fail: Style,
}

impl StatusStyles {
    fn colorize(&mut self) {
        self.pass = style().green().bold();
        self.fail = style().red().bold();
    }
}

static INIT_LOGGER: std::sync::Once = std::sync::Once::new();

/// Library diagnostics go through `tracing`; the level is controlled with
/// `STBT_BATCH_LOG` (e.g. `debug`), defaulting to warnings only.
fn init_logger() {
    INIT_LOGGER.call_once(|| {
        let level: tracing::Level = std::env::var("STBT_BATCH_LOG")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(tracing::Level::WARN);
        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(false)
            .with_ansi(false)
            .with_writer(std::io::stderr)
            .init();
    });
}
