//! Progress reporters handed to the engines. Both write to stderr.

use owo_colors::OwoColorize as _;

use crate::application::ports::ProgressReporter;
use crate::output::OutputContext;

/// Line-per-event reporter used when no spinner is drawn (`--json`,
/// `--quiet` or a non-TTY stderr). Silent under `--quiet`.
pub struct TerminalReporter<'a> {
    ctx: &'a OutputContext,
}

impl<'a> TerminalReporter<'a> {
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }
}

impl ProgressReporter for TerminalReporter<'_> {
    fn step(&self, message: &str) {
        if !self.ctx.quiet {
            eprintln!("  {} {message}", "→".style(self.ctx.styles.info));
        }
    }

    fn success(&self, message: &str) {
        if !self.ctx.quiet {
            eprintln!("  {} {message}", "✓".style(self.ctx.styles.success));
        }
    }

    fn warn(&self, message: &str) {
        if !self.ctx.quiet {
            eprintln!("  {} {message}", "!".style(self.ctx.styles.warning));
        }
    }
}

/// Reporter that drives an indicatif spinner: steps replace the spinner
/// message, successes and warnings are printed above it.
pub struct SpinnerReporter {
    pb: indicatif::ProgressBar,
}

impl SpinnerReporter {
    #[must_use]
    pub fn new(pb: indicatif::ProgressBar) -> Self {
        Self { pb }
    }
}

impl ProgressReporter for SpinnerReporter {
    fn step(&self, message: &str) {
        self.pb.set_message(message.to_string());
    }

    fn success(&self, message: &str) {
        self.pb.println(format!("  ✓ {message}"));
    }

    fn warn(&self, message: &str) {
        self.pb.println(format!("  ! {message}"));
    }
}
