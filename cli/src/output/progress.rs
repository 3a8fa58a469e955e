//! Spinners and fleet progress bars. indicatif draws to stderr, so stdout
//! stays clean for rendered results.

#![allow(clippy::expect_used)] // Templates are compile-time constants

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

const SPINNER_TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template(template)
        .expect("valid template")
}

/// Spinner shown while one operation runs against one host.
#[must_use]
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner()
        .with_style(style("{spinner:.cyan} {msg}").tick_strings(SPINNER_TICKS))
        .with_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Bar counting finished hosts of a fleet job.
#[must_use]
pub fn fleet_bar(total: u64, msg: &str) -> ProgressBar {
    let bar_style = ProgressStyle::default_bar()
        .template("  {msg}\n    {bar:40.cyan/dim} {pos}/{len} hosts  {elapsed}")
        .expect("valid template")
        .progress_chars("━━─");
    let pb = ProgressBar::new(total)
        .with_style(bar_style)
        .with_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

fn finish_with_mark(pb: &ProgressBar, mark: &'static str, msg: &str) {
    pb.set_style(style("{prefix} {msg}"));
    pb.set_prefix(mark);
    pb.finish_with_message(msg.to_string());
}

/// Replace the spinner with `✓ msg`.
pub fn finish_ok(pb: &ProgressBar, msg: &str) {
    finish_with_mark(pb, "✓", msg);
}

/// Replace the spinner with `✗ msg`.
pub fn finish_err(pb: &ProgressBar, msg: &str) {
    finish_with_mark(pb, "✗", msg);
}
