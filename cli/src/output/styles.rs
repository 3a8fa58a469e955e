//! Colour palette for terminal output.

use owo_colors::Style;
use tgfleet_common::HostStatus;

/// Styles used by the human renderer and progress reporters. Every field is
/// a no-op style until [`Styles::colorize`] runs, which keeps `--no-color`
/// and non-TTY output plain.
#[derive(Default, Clone)]
pub struct Styles {
    pub success: Style,
    pub warning: Style,
    pub error: Style,
    pub info: Style,
    /// Timestamps, paths and other secondary detail.
    pub dim: Style,
    pub bold: Style,
    /// Section titles such as "Fleet status".
    pub header: Style,
}

impl Styles {
    pub fn colorize(&mut self) {
        *self = Self {
            success: Style::new().green(),
            warning: Style::new().yellow(),
            error: Style::new().red(),
            info: Style::new().blue(),
            dim: Style::new().dimmed(),
            bold: Style::new().bold(),
            header: Style::new().bold().cyan(),
        };
    }

    /// Style for a host status label: green when the agent runs, red when
    /// it is down, yellow when disabled, dimmed when never observed.
    #[must_use]
    pub fn status(&self, status: HostStatus) -> Style {
        match status {
            HostStatus::Active => self.success,
            HostStatus::Down => self.error,
            HostStatus::Inactive => self.warning,
            HostStatus::Unknown => self.dim,
        }
    }
}
