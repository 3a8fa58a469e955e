//! `tgfleet settings`: show and set configuration values.

use std::process::ExitCode;

use anyhow::Result;
use clap::Subcommand;

use crate::app::AppContext;
use crate::application::ports::SettingsStore;

/// Settings subcommands.
#[derive(Subcommand)]
pub enum SettingsCommand {
    /// Show current settings
    Show,
    /// Set a settings value
    Set {
        /// Settings key, e.g. fleet.concurrency
        key: String,
        /// New value
        value: String,
    },
}

/// Run the settings command.
///
/// # Errors
///
/// Returns an error for unknown keys or invalid values, or if the settings
/// file cannot be written.
pub fn run(app: &AppContext, cmd: SettingsCommand) -> Result<ExitCode> {
    match cmd {
        SettingsCommand::Show => {
            app.renderer()
                .render_settings(&app.settings, app.settings_store.path())?;
        }
        SettingsCommand::Set { key, value } => {
            let mut settings = app.settings.clone();
            settings.set(&key, &value)?;
            app.settings_store.save(&settings)?;
            let stored = settings.get(&key)?;
            app.renderer().render_message(&format!("Set {key} = {stored}"))?;
        }
    }
    Ok(ExitCode::SUCCESS)
}
