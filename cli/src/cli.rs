//! CLI argument parsing with clap derive

use std::process::ExitCode;

use anyhow::Result;
use clap::builder::FalseyValueParser;
use clap::{ArgAction, Parser, Subcommand};

use crate::app::{AppContext, AppFlags, BehaviourFlags, OutputFlags};
use crate::commands;
use crate::output::{HumanRenderer, JsonRenderer, OutputContext, Renderer};

/// Configure and control Telegraf agents across a fleet of SSH hosts
#[derive(Parser)]
#[command(
    name = "tgfleet",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output (also set by `NO_COLOR`)
    #[arg(
        long,
        global = true,
        env = "NO_COLOR",
        action = ArgAction::SetTrue,
        value_parser = FalseyValueParser::new()
    )]
    pub no_color: bool,

    /// Skip confirmation prompts
    #[arg(short, long, global = true)]
    pub yes: bool,

    /// More diagnostics on stderr (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Fetch, push or test the agent configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),

    /// Start, stop, restart or reload the agent service
    Service(commands::service::ServiceArgs),

    /// Probe agent status or show the fleet overview
    Status(commands::status::StatusArgs),

    /// Manage host records
    #[command(subcommand)]
    Hosts(commands::hosts::HostsCommand),

    /// Show, summarise or prune the event log
    Logs(commands::logs::LogsArgs),

    /// Show or change settings
    #[command(subcommand)]
    Settings(commands::settings::SettingsCommand),

    /// Show version
    Version,
}

impl Cli {
    /// `tracing` filter directive implied by `-v`.
    #[must_use]
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }

    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if local state cannot be loaded or the command fails
    /// before producing a result.
    pub async fn run(self) -> Result<ExitCode> {
        let Cli {
            no_color,
            quiet,
            json,
            yes,
            command,
            ..
        } = self;

        // Needs no local state, so it works even when the settings file is broken.
        if let Command::Version = command {
            let ctx = OutputContext::new(no_color, quiet);
            let renderer = if json {
                Renderer::Json(JsonRenderer)
            } else {
                Renderer::Human(HumanRenderer::new(&ctx))
            };
            commands::version::run(&renderer)?;
            return Ok(ExitCode::SUCCESS);
        }

        let app = AppContext::new(&AppFlags {
            output: OutputFlags {
                no_color,
                quiet,
                json,
            },
            behaviour: BehaviourFlags { yes },
        })?;

        match command {
            Command::Config(cmd) => commands::config::run(&app, cmd).await,
            Command::Service(args) => commands::service::run(&app, args).await,
            Command::Status(args) => commands::status::run(&app, args).await,
            Command::Hosts(cmd) => commands::hosts::run(&app, cmd),
            Command::Logs(args) => commands::logs::run(&app, args),
            Command::Settings(cmd) => commands::settings::run(&app, cmd),
            Command::Version => Ok(ExitCode::SUCCESS),
        }
    }
}
