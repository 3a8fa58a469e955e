//! Application context: shared state passed to every command handler.
//!
//! `AppContext` owns the output context, the loaded settings, the local
//! stores and the SSH transport, so command signatures stay stable when a
//! cross-cutting concern is added.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;

use crate::application::ports::{HostStore, SettingsStore};
use crate::application::services::dispatch::EngineContext;
use crate::application::services::fleet::{FleetCoordinator, FleetOptions};
use crate::application::services::status_probe::StatusCache;
use crate::domain::Settings;
use crate::infra::event_log::JsonlEventLog;
use crate::infra::host_store::YamlHostStore;
use crate::infra::settings::YamlSettingsStore;
use crate::infra::ssh::SshTransport;
use crate::output::{HumanRenderer, JsonRenderer, OutputContext, Renderer, TerminalReporter};

/// Output rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable terminal output (default).
    Human,
    /// Machine-readable JSON output.
    Json,
}

/// Output rendering flags.
pub struct OutputFlags {
    /// Disable ANSI color output.
    pub no_color: bool,
    /// Suppress non-error output.
    pub quiet: bool,
    /// Enable JSON output mode.
    pub json: bool,
}

/// Behaviour flags.
pub struct BehaviourFlags {
    /// Skip interactive prompts (also set by `CI` / `TGFLEET_YES` env vars).
    pub yes: bool,
}

/// Flags passed from the top-level CLI to `AppContext::new`.
pub struct AppFlags {
    /// Output rendering options.
    pub output: OutputFlags,
    /// Behaviour options.
    pub behaviour: BehaviourFlags,
}

/// Unified application context passed to every command handler.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode).
    pub output: OutputContext,
    /// Output rendering mode (human vs JSON).
    pub mode: OutputMode,
    pub settings_store: YamlSettingsStore,
    /// Settings as loaded at startup.
    pub settings: Settings,
    pub hosts: Arc<YamlHostStore>,
    pub events: JsonlEventLog,
    pub transport: Arc<SshTransport>,
    /// When `true`, skip interactive prompts and use defaults.
    ///
    /// Set when `--yes` / `-y` is passed, or when the `CI` or `TGFLEET_YES`
    /// environment variables are present.
    pub non_interactive: bool,
}

impl AppContext {
    /// Construct an `AppContext` from top-level CLI flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be determined or the
    /// settings file cannot be parsed.
    pub fn new(flags: &AppFlags) -> Result<Self> {
        let ci_env = std::env::var("CI").is_ok() || std::env::var("TGFLEET_YES").is_ok();
        let non_interactive = flags.behaviour.yes || ci_env;

        let mode = if flags.output.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        };

        let settings_store = YamlSettingsStore::new()?;
        let settings = settings_store.load()?;
        let transport = SshTransport::new(&settings.transport, &settings.agent);

        Ok(Self {
            output: OutputContext::new(flags.output.no_color, flags.output.quiet),
            mode,
            settings_store,
            settings,
            hosts: Arc::new(YamlHostStore::new()?),
            events: JsonlEventLog::new()?,
            transport: Arc::new(transport),
            non_interactive,
        })
    }

    /// Returns `true` when JSON output mode is active.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }

    /// Returns the appropriate `Renderer` variant for the current output mode.
    #[must_use]
    pub fn renderer(&self) -> Renderer<'_> {
        match self.mode {
            OutputMode::Human => Renderer::Human(HumanRenderer::new(&self.output)),
            OutputMode::Json => Renderer::Json(JsonRenderer),
        }
    }

    /// Progress reporter for single-host operations.
    #[must_use]
    pub fn reporter(&self) -> TerminalReporter<'_> {
        TerminalReporter::new(&self.output)
    }

    /// Whether spinners and progress bars should be drawn.
    #[must_use]
    pub fn show_progress(&self) -> bool {
        self.output.show_progress() && !self.is_json()
    }

    /// Engine context for running one operation in this process.
    #[must_use]
    pub fn engine<'a>(&'a self, cache: Option<&'a StatusCache>) -> EngineContext<'a, SshTransport> {
        EngineContext {
            transport: self.transport.as_ref(),
            agent: &self.settings.agent,
            status_cache: cache,
        }
    }

    /// Status cache seeded from the stored host records.
    ///
    /// # Errors
    ///
    /// Returns an error if the host store cannot be read.
    pub fn status_cache(&self) -> Result<StatusCache> {
        let cache = StatusCache::new(Duration::from_secs(self.settings.status.cache_ttl_secs));
        cache.seed(self.hosts.list()?.iter(), Utc::now());
        Ok(cache)
    }

    /// Fleet coordinator bound to the SSH transport and host store.
    #[must_use]
    pub fn fleet(&self) -> FleetCoordinator<SshTransport, YamlHostStore> {
        FleetCoordinator::new(
            Arc::clone(&self.transport),
            Arc::clone(&self.hosts),
            self.settings.agent.clone(),
            &FleetOptions::from(&self.settings.fleet),
        )
    }

    /// Ask the user for confirmation.
    ///
    /// When `non_interactive` is `true` (CI, `--yes` flag, or `TGFLEET_YES` env),
    /// returns `default` immediately without prompting.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal prompt fails (e.g. no TTY available).
    pub fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        if self.non_interactive {
            return Ok(default);
        }
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()?;
        Ok(confirmed)
    }
}
