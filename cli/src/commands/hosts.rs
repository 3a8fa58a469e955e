//! `tgfleet hosts`: manage host records.

use std::io::{BufRead, IsTerminal};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Args, Subcommand, ValueEnum};

use crate::app::AppContext;
use crate::application::ports::HostStore;
use crate::commands::require_host;
use crate::domain::host::{DEFAULT_SSH_PORT, DEFAULT_SSH_USER};
use crate::domain::{Credential, Host, HostError};

/// Hosts subcommands.
#[derive(Subcommand)]
pub enum HostsCommand {
    /// List registered hosts
    List,
    /// Show one host record
    Show {
        /// Host id
        host: String,
    },
    /// Register a host
    Add(AddArgs),
    /// Remove a host record
    Remove {
        /// Host id
        host: String,
    },
    /// Replace the SSH credential of a host
    SetCredential {
        /// Host id
        host: String,
        #[command(flatten)]
        credential: CredentialArgs,
    },
    /// Enable or disable fleet-wide status checks for a host
    Monitoring {
        /// Host id
        host: String,
        /// New state
        state: Toggle,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

/// Arguments for `hosts add`.
#[derive(Args)]
pub struct AddArgs {
    /// Host id (letters, digits, '.', '-' or '_')
    pub host: String,

    /// IPv4 or IPv6 address
    #[arg(long)]
    pub ip: String,

    /// SSH port (out-of-range values fall back to 22)
    #[arg(long, default_value_t = u32::from(DEFAULT_SSH_PORT))]
    pub port: u32,

    /// SSH user
    #[arg(long, default_value = DEFAULT_SSH_USER)]
    pub user: String,

    #[command(flatten)]
    pub credential: CredentialArgs,

    /// Agent configuration path on this host, overriding agent.config_path
    #[arg(long, value_name = "PATH")]
    pub config_path: Option<String>,

    /// Pinned SHA-256 host key fingerprint (hex)
    #[arg(long, value_name = "SHA256")]
    pub host_key: Option<String>,

    /// Exclude the host from `status --all`
    #[arg(long)]
    pub no_monitoring: bool,
}

/// Where the SSH credential comes from.
#[derive(Args)]
pub struct CredentialArgs {
    /// Read the SSH password from the first line of stdin
    #[arg(long, conflicts_with = "key_file")]
    pub password_stdin: bool,

    /// Private key file for public-key authentication
    #[arg(long, value_name = "PATH")]
    pub key_file: Option<PathBuf>,

    /// Environment variable holding the private key passphrase
    #[arg(long, value_name = "VAR", requires = "key_file")]
    pub passphrase_env: Option<String>,
}

impl CredentialArgs {
    /// Build the credential, prompting for a password when nothing was
    /// given and a terminal is available.
    fn resolve(&self, app: &AppContext) -> Result<Credential> {
        if let Some(path) = &self.key_file {
            let key = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read key file {}", path.display()))?;
            let passphrase = match &self.passphrase_env {
                Some(var) => Some(
                    std::env::var(var)
                        .with_context(|| format!("environment variable {var} is not set"))?,
                ),
                None => None,
            };
            return Ok(Credential::private_key(key, passphrase));
        }

        if self.password_stdin {
            let mut line = String::new();
            std::io::stdin()
                .lock()
                .read_line(&mut line)
                .context("cannot read password from stdin")?;
            let secret = line.trim_end_matches(['\r', '\n']).to_string();
            return Ok(Credential::password(secret));
        }

        if app.non_interactive || !std::io::stdin().is_terminal() {
            bail!("No credential given. Use --password-stdin or --key-file <PATH>.");
        }
        let secret = dialoguer::Password::new()
            .with_prompt("SSH password")
            .interact()?;
        Ok(Credential::password(secret))
    }
}

/// Run the hosts command.
///
/// # Errors
///
/// Returns an error if a host is unknown or invalid, or the host store
/// cannot be read or written.
pub fn run(app: &AppContext, cmd: HostsCommand) -> Result<ExitCode> {
    match cmd {
        HostsCommand::List => {
            app.renderer().render_hosts(&app.hosts.list()?)?;
        }
        HostsCommand::Show { host } => {
            app.renderer().render_host(&require_host(app, &host)?)?;
        }
        HostsCommand::Add(args) => add(app, &args)?,
        HostsCommand::Remove { host } => return remove(app, &host),
        HostsCommand::SetCredential { host, credential } => {
            let mut record = require_host(app, &host)?;
            record.set_credential(credential.resolve(app)?);
            app.hosts.upsert(&record)?;
            app.renderer()
                .render_message(&format!("Updated credential for {host}"))?;
        }
        HostsCommand::Monitoring { host, state } => {
            let mut record = require_host(app, &host)?;
            record.monitoring_enabled = matches!(state, Toggle::On);
            app.hosts.upsert(&record)?;
            let word = if record.monitoring_enabled { "enabled" } else { "disabled" };
            app.renderer()
                .render_message(&format!("Monitoring {word} for {host}"))?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn add(app: &AppContext, args: &AddArgs) -> Result<()> {
    if app.hosts.get(&args.host)?.is_some() {
        return Err(HostError::AlreadyExists(args.host.clone()).into());
    }

    let mut host = Host::new(&args.host, args.ip.trim(), args.credential.resolve(app)?);
    host.ssh_port = args.port;
    host.ssh_user.clone_from(&args.user);
    host.config_path.clone_from(&args.config_path);
    host.host_key_sha256 = args.host_key.as_ref().map(|k| k.trim().to_ascii_lowercase());
    host.monitoring_enabled = !args.no_monitoring;
    // Logs the coercion warning once, at registration time.
    let port = host.effective_port();

    app.hosts.upsert(&host)?;
    tracing::info!(host = %host.hostname, ip = %host.ip_address, port, "host added");
    app.renderer().render_message(&format!(
        "Added {} ({}@{}:{port})",
        host.hostname, host.ssh_user, host.ip_address
    ))
}

fn remove(app: &AppContext, hostname: &str) -> Result<ExitCode> {
    require_host(app, hostname)?;
    if !app.confirm(&format!("Remove host {hostname}?"), true)? {
        app.output.info("Cancelled.");
        return Ok(ExitCode::SUCCESS);
    }
    app.hosts.remove(hostname)?;
    app.renderer().render_message(&format!("Removed {hostname}"))?;
    Ok(ExitCode::SUCCESS)
}
