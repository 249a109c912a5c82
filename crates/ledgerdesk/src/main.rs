mod cli;
mod commands;
mod error;
mod notifier;
mod output;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use secrecy::SecretString;
use tracing_subscriber::EnvFilter;
use url::Url;

use ledgerdesk_config::ConfigError;
use ledgerdesk_core::{ClientConfig, Session, TlsVerification};

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;
use crate::notifier::ConsoleNotifier;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Local-only commands
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),
        Command::Decode(args) => commands::decode::handle(&args, &cli.global),
        Command::Columns(args) => commands::columns::handle(args, &cli.global),
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "ledgerdesk", &mut std::io::stdout());
            Ok(())
        }

        // Everything else talks to the ledger API
        cmd => {
            let mut config = build_client_config(&cli.global)?;
            if let Command::Watch(cli::WatchArgs {
                realtime_url: Some(ref url),
                ..
            }) = cmd
            {
                config.realtime_url = Some(parse_url("realtime-url", url)?);
            }
            let notifier = Arc::new(ConsoleNotifier::new(&cli.global));
            let session = Session::new(config, notifier)?;

            tracing::debug!(command = ?cmd, "dispatching command");
            let result = commands::dispatch(cmd, &session, &cli.global).await;
            session.disconnect().await;
            result
        }
    }
}

/// Build a `ClientConfig` from the config file, the active profile and
/// command-line overrides.
fn build_client_config(global: &GlobalOpts) -> Result<ClientConfig, CliError> {
    let cfg = ledgerdesk_config::load_config()?;

    let mut config = match cfg.profile(global.profile.as_deref()) {
        Ok((name, profile)) => {
            let mut profile = profile.clone();
            if let Some(ref url) = global.api_url {
                profile.api_url.clone_from(url);
            }
            ledgerdesk_config::profile_to_client_config(&profile, name, &cfg.defaults)?
        }
        // An explicitly named profile must exist
        Err(err @ ConfigError::UnknownProfile { .. }) if global.profile.is_some() => {
            return Err(err.into());
        }
        Err(_) => {
            let url = global.api_url.as_deref().ok_or_else(|| CliError::NoConfig {
                path: ledgerdesk_config::config_path().display().to_string(),
            })?;
            let mut config = ClientConfig::new(parse_url("api-url", url)?);
            config.timeout = Duration::from_secs(cfg.defaults.timeout);
            config.retry = cfg.defaults.retry;
            config.stale_time = Duration::from_secs(cfg.defaults.stale_time);
            if cfg.defaults.insecure {
                config.tls = TlsVerification::DangerAcceptInvalid;
            }
            config
        }
    };

    if let Some(ref token) = global.token {
        config.token = Some(SecretString::from(token.clone()));
    }
    if let Some(ref branch) = global.branch {
        config.branch_id = Some(branch.clone());
    }
    if global.insecure {
        config.tls = TlsVerification::DangerAcceptInvalid;
    }
    if let Some(secs) = global.timeout {
        config.timeout = Duration::from_secs(secs);
    }
    Ok(config)
}

fn parse_url(field: &str, raw: &str) -> Result<Url, CliError> {
    raw.parse().map_err(|e| CliError::Validation {
        field: field.into(),
        reason: format!("invalid URL '{raw}': {e}"),
    })
}
