// SPDX-FileCopyrightText: 2026 Soporte Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Soporte - keeps a local view of the help-desk ticket system in sync.
//!
//! This is the operator entry point: it decodes credentials, runs a live
//! dashboard session, and performs one-shot refreshes and ticket actions.

mod act;
mod credential;
mod render;
mod sync;
mod token;
mod watch;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use soporte_config::SoporteConfig;
use tracing::error;

/// Soporte - real-time ticket dashboard sync client.
#[derive(Parser, Debug)]
#[command(name = "soporte", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Decode a credential and report who it belongs to.
    Token {
        /// The `header.payload.signature` credential.
        credential: String,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Run a live dashboard session until interrupted.
    Watch {
        /// Credential to use. Defaults to the stored session.
        #[arg(long)]
        credential: Option<String>,
        /// Persist the credential for later sessions.
        #[arg(long)]
        remember: bool,
        /// Open the comment view of this ticket (repeatable).
        #[arg(long = "ticket")]
        tickets: Vec<String>,
    },
    /// Refresh every domain once and print the tickets.
    Sync {
        /// Credential to use. Defaults to the stored session.
        #[arg(long)]
        credential: Option<String>,
        /// Also probe similar-ticket recommendations for open tickets.
        #[arg(long)]
        recommendations: bool,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Perform one ticket action (asignar, reasignar, estado, comentar).
    Act {
        /// Ticket to act on.
        ticket: String,
        /// Action name.
        action: String,
        /// Analyst id, target status, or comment text.
        argument: String,
        /// Credential to use. Defaults to the stored session.
        #[arg(long)]
        credential: Option<String>,
    },
    /// Clear every stored session credential.
    Logout,
    /// Print the effective configuration as TOML.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => soporte_config::load_and_validate_path(path),
        None => soporte_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            soporte_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.client.log_level);

    if let Err(e) = run(cli.command, &config).await {
        error!(error = %e, "command failed");
        eprintln!("soporte: {e}");
        std::process::exit(1);
    }
}

async fn run(
    command: Option<Commands>,
    config: &SoporteConfig,
) -> Result<(), soporte_core::SoporteError> {
    match command {
        Some(Commands::Token { credential, json }) => token::run_token(&credential, json),
        Some(Commands::Watch {
            credential,
            remember,
            tickets,
        }) => {
            let credential = credential::resolve(config, credential, remember)?;
            watch::run_watch(config, &credential, &tickets).await
        }
        Some(Commands::Sync {
            credential,
            recommendations,
            json,
        }) => {
            let credential = credential::resolve(config, credential, false)?;
            sync::run_sync(config, &credential, recommendations, json).await
        }
        Some(Commands::Act {
            ticket,
            action,
            argument,
            credential,
        }) => {
            let credential = credential::resolve(config, credential, false)?;
            act::run_act(config, &credential, &ticket, &action, &argument).await
        }
        Some(Commands::Logout) => credential::logout(config),
        Some(Commands::Config) => print_config(config),
        None => {
            println!("soporte: use --help for available commands");
            Ok(())
        }
    }
}

fn print_config(config: &SoporteConfig) -> Result<(), soporte_core::SoporteError> {
    let rendered = toml::to_string_pretty(config)
        .map_err(|e| soporte_core::SoporteError::Config(format!("failed to render config: {e}")))?;
    print!("{rendered}");
    Ok(())
}

/// Initialize the tracing subscriber with an env-filter.
///
/// `RUST_LOG` wins when set. Output goes to stderr so command output on
/// stdout stays machine-readable.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("soporte={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_every_subcommand() {
        let cli = Cli::try_parse_from(["soporte", "token", "a.b.c", "--json"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Token { ref credential, json: true }) if credential == "a.b.c"
        ));

        let cli = Cli::try_parse_from([
            "soporte",
            "watch",
            "--remember",
            "--ticket",
            "42",
            "--ticket",
            "43",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Watch {
                credential,
                remember,
                tickets,
            }) => {
                assert_eq!(credential, None);
                assert!(remember);
                assert_eq!(tickets, vec!["42", "43"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let cli = Cli::try_parse_from([
            "soporte",
            "act",
            "42",
            "asignar",
            "7",
            "--credential",
            "x.y.z",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Act {
                ticket,
                action,
                argument,
                credential,
            }) => {
                assert_eq!(ticket, "42");
                assert_eq!(action, "asignar");
                assert_eq!(argument, "7");
                assert_eq!(credential.as_deref(), Some("x.y.z"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn config_flag_is_global() {
        let cli = Cli::try_parse_from(["soporte", "config", "--config", "/tmp/soporte.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/soporte.toml")));
        assert!(matches!(cli.command, Some(Commands::Config)));
    }

    #[test]
    fn token_requires_a_credential() {
        assert!(Cli::try_parse_from(["soporte", "token"]).is_err());
    }

    #[test]
    fn default_config_renders_as_toml() {
        let config = SoporteConfig::default();
        let rendered = toml::to_string_pretty(&config).unwrap();
        assert!(rendered.contains("[api]"));
        assert!(rendered.contains("base_url"));
        let reparsed = soporte_config::load_and_validate_str(&rendered);
        assert!(reparsed.is_ok());
    }
}
