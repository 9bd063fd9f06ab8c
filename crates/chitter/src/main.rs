// SPDX-FileCopyrightText: 2026 Chitter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chitter - voice-call signaling relay.
//!
//! This is the binary entry point for the relay and its admin commands.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod serve;
mod shutdown;

use std::path::PathBuf;
use std::process::ExitCode;

use chitter_config::{ChitterConfig, ConfigError};
use chitter_core::UserId;
use chitter_relay::TokenVerifier;
use clap::{Parser, Subcommand};

/// Chitter - voice-call signaling relay.
#[derive(Parser, Debug)]
#[command(name = "chitter", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard search path.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the relay server.
    Serve,
    /// Inspect configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Print the connection token for a user.
    Token {
        /// User id the token is issued for.
        user: String,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Validate configuration and print the effective values.
    Check,
}

fn load(path: Option<&PathBuf>) -> Result<ChitterConfig, Vec<ConfigError>> {
    match path {
        Some(path) => chitter_config::load_and_validate_path(path),
        None => chitter_config::load_and_validate(),
    }
}

/// Effective configuration as TOML, with the auth secret masked.
fn render_effective(config: &ChitterConfig) -> Result<String, toml::ser::Error> {
    let mut shown = config.clone();
    if shown.relay.auth_secret.is_some() {
        shown.relay.auth_secret = Some("[redacted]".to_string());
    }
    toml::to_string_pretty(&shown)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load(cli.config.as_ref()) {
        Ok(config) => config,
        Err(errors) => {
            chitter_config::render_errors(&errors);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Serve => match serve::run_serve(config).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("chitter: {e}");
                ExitCode::FAILURE
            }
        },
        Commands::Config {
            action: ConfigAction::Check,
        } => match render_effective(&config) {
            Ok(text) => {
                eprintln!("chitter: configuration is valid");
                print!("{text}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("chitter: failed to render configuration: {e}");
                ExitCode::FAILURE
            }
        },
        Commands::Token { user } => {
            let verifier = TokenVerifier::new(config.relay.auth_secret.clone());
            match verifier.issue(&UserId::new(user)) {
                Some(token) => {
                    println!("{token}");
                    ExitCode::SUCCESS
                }
                None => {
                    eprintln!("chitter: relay.auth_secret is not set, the relay accepts any user id");
                    ExitCode::FAILURE
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["chitter", "--config", "relay.toml", "token", "alice"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("relay.toml")));
        assert!(matches!(cli.command, Commands::Token { ref user } if user == "alice"));

        let cli = Cli::try_parse_from(["chitter", "config", "check"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigAction::Check
            }
        ));
        assert!(Cli::try_parse_from(["chitter"]).is_err());
    }

    #[test]
    fn explicit_config_path_is_loaded() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[relay]\nport = 4040\nauth_secret = \"s3cret\"").unwrap();
        let config = load(Some(&file.path().to_path_buf())).unwrap();
        assert_eq!(config.relay.port, 4040);

        let text = render_effective(&config).unwrap();
        assert!(text.contains("4040"));
        assert!(!text.contains("s3cret"));
    }
}
