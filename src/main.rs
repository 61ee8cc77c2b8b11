//! oh-my-caddy (omc) - Caddy reverse proxy setup CLI
//!
//! Installs Caddy from the vendor apt repository, proxies every host to a
//! local port, and drives the systemd service, from an interactive menu or
//! from subcommands.

use std::io;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{Level, debug};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod caddy;
mod cli;
mod config;
mod menu;
mod prompt;
mod system;

use cli::{Cli, Commands, ProxyCommands, ServiceCommands};
use system::SystemShell;

fn init_tracing(verbose: u8) -> Result<()> {
    let log_level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let env_filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose)?;

    // Ensure configuration directory exists on startup
    let config_dir = config::ensure_config_dir()?;
    debug!("using config directory {:?}", config_dir);

    let settings = config::load_settings()?;
    let shell = SystemShell;
    let stdin = io::stdin();

    match cli.command {
        None | Some(Commands::Menu) => {
            menu::run(&settings, &shell, &mut stdin.lock())?;
        }
        Some(Commands::Install) => {
            caddy::installer::install(&settings, &shell)?;
        }
        Some(Commands::Proxy { subcommand }) => match subcommand {
            ProxyCommands::Add { port } => {
                caddy::proxy::add(&settings, &shell, &port)?;
            }
            ProxyCommands::List { json } => {
                let proxies = caddy::proxy::list(&settings)?;
                if json {
                    caddy::proxy::print_list_json(&proxies)?;
                } else {
                    caddy::proxy::print_list(&proxies);
                }
            }
            ProxyCommands::Remove { index } => {
                caddy::proxy::remove(&settings, &shell, &index)?;
            }
        },
        Some(Commands::Service { subcommand }) => match subcommand {
            ServiceCommands::Restart => {
                caddy::service::restart(&settings, &shell)?;
            }
            ServiceCommands::Status => {
                caddy::service::status(&settings, &shell)?;
            }
            ServiceCommands::Stop => {
                caddy::service::stop(&settings, &shell)?;
            }
        },
        Some(Commands::Uninstall { yes }) => {
            if yes {
                caddy::service::purge(&settings, &shell)?;
            } else {
                caddy::service::remove(&settings, &shell, &mut stdin.lock())?;
            }
        }
    }

    Ok(())
}
