//! CLI command definitions for oh-my-caddy
//!
//! This module contains all the clap-based command definitions and argument parsing.

use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "omc")]
#[command(about = "Install Caddy and manage local reverse proxies", long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Runs the interactive menu when omitted
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Open the interactive menu
    Menu,
    /// Install Caddy from the vendor apt repository
    Install,
    /// Manage reverse proxy entries
    Proxy {
        #[command(subcommand)]
        subcommand: ProxyCommands,
    },
    /// Control the Caddy systemd service
    Service {
        #[command(subcommand)]
        subcommand: ServiceCommands,
    },
    /// Stop Caddy, purge the package and delete all managed files
    Uninstall {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum ProxyCommands {
    /// Proxy every host to a local port
    Add {
        #[arg(value_name = "PORT")]
        port: String,
    },
    /// List proxy entries and whether their upstream is listening
    List {
        /// Print entries as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove the entry at the given position (as shown by `list`)
    Remove {
        #[arg(value_name = "INDEX")]
        index: String,
    },
}

#[derive(Subcommand)]
pub enum ServiceCommands {
    /// Restart the Caddy service
    Restart,
    /// Show the Caddy service status
    Status,
    /// Stop the Caddy service
    Stop,
}
