//! Interactive menu loop

use std::io::BufRead;

use anyhow::Result;
use colored::Colorize;
use tracing::debug;

use crate::caddy::{installer, proxy, service};
use crate::config::Settings;
use crate::prompt;
use crate::system::Shell;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Install,
    AddProxy,
    ListProxies,
    DeleteProxy,
    Restart,
    Status,
    Uninstall,
    Quit,
}

impl Choice {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(Self::Install),
            "2" => Some(Self::AddProxy),
            "3" => Some(Self::ListProxies),
            "4" => Some(Self::DeleteProxy),
            "5" => Some(Self::Restart),
            "6" => Some(Self::Status),
            "7" => Some(Self::Uninstall),
            "0" => Some(Self::Quit),
            _ => None,
        }
    }
}

fn print_menu(settings: &Settings, shell: &dyn Shell) {
    let installed = if installer::is_installed(settings, shell) {
        "installed".green()
    } else {
        "not installed".red()
    };

    println!();
    println!("{} ({})", "Caddy reverse proxy manager".blue().bold(), installed);
    println!("  1. Install Caddy");
    println!("  2. Add reverse proxy");
    println!("  3. List reverse proxies");
    println!("  4. Delete reverse proxy");
    println!("  5. Restart Caddy");
    println!("  6. Caddy status");
    println!("  7. Uninstall Caddy");
    println!("  0. Quit");
    println!();
}

/// Run one menu action. Only a failed install is propagated.
fn dispatch(
    choice: Choice,
    settings: &Settings,
    shell: &dyn Shell,
    input: &mut dyn BufRead,
) -> Result<()> {
    let result = match choice {
        Choice::Install => return installer::install(settings, shell),
        Choice::AddProxy => match prompt::ask(input, "Local port to proxy to: ")? {
            Some(port) => proxy::add(settings, shell, &port).map(|_| ()),
            None => Ok(()),
        },
        Choice::ListProxies => proxy::list(settings).map(|proxies| proxy::print_list(&proxies)),
        Choice::DeleteProxy => {
            match proxy::list(settings) {
                Ok(proxies) => proxy::print_list(&proxies),
                Err(e) => println!("{} {:#}", "⚠".yellow(), e),
            }
            match prompt::ask(input, "Entry number to delete: ")? {
                Some(index) => proxy::remove(settings, shell, &index).map(|_| ()),
                None => Ok(()),
            }
        }
        Choice::Restart => service::restart(settings, shell),
        Choice::Status => service::status(settings, shell),
        Choice::Uninstall => service::remove(settings, shell, input).map(|_| ()),
        Choice::Quit => Ok(()),
    };

    if let Err(e) = result {
        println!("{} {:#}", "✗".red(), e);
    }

    Ok(())
}

/// Show the menu until the user quits or input ends
pub fn run(settings: &Settings, shell: &dyn Shell, input: &mut dyn BufRead) -> Result<()> {
    loop {
        print_menu(settings, shell);

        let Some(line) = prompt::ask(input, "Choose an option [0-7]: ")? else {
            return Ok(());
        };

        let Some(choice) = Choice::parse(&line) else {
            println!("{} Invalid choice: {}", "⚠".yellow(), line.bright_white());
            continue;
        };

        debug!("menu choice {:?}", choice);

        if choice == Choice::Quit {
            println!("Bye");
            return Ok(());
        }

        dispatch(choice, settings, shell, input)?;
    }
}
