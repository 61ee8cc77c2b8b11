use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use crate::caddy::{registry, service};
use crate::config::Settings;
use crate::system::{Shell, probe};

/// A registry entry annotated with a live reachability check
#[derive(Debug, Clone, Serialize)]
pub struct ListedProxy {
    #[serde(flatten)]
    pub entry: registry::ProxyEntry,
    pub listening: bool,
}

fn port_is_listening(settings: &Settings, port: u16) -> bool {
    probe::is_listening(
        &settings.proxy.upstream_host,
        port,
        settings.proxy.probe_timeout(),
    )
}

/// Parse a user-supplied port, printing why it was rejected
fn parse_port(raw: &str) -> Option<u16> {
    let raw = raw.trim();
    if raw.is_empty() {
        println!("{} Port cannot be empty", "⚠".yellow());
        return None;
    }

    match raw.parse::<u16>() {
        Ok(port) if port > 0 => Some(port),
        _ => {
            println!("{} Invalid port: {}", "⚠".yellow(), raw.bright_white());
            None
        }
    }
}

/// Add a reverse proxy from every host to a local port.
///
/// Returns the new entry, or `None` when the input was rejected.
pub fn add(
    settings: &Settings,
    shell: &dyn Shell,
    raw_port: &str,
) -> Result<Option<registry::ProxyEntry>> {
    let Some(port) = parse_port(raw_port) else {
        return Ok(None);
    };

    let upstream = registry::upstream_url(&settings.proxy.upstream_host, port);
    let entry = registry::append(&settings.paths, &settings.proxy.pattern, &upstream)?;

    println!(
        "{} Added proxy rule: {} -> {}",
        "✓".green(),
        entry.pattern.bright_white(),
        entry.upstream.bright_white()
    );

    service::restart(settings, shell)?;

    if port_is_listening(settings, port) {
        println!("{} Upstream on port {} is running", "✓".green(), port);
    } else {
        println!(
            "{} Nothing is listening on port {} yet",
            "⚠".yellow(),
            port
        );
    }

    Ok(Some(entry))
}

/// Read every registry entry and probe its port
pub fn list(settings: &Settings) -> Result<Vec<ListedProxy>> {
    let entries = registry::entries(&settings.paths.registry)?;

    Ok(entries
        .into_iter()
        .map(|entry| {
            let listening = entry
                .port
                .map(|port| port_is_listening(settings, port))
                .unwrap_or(false);
            ListedProxy { entry, listening }
        })
        .collect())
}

/// Print the list as a table
pub fn print_list(proxies: &[ListedProxy]) {
    if proxies.is_empty() {
        println!("{}", "No proxy rules found".yellow());
        return;
    }

    println!("{}", "Proxy Rules:".blue());
    println!();
    println!("  {:<4} {:<10} {:<32} {}", "#", "PATTERN", "UPSTREAM", "STATUS");
    println!("  {}", "-".repeat(60));

    for proxy in proxies {
        let status = if proxy.listening {
            "running".green()
        } else {
            "not running".red()
        };
        println!(
            "  {:<4} {:<10} {:<32} {}",
            proxy.entry.index,
            proxy.entry.pattern,
            proxy.entry.upstream.bright_white(),
            status
        );
    }
}

/// Print the list as a JSON array
pub fn print_list_json(proxies: &[ListedProxy]) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(proxies)?);
    Ok(())
}

/// Remove the entry at a 1-based position and rebuild the Caddyfile.
///
/// A numeric index outside the registry removes nothing but still rebuilds
/// and restarts. Returns whether the input was accepted.
pub fn remove(settings: &Settings, shell: &dyn Shell, raw_index: &str) -> Result<bool> {
    let raw_index = raw_index.trim();
    if raw_index.is_empty() {
        println!("{} Entry number cannot be empty", "⚠".yellow());
        return Ok(false);
    }

    let Ok(index) = raw_index.parse::<usize>() else {
        println!(
            "{} Invalid entry number: {}",
            "⚠".yellow(),
            raw_index.bright_white()
        );
        return Ok(false);
    };

    let removal = registry::remove(&settings.paths, index)?;
    match &removal.removed {
        Some(line) => println!("{} Removed proxy rule: {}", "✓".green(), line.bright_white()),
        None => println!("{} No proxy rule at position {}", "⚠".yellow(), index),
    }

    if removal.rebuild.backup_created {
        println!(
            "{} Backup {} was missing and was recreated from the current Caddyfile; \
             check it for duplicated proxy blocks",
            "⚠".yellow(),
            settings.paths.backup().display()
        );
    }

    println!("{} Caddyfile rebuilt from backup", "ℹ".blue());

    service::restart(settings, shell)?;

    Ok(true)
}
