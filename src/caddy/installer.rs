//! Caddy installation from the vendor apt repository

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use tracing::{debug, warn};

use crate::config::Settings;
use crate::system::Shell;

/// Packages needed before the vendor repository can be added
const PREREQUISITES: &[&str] = &[
    "debian-keyring",
    "debian-archive-keyring",
    "apt-transport-https",
    "curl",
];

/// Check whether the Caddy binary is on PATH
pub fn is_installed(settings: &Settings, shell: &dyn Shell) -> bool {
    shell.has_binary(&settings.service.package)
}

/// Download `url` with curl and return the body
fn fetch(shell: &dyn Shell, url: &str) -> Result<Vec<u8>> {
    let captured = shell.capture("curl", &["-1sLf", url])?;

    if !captured.success {
        anyhow::bail!("Failed to download {}: {}", url, captured.stderr);
    }

    Ok(captured.stdout)
}

fn run_step(shell: &dyn Shell, program: &str, args: &[&str]) -> Result<()> {
    if !shell.run(program, args)? {
        // Failures surface through the final binary check
        warn!("{} {} exited with an error", program, args.join(" "));
    }
    Ok(())
}

fn import_signing_key(settings: &Settings, shell: &dyn Shell) -> Result<()> {
    let key = fetch(shell, &settings.repository.key_url)?;
    let keyring = &settings.paths.keyring;

    if let Some(parent) = keyring.parent() {
        fs::create_dir_all(parent).context("Failed to create keyring directory")?;
    }

    let keyring_str = keyring.to_string_lossy().to_string();
    let args = ["--batch", "--yes", "--dearmor", "-o", keyring_str.as_str()];
    if !shell.feed("gpg", &args, &key)? {
        anyhow::bail!("Failed to import the Caddy signing key into {}", keyring_str);
    }

    Ok(())
}

fn add_sources_list(settings: &Settings, shell: &dyn Shell) -> Result<()> {
    let sources = fetch(shell, &settings.repository.sources_url)?;
    let path: &Path = &settings.paths.sources_list;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create apt sources directory")?;
    }

    fs::write(path, sources).context(format!("Failed to write {:?}", path))?;
    debug!("wrote {:?}", path);

    Ok(())
}

/// Install Caddy unless it is already present.
///
/// Returns an error when the binary is still missing afterwards; callers
/// treat that as fatal.
pub fn install(settings: &Settings, shell: &dyn Shell) -> Result<()> {
    if is_installed(settings, shell) {
        println!("{} Caddy is already installed", "✓".green());
        return Ok(());
    }

    println!("{}", "Installing Caddy...".blue());

    println!("{} Installing prerequisites...", "ℹ".blue());
    let mut args = vec!["install", "-y"];
    args.extend_from_slice(PREREQUISITES);
    run_step(shell, "apt-get", &args)?;

    println!("{} Adding the Caddy signing key...", "ℹ".blue());
    import_signing_key(settings, shell)?;

    println!("{} Adding the Caddy apt repository...", "ℹ".blue());
    add_sources_list(settings, shell)?;

    println!("{} Updating package index...", "ℹ".blue());
    run_step(shell, "apt-get", &["update"])?;

    println!(
        "{} Installing {}...",
        "ℹ".blue(),
        settings.service.package.bright_white()
    );
    run_step(
        shell,
        "apt-get",
        &["install", "-y", settings.service.package.as_str()],
    )?;

    if !is_installed(settings, shell) {
        println!("{}", "✗ Caddy installation failed".red());
        anyhow::bail!(
            "Caddy installation failed: {} not found on PATH",
            settings.service.package
        );
    }

    println!("{}", "✓ Caddy installed successfully".green());

    Ok(())
}
