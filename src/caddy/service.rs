use std::fs;
use std::io::BufRead;

use anyhow::Result;
use colored::Colorize;
use tracing::warn;

use crate::caddy::registry;
use crate::config::Settings;
use crate::prompt;
use crate::system::Shell;

/// Run a systemctl subcommand against the Caddy unit, ignoring its exit code
fn systemctl(settings: &Settings, shell: &dyn Shell, action: &str) -> Result<()> {
    let unit = settings.service.name.as_str();

    if !shell.run("systemctl", &[action, unit])? {
        warn!("systemctl {} {} exited with an error", action, unit);
    }

    Ok(())
}

/// Check whether the Caddy service is active
pub fn is_active(settings: &Settings, shell: &dyn Shell) -> Result<bool> {
    shell.run(
        "systemctl",
        &["is-active", "--quiet", settings.service.name.as_str()],
    )
}

/// Restart the Caddy service
pub fn restart(settings: &Settings, shell: &dyn Shell) -> Result<()> {
    println!("{}", "Restarting Caddy...".blue());

    systemctl(settings, shell, "restart")?;

    if is_active(settings, shell)? {
        println!("{}", "✓ Caddy restarted".green());
    } else {
        println!("{}", "⚠ Caddy is not active after restart".yellow());
        println!(
            "Check logs: journalctl -u {} --no-pager",
            settings.service.name
        );
    }

    Ok(())
}

/// Show Caddy service status
pub fn status(settings: &Settings, shell: &dyn Shell) -> Result<()> {
    println!("{}", "Caddy Status:".blue());
    println!();

    let unit = settings.service.name.as_str();
    if !shell.run("systemctl", &["status", "--no-pager", unit])? {
        warn!("systemctl status {} exited with an error", unit);
    }

    println!();
    if is_active(settings, shell)? {
        println!("  Service: {}", "active".green());
    } else {
        println!("  Service: {}", "inactive".red());
    }

    Ok(())
}

/// Stop the Caddy service
pub fn stop(settings: &Settings, shell: &dyn Shell) -> Result<()> {
    println!("{}", "Stopping Caddy...".blue());

    systemctl(settings, shell, "stop")?;

    println!("{}", "✓ Caddy stopped".green());

    Ok(())
}

/// Ask for confirmation, then uninstall. Returns whether anything was done.
pub fn remove(settings: &Settings, shell: &dyn Shell, input: &mut dyn BufRead) -> Result<bool> {
    println!();
    println!(
        "{} This stops Caddy, purges the {} package and deletes:",
        "⚠".yellow(),
        settings.service.package.bright_white()
    );
    println!("  {}", settings.paths.caddyfile.display());
    println!("  {}", settings.paths.backup().display());
    println!("  {}", settings.paths.registry.display());
    println!("  {}", settings.paths.sources_list.display());
    println!();

    if !prompt::confirm(input, "Remove Caddy and all proxy configuration?")? {
        println!("{} Removal cancelled", "ℹ".blue());
        return Ok(false);
    }

    purge(settings, shell)?;

    Ok(true)
}

/// Stop the service, purge the package and delete every managed file
pub fn purge(settings: &Settings, shell: &dyn Shell) -> Result<()> {
    stop(settings, shell)?;

    println!(
        "{} Purging {}...",
        "ℹ".blue(),
        settings.service.package.bright_white()
    );
    let package = settings.service.package.as_str();
    if !shell.run("apt-get", &["purge", "-y", package])? {
        warn!("apt-get purge {} exited with an error", package);
    }
    if !shell.run("apt-get", &["autoremove", "-y"])? {
        warn!("apt-get autoremove exited with an error");
    }

    for path in registry::remove_all(&settings.paths)? {
        println!("{} Removed {}", "✓".green(), path.display());
    }

    for path in [&settings.paths.sources_list, &settings.paths.keyring] {
        if !path.exists() {
            continue;
        }
        match fs::remove_file(path) {
            Ok(()) => println!("{} Removed {}", "✓".green(), path.display()),
            Err(e) => {
                warn!("failed to remove {:?}: {}", path, e);
                println!(
                    "{} Could not remove {}: {}",
                    "⚠".yellow(),
                    path.display(),
                    e
                );
            }
        }
    }

    println!("{}", "✓ Caddy removed".green());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::shell::fake::RecordingShell;
    use std::io::Cursor;

    fn populated(dir: &std::path::Path) -> Settings {
        let settings = Settings::in_dir(dir);
        fs::write(&settings.paths.caddyfile, ":80 {\n}\n").unwrap();
        registry::append(&settings.paths, "*", "http://127.0.0.1:8080").unwrap();
        fs::write(&settings.paths.sources_list, "deb ...\n").unwrap();
        fs::write(&settings.paths.keyring, "key").unwrap();
        settings
    }

    #[test]
    fn test_restart_checks_activity() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::in_dir(dir.path());
        let shell = RecordingShell::new();

        restart(&settings, &shell).unwrap();

        assert_eq!(
            shell.calls(),
            vec!["systemctl restart caddy", "systemctl is-active --quiet caddy"]
        );
    }

    #[test]
    fn test_status_reports_activity_and_stop_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::in_dir(dir.path());
        let shell = RecordingShell::new();

        status(&settings, &shell).unwrap();
        stop(&settings, &shell).unwrap();

        assert_eq!(
            shell.calls(),
            vec![
                "systemctl status --no-pager caddy",
                "systemctl is-active --quiet caddy",
                "systemctl stop caddy",
            ]
        );
    }

    #[test]
    fn test_confirmed_removal_deletes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let settings = populated(dir.path());
        let shell = RecordingShell::installed();

        let mut input = Cursor::new("y\n");
        assert!(remove(&settings, &shell, &mut input).unwrap());

        assert!(!settings.paths.caddyfile.exists());
        assert!(!settings.paths.backup().exists());
        assert!(!settings.paths.registry.exists());
        assert!(!settings.paths.sources_list.exists());
        assert!(!settings.paths.keyring.exists());
        assert_eq!(
            shell.calls(),
            vec![
                "systemctl stop caddy",
                "apt-get purge -y caddy",
                "apt-get autoremove -y",
            ]
        );
    }

    #[test]
    fn test_purge_removes_managed_files_when_apt_files_resist() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = populated(dir.path());
        // remove_file cannot delete a directory
        settings.paths.sources_list = dir.path().join("sources.list.d");
        fs::create_dir(&settings.paths.sources_list).unwrap();
        let shell = RecordingShell::installed();

        purge(&settings, &shell).unwrap();

        assert!(!settings.paths.caddyfile.exists());
        assert!(!settings.paths.backup().exists());
        assert!(!settings.paths.registry.exists());
        assert!(!settings.paths.keyring.exists());
        assert!(settings.paths.sources_list.exists());
    }

    #[test]
    fn test_declined_removal_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let settings = populated(dir.path());
        let caddyfile = fs::read_to_string(&settings.paths.caddyfile).unwrap();
        let shell = RecordingShell::installed();

        let mut input = Cursor::new("n\n");
        assert!(!remove(&settings, &shell, &mut input).unwrap());

        assert!(shell.calls().is_empty());
        assert_eq!(fs::read_to_string(&settings.paths.caddyfile).unwrap(), caddyfile);
        assert!(settings.paths.backup().exists());
        assert!(settings.paths.registry.exists());
        assert!(settings.paths.sources_list.exists());
    }
}
