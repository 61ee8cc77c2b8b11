//! Proxy registry and Caddyfile bookkeeping
//!
//! The registry is a plain text file with one `<pattern> -> <upstream>` line
//! per proxy. The live Caddyfile is expected to be the backup taken before the
//! first proxy was added, followed by one block per registry line, in order.
//! Nothing here talks to the service manager.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::PathSettings;

static LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\S+)\s+->\s+(\S+)\s*$").expect("valid regex"));

static TRAILING_PORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*$").expect("valid regex"));

/// One registry line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProxyEntry {
    /// 1-based position in the registry file
    pub index: usize,
    pub pattern: String,
    pub upstream: String,
    /// Port at the end of the line, if there is one
    pub port: Option<u16>,
}

impl ProxyEntry {
    fn from_line(index: usize, line: &str) -> Self {
        let (pattern, upstream) = match parse_line(line) {
            Some((pattern, upstream)) => (pattern.to_string(), upstream.to_string()),
            None => (String::new(), line.trim().to_string()),
        };

        Self {
            index,
            pattern,
            upstream,
            port: trailing_port(line),
        }
    }
}

/// Build the upstream URL for a local port
pub fn upstream_url(host: &str, port: u16) -> String {
    format!("http://{}:{}", host, port)
}

/// Format a registry line
pub fn render_line(pattern: &str, upstream: &str) -> String {
    format!("{} -> {}", pattern, upstream)
}

/// Format the Caddyfile block appended for one proxy
pub fn render_block(pattern: &str, upstream: &str) -> String {
    format!("\n{} {{\n    reverse_proxy {}\n}}\n", pattern, upstream)
}

/// Split a registry line into pattern and upstream
pub fn parse_line(line: &str) -> Option<(&str, &str)> {
    let caps = LINE_RE.captures(line)?;
    Some((caps.get(1)?.as_str(), caps.get(2)?.as_str()))
}

/// Extract the numeric port a registry line ends with
pub fn trailing_port(line: &str) -> Option<u16> {
    TRAILING_PORT_RE
        .captures(line)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Read the non-blank registry lines; a missing registry has none
pub fn read_lines(registry: &Path) -> Result<Vec<String>> {
    if !registry.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(registry)
        .context(format!("Failed to read registry: {:?}", registry))?;

    Ok(content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.to_string())
        .collect())
}

/// Read the registry as numbered entries
pub fn entries(registry: &Path) -> Result<Vec<ProxyEntry>> {
    Ok(read_lines(registry)?
        .iter()
        .enumerate()
        .map(|(idx, line)| ProxyEntry::from_line(idx + 1, line))
        .collect())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .context(format!("Failed to create directory: {:?}", parent))?;
        }
    }
    Ok(())
}

fn append_to(path: &Path, text: &str) -> Result<()> {
    ensure_parent(path)?;

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .context(format!("Failed to open {:?} for appending", path))?;

    file.write_all(text.as_bytes())
        .context(format!("Failed to append to {:?}", path))?;

    Ok(())
}

/// Snapshot the live Caddyfile unless a backup already exists.
///
/// Returns true when a backup was written. A missing Caddyfile is backed up
/// as an empty file.
pub fn ensure_backup(paths: &PathSettings) -> Result<bool> {
    let backup = paths.backup();
    if backup.exists() {
        return Ok(false);
    }

    ensure_parent(&backup)?;

    if paths.caddyfile.exists() {
        fs::copy(&paths.caddyfile, &backup)
            .context(format!("Failed to back up {:?}", paths.caddyfile))?;
    } else {
        fs::write(&backup, "").context(format!("Failed to write {:?}", backup))?;
    }

    debug!("created backup {:?}", backup);
    Ok(true)
}

/// Append one block to the Caddyfile and one line to the registry
pub fn append(paths: &PathSettings, pattern: &str, upstream: &str) -> Result<ProxyEntry> {
    ensure_backup(paths)?;

    append_to(&paths.caddyfile, &render_block(pattern, upstream))?;

    let line = render_line(pattern, upstream);
    append_to(&paths.registry, &format!("{}\n", line))?;

    let index = read_lines(&paths.registry)?.len();
    Ok(ProxyEntry::from_line(index, &line))
}

/// Outcome of regenerating the Caddyfile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rebuild {
    pub blocks: usize,
    /// The backup was missing and had to be taken from the live Caddyfile
    pub backup_created: bool,
}

/// Outcome of removing a registry line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    pub removed: Option<String>,
    pub rebuild: Rebuild,
}

/// Remove the registry line at the 1-based `index`, then rebuild the Caddyfile.
///
/// An out-of-range index leaves the registry untouched; the Caddyfile is
/// rebuilt either way.
pub fn remove(paths: &PathSettings, index: usize) -> Result<Removal> {
    let mut lines = read_lines(&paths.registry)?;

    let removed = if index >= 1 && index <= lines.len() {
        let line = lines.remove(index - 1);
        let mut content = lines.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        fs::write(&paths.registry, content)
            .context(format!("Failed to write registry: {:?}", paths.registry))?;
        Some(line)
    } else {
        debug!("index {} is outside 1..={}, registry unchanged", index, lines.len());
        None
    };

    let rebuild = rebuild(paths)?;

    Ok(Removal { removed, rebuild })
}

/// Restore the Caddyfile from the backup and replay every registry line.
///
/// A missing backup is taken from the live Caddyfile first, which may
/// already hold appended blocks.
pub fn rebuild(paths: &PathSettings) -> Result<Rebuild> {
    let backup_created = ensure_backup(paths)?;
    if backup_created {
        warn!(
            "backup {:?} was missing and has been recreated from the live Caddyfile",
            paths.backup()
        );
    }

    let backup = paths.backup();
    let mut content =
        fs::read_to_string(&backup).context(format!("Failed to read backup: {:?}", backup))?;

    let mut written = 0;
    for (idx, line) in read_lines(&paths.registry)?.iter().enumerate() {
        match parse_line(line) {
            Some((pattern, upstream)) => {
                content.push_str(&render_block(pattern, upstream));
                written += 1;
            }
            None => warn!("skipping unreadable registry line {}: {}", idx + 1, line),
        }
    }

    ensure_parent(&paths.caddyfile)?;
    fs::write(&paths.caddyfile, content)
        .context(format!("Failed to write {:?}", paths.caddyfile))?;

    Ok(Rebuild {
        blocks: written,
        backup_created,
    })
}

/// Delete the Caddyfile, its backup and the registry. Returns what was removed.
pub fn remove_all(paths: &PathSettings) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();

    for path in [paths.caddyfile.clone(), paths.backup(), paths.registry.clone()] {
        if path.exists() {
            fs::remove_file(&path).context(format!("Failed to remove {:?}", path))?;
            removed.push(path);
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const BASE: &str = ":80 {\n    respond \"hello\"\n}\n";

    fn paths_in(dir: &Path) -> PathSettings {
        PathSettings {
            caddyfile: dir.join("Caddyfile"),
            registry: dir.join("proxies.txt"),
            sources_list: dir.join("caddy.list"),
            keyring: dir.join("caddy.gpg"),
        }
    }

    fn add_port(paths: &PathSettings, port: u16) -> ProxyEntry {
        append(paths, "*", &upstream_url("127.0.0.1", port)).unwrap()
    }

    #[rstest]
    #[case("* -> http://127.0.0.1:8080", Some(8080))]
    #[case("example.com -> http://127.0.0.1:3000  ", Some(3000))]
    // Any trailing digits count, even the last octet of a port-less address
    #[case("* -> http://127.0.0.1", Some(1))]
    #[case("* -> http://localhost:99999", None)]
    #[case("garbage", None)]
    fn test_trailing_port(#[case] line: &str, #[case] expected: Option<u16>) {
        assert_eq!(trailing_port(line), expected);
    }

    #[test]
    fn test_parse_line() {
        assert_eq!(
            parse_line("* -> http://127.0.0.1:8080"),
            Some(("*", "http://127.0.0.1:8080"))
        );
        assert_eq!(parse_line("no arrow here"), None);
    }

    #[test]
    fn test_append_adds_one_line_and_one_block() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths_in(dir.path());
        fs::write(&paths.caddyfile, BASE).unwrap();

        let entry = add_port(&paths, 8080);

        assert_eq!(entry.index, 1);
        assert_eq!(entry.pattern, "*");
        assert_eq!(entry.upstream, "http://127.0.0.1:8080");
        assert_eq!(entry.port, Some(8080));

        let lines = read_lines(&paths.registry).unwrap();
        assert_eq!(lines, vec!["* -> http://127.0.0.1:8080".to_string()]);

        let caddyfile = fs::read_to_string(&paths.caddyfile).unwrap();
        assert_eq!(
            caddyfile,
            format!("{}{}", BASE, render_block("*", "http://127.0.0.1:8080"))
        );
        assert_eq!(caddyfile.matches("reverse_proxy").count(), 1);
    }

    #[test]
    fn test_backup_is_taken_once() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths_in(dir.path());
        fs::write(&paths.caddyfile, BASE).unwrap();

        add_port(&paths, 8080);
        add_port(&paths, 8081);

        assert_eq!(fs::read_to_string(paths.backup()).unwrap(), BASE);
        assert_eq!(read_lines(&paths.registry).unwrap().len(), 2);
    }

    #[test]
    fn test_missing_caddyfile_backs_up_empty() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths_in(dir.path());

        assert!(ensure_backup(&paths).unwrap());
        assert!(!ensure_backup(&paths).unwrap());
        assert_eq!(fs::read_to_string(paths.backup()).unwrap(), "");
    }

    #[test]
    fn test_remove_regenerates_from_backup_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths_in(dir.path());
        fs::write(&paths.caddyfile, BASE).unwrap();

        for port in [8001, 8002, 8003] {
            add_port(&paths, port);
        }

        let removal = remove(&paths, 2).unwrap();
        assert_eq!(removal.removed.as_deref(), Some("* -> http://127.0.0.1:8002"));
        assert!(!removal.rebuild.backup_created);

        let ports: Vec<_> = entries(&paths.registry)
            .unwrap()
            .into_iter()
            .map(|e| (e.index, e.port))
            .collect();
        assert_eq!(ports, vec![(1, Some(8001)), (2, Some(8003))]);

        let expected = format!(
            "{}{}{}",
            BASE,
            render_block("*", "http://127.0.0.1:8001"),
            render_block("*", "http://127.0.0.1:8003")
        );
        assert_eq!(fs::read_to_string(&paths.caddyfile).unwrap(), expected);
    }

    #[rstest]
    #[case(0)]
    #[case(3)]
    #[case(42)]
    fn test_remove_out_of_range_keeps_registry(#[case] index: usize) {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths_in(dir.path());
        fs::write(&paths.caddyfile, BASE).unwrap();
        add_port(&paths, 8001);
        add_port(&paths, 8002);

        let before = fs::read_to_string(&paths.registry).unwrap();

        // Simulate a drifted Caddyfile; the rebuild must still happen
        fs::write(&paths.caddyfile, "drifted\n").unwrap();

        assert_eq!(remove(&paths, index).unwrap().removed, None);
        assert_eq!(fs::read_to_string(&paths.registry).unwrap(), before);

        let caddyfile = fs::read_to_string(&paths.caddyfile).unwrap();
        assert!(caddyfile.starts_with(BASE));
        assert_eq!(caddyfile.matches("reverse_proxy").count(), 2);
    }

    #[test]
    fn test_remove_last_entry_restores_backup() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths_in(dir.path());
        fs::write(&paths.caddyfile, BASE).unwrap();
        add_port(&paths, 8080);

        remove(&paths, 1).unwrap();

        assert!(read_lines(&paths.registry).unwrap().is_empty());
        assert_eq!(fs::read_to_string(&paths.caddyfile).unwrap(), BASE);
    }

    #[test]
    fn test_rebuild_skips_unreadable_lines() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths_in(dir.path());
        fs::write(&paths.caddyfile, BASE).unwrap();
        fs::write(
            &paths.registry,
            "* -> http://127.0.0.1:8001\nnot a proxy line\n\n* -> http://127.0.0.1:8002\n",
        )
        .unwrap();

        assert_eq!(rebuild(&paths).unwrap().blocks, 2);
        assert_eq!(entries(&paths.registry).unwrap().len(), 3);
    }

    #[test]
    fn test_rebuild_reports_recreated_backup() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths_in(dir.path());
        fs::write(&paths.caddyfile, BASE).unwrap();
        add_port(&paths, 8001);
        add_port(&paths, 8002);
        fs::remove_file(paths.backup()).unwrap();

        let removal = remove(&paths, 1).unwrap();

        // The new base already carries both blocks, so the result is suspect
        assert!(removal.rebuild.backup_created);
        assert_eq!(removal.rebuild.blocks, 1);
        assert!(paths.backup().exists());
        assert!(!rebuild(&paths).unwrap().backup_created);
    }

    #[test]
    fn test_remove_all_deletes_managed_files() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths_in(dir.path());
        fs::write(&paths.caddyfile, BASE).unwrap();
        add_port(&paths, 8080);

        let removed = remove_all(&paths).unwrap();

        assert_eq!(removed.len(), 3);
        assert!(!paths.caddyfile.exists());
        assert!(!paths.backup().exists());
        assert!(!paths.registry.exists());
        assert!(remove_all(&paths).unwrap().is_empty());
    }
}
