use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Get the configuration directory path
/// Checks OH_MY_CADDY_DIR environment variable first,
/// then defaults to ~/.oh-my-caddy
pub fn get_config_dir() -> Result<PathBuf> {
    if let Ok(custom_dir) = env::var("OH_MY_CADDY_DIR") {
        return Ok(PathBuf::from(custom_dir));
    }

    let home_dir = dirs::home_dir().context("Failed to get home directory")?;

    Ok(home_dir.join(".oh-my-caddy"))
}

/// Ensure the configuration directory exists and holds a config.toml
pub fn ensure_config_dir() -> Result<PathBuf> {
    let config_dir = get_config_dir()?;

    fs::create_dir_all(&config_dir).context("Failed to create config directory")?;

    let config_file = config_dir.join("config.toml");
    if !config_file.exists() {
        create_default_config(&config_file)?;
    }

    Ok(config_dir)
}

const DEFAULT_CONFIG: &str = r#"# Configuration for oh-my-caddy

[paths]
# Live Caddy configuration. The one-time backup is written next to it as <caddyfile>.bak
caddyfile = "/etc/caddy/Caddyfile"

# One "<pattern> -> <upstream>" line per managed proxy
registry = "/etc/caddy/omc-proxies.txt"

# Files added when installing from the vendor repository
sources_list = "/etc/apt/sources.list.d/caddy-stable.list"
keyring = "/usr/share/keyrings/caddy-stable-archive-keyring.gpg"

[proxy]
# Site address written in front of every reverse_proxy block
pattern = "*"
upstream_host = "127.0.0.1"

# Timeout for the "is the upstream listening" check
probe_timeout_ms = 1000

[service]
name = "caddy"
package = "caddy"

[repository]
key_url = "https://dl.cloudsmith.io/public/caddy/stable/gpg.key"
sources_url = "https://dl.cloudsmith.io/public/caddy/stable/debian.deb.txt"
"#;

fn create_default_config(config_path: &Path) -> Result<()> {
    fs::write(config_path, DEFAULT_CONFIG).context("Failed to write default config file")?;

    Ok(())
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub paths: PathSettings,
    #[serde(default)]
    pub proxy: ProxySettings,
    #[serde(default)]
    pub service: ServiceSettings,
    #[serde(default)]
    pub repository: RepositorySettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathSettings {
    pub caddyfile: PathBuf,
    pub registry: PathBuf,
    pub sources_list: PathBuf,
    pub keyring: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            caddyfile: PathBuf::from("/etc/caddy/Caddyfile"),
            registry: PathBuf::from("/etc/caddy/omc-proxies.txt"),
            sources_list: PathBuf::from("/etc/apt/sources.list.d/caddy-stable.list"),
            keyring: PathBuf::from("/usr/share/keyrings/caddy-stable-archive-keyring.gpg"),
        }
    }
}

impl PathSettings {
    /// Backup of the Caddyfile as it was before any block was appended
    pub fn backup(&self) -> PathBuf {
        let mut path = self.caddyfile.clone().into_os_string();
        path.push(".bak");
        PathBuf::from(path)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxySettings {
    pub pattern: String,
    pub upstream_host: String,
    pub probe_timeout_ms: u64,
}

impl ProxySettings {
    /// Connect timeout for upstream checks; zero would make every check fail
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms.max(1))
    }
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            pattern: "*".to_string(),
            upstream_host: "127.0.0.1".to_string(),
            probe_timeout_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// systemd unit name
    pub name: String,
    /// apt package name, also the binary looked up on PATH
    pub package: String,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "caddy".to_string(),
            package: "caddy".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RepositorySettings {
    pub key_url: String,
    pub sources_url: String,
}

impl Default for RepositorySettings {
    fn default() -> Self {
        Self {
            key_url: "https://dl.cloudsmith.io/public/caddy/stable/gpg.key".to_string(),
            sources_url: "https://dl.cloudsmith.io/public/caddy/stable/debian.deb.txt"
                .to_string(),
        }
    }
}

/// Load settings from a specific config.toml
pub fn load_settings_from_path(path: &Path) -> Result<Settings> {
    let content = fs::read_to_string(path)
        .context(format!("Failed to read configuration: {:?}", path))?;

    toml::from_str(&content).context("Failed to parse config.toml")
}

/// Load settings from the config directory, falling back to defaults
pub fn load_settings() -> Result<Settings> {
    let config_path = get_config_dir()?.join("config.toml");

    if !config_path.exists() {
        tracing::debug!("no config at {:?}, using defaults", config_path);
        return Ok(Settings::default());
    }

    load_settings_from_path(&config_path)
}

#[cfg(test)]
impl Settings {
    /// Settings with every managed file placed under `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            paths: PathSettings {
                caddyfile: dir.join("Caddyfile"),
                registry: dir.join("proxies.txt"),
                sources_list: dir.join("caddy-stable.list"),
                keyring: dir.join("caddy-stable-archive-keyring.gpg"),
            },
            proxy: ProxySettings {
                probe_timeout_ms: 200,
                ..ProxySettings::default()
            },
            ..Settings::default()
        }
    }
}
