//! Configuration loading for the panel daemon.
//!
//! Loads configuration from TOML files and/or environment variables using
//! figment, making the daemon container-friendly.
//!
//! # Configuration Sources (in order of priority, lowest to highest)
//!
//! 1. Default values (from `#[serde(default)]` attributes)
//! 2. TOML config file (if provided)
//! 3. Environment variables (prefix: `PANELD_`, nested with `__`)
//!
//! # Environment Variable Naming
//!
//! - `PANELD_HTTP__LISTEN_ADDR` → `http.listen_addr`
//! - `PANELD_FILES__BASE_DIR` → `files.base_dir`
//! - `PANELD_SESSION__INACTIVITY_TIMEOUT_MINUTES` → `session.inactivity_timeout_minutes`

use anyhow::{ensure, Context, Result};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration for the panel daemon.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// HTTP server settings
    #[serde(default)]
    pub http: HttpConfig,

    /// File browser sandbox settings
    #[serde(default)]
    pub files: FilesConfig,

    /// Session defaults applied at login
    #[serde(default)]
    pub session: SessionConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    /// Address to listen on
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:8088".to_string()
}

/// File browser sandbox configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FilesConfig {
    /// The single absolute directory file operations must never escape.
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
        }
    }
}

fn default_base_dir() -> PathBuf {
    PathBuf::from("/")
}

/// Session defaults used when creating records at login.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Sliding inactivity window, in minutes.
    #[serde(default = "default_timeout_minutes")]
    pub inactivity_timeout_minutes: u64,

    /// Disable the inactivity timeout entirely.
    #[serde(default)]
    pub disable_auto_logout: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout_minutes: default_timeout_minutes(),
            disable_auto_logout: false,
        }
    }
}

fn default_timeout_minutes() -> u64 {
    30
}

impl Config {
    /// Load configuration from TOML file and environment variables.
    pub fn load(path: &Path) -> Result<Self> {
        let mut figment = Figment::new();

        if path.exists() {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed("PANELD_").split("__"));

        let config: Config = figment.extract().with_context(|| {
            format!(
                "Failed to load config from {} and environment",
                path.display()
            )
        })?;
        config.validate()?;

        Ok(config)
    }

    /// Reject configurations the sandbox cannot enforce.
    fn validate(&self) -> Result<()> {
        ensure!(
            self.files.base_dir.is_absolute(),
            "files.base_dir must be an absolute path, got {}",
            self.files.base_dir.display()
        );
        ensure!(
            self.session.inactivity_timeout_minutes > 0,
            "session.inactivity_timeout_minutes must be positive"
        );
        Ok(())
    }

    /// Get the default config file path
    /// - macOS: ~/Library/Application Support/paneld/config.toml
    /// - Linux: ~/.config/paneld/config.toml
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("paneld")
            .join("config.toml")
    }

    /// Get the default data directory (for stores, keys, logs)
    /// - macOS: ~/Library/Application Support/paneld/
    /// - Linux: ~/.local/share/paneld/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("paneld")
    }
}

/// Create a default configuration template
pub fn default_config_template() -> String {
    let data_dir = Config::default_data_dir();
    let data_dir_str = data_dir.display();

    format!(
        r#"# paneld configuration
# Data directory: {data_dir_str}

[http]
listen_addr = "127.0.0.1:8088"

[files]
# The sandbox base: the file browser can never escape this directory.
base_dir = "/"

[session]
# Sliding inactivity window; each validated request resets it.
inactivity_timeout_minutes = 30
disable_auto_logout = false
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::providers::Toml as TomlProvider;

    /// Helper to parse TOML config strings in tests
    fn parse_config(toml_str: &str) -> Config {
        Figment::new()
            .merge(TomlProvider::string(toml_str))
            .extract()
            .expect("Failed to parse test config")
    }

    #[test]
    fn test_defaults() {
        let config = parse_config("");
        assert_eq!(config.http.listen_addr, "127.0.0.1:8088");
        assert_eq!(config.files.base_dir, PathBuf::from("/"));
        assert_eq!(config.session.inactivity_timeout_minutes, 30);
        assert!(!config.session.disable_auto_logout);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let config = parse_config(
            r#"
[http]
listen_addr = "0.0.0.0:9000"

[files]
base_dir = "/srv/data"

[session]
inactivity_timeout_minutes = 15
disable_auto_logout = true
"#,
        );
        assert_eq!(config.http.listen_addr, "0.0.0.0:9000");
        assert_eq!(config.files.base_dir, PathBuf::from("/srv/data"));
        assert_eq!(config.session.inactivity_timeout_minutes, 15);
        assert!(config.session.disable_auto_logout);
    }

    #[test]
    fn test_relative_base_dir_rejected() {
        let config = parse_config(
            r#"
[files]
base_dir = "data"
"#,
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_template_parses() {
        let config = parse_config(&default_config_template());
        assert!(config.validate().is_ok());
    }
}
