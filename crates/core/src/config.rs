//! Application configuration.
//!
//! Values are layered: built-in defaults, then `config.toml` under the
//! user's config directory, then `ELBATUI_*` environment variables.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use tracing::info;
use url::Url;

/// Directory name used under the platform config/data directories.
pub const APP_DIR: &str = "elbatui";

const DEFAULT_API_BASE: &str = "http://localhost:17000/api/v1";

const DEFAULT_CONFIG: &str = r#"# elbatui configuration

# Root of the registry HTTP API.
api_base = "http://localhost:17000/api/v1"

# Per-request timeout in seconds.
request_timeout_secs = 30

# Route opened at startup: "/", "/search?q=...", "/package/<group>/<name>", "/profile".
start_route = "/"
"#;

/// Runtime configuration for the client and the terminal front-end.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Base URL of the registry API, without trailing slash.
    pub api_base: String,
    /// Per-request timeout.
    pub request_timeout_secs: u64,
    /// Directory receiving log files.
    pub log_dir: PathBuf,
    /// Route shown when the application starts.
    pub start_route: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            request_timeout_secs: 30,
            log_dir: default_log_dir(),
            start_route: "/".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default file location and environment.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    /// Load configuration using `path` as the optional file layer.
    pub fn load_from(path: &Path) -> Result<Self> {
        let defaults = AppConfig::default();
        let settings = Config::builder()
            .set_default("api_base", defaults.api_base)?
            .set_default(
                "request_timeout_secs",
                defaults.request_timeout_secs as i64,
            )?
            .set_default("log_dir", defaults.log_dir.to_string_lossy().to_string())?
            .set_default("start_route", defaults.start_route)?
            .add_source(File::from(path).format(FileFormat::Toml).required(false))
            .add_source(Environment::with_prefix("ELBATUI"))
            .build()
            .with_context(|| format!("failed to read configuration {}", path.display()))?;

        let mut config: AppConfig = settings
            .try_deserialize()
            .context("invalid configuration values")?;
        config.normalize()?;
        Ok(config)
    }

    /// Request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    fn normalize(&mut self) -> Result<()> {
        let trimmed = self.api_base.trim().trim_end_matches('/').to_string();
        let parsed = Url::parse(&trimmed)
            .with_context(|| format!("api_base is not a valid URL: {trimmed}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("api_base must use http or https, got {}", parsed.scheme());
        }
        self.api_base = trimmed;
        Ok(())
    }
}

/// Path of the user's configuration file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("config.toml")
}

fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("logs")
}

/// Write the commented default configuration if no file exists yet.
pub fn ensure_default_config() -> Result<()> {
    write_default_config(&config_path())
}

fn write_default_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;
    }
    fs::write(path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write default config {}", path.display()))?;
    info!(path = %path.display(), "wrote default configuration");
    Ok(())
}
