use anyhow::{bail, Context, Result};
use reqwest::Url;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_projects_path")]
    pub projects_path: String,
    #[serde(default = "default_manifest_path")]
    pub manifest_path: String,
    #[serde(default = "default_ingest_path")]
    pub ingest_path: String,
    #[serde(default = "default_logs_path")]
    pub logs_path: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            projects_path: default_projects_path(),
            manifest_path: default_manifest_path(),
            ingest_path: default_ingest_path(),
            logs_path: default_logs_path(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_projects_path() -> String {
    "/api/projects".to_string()
}
fn default_manifest_path() -> String {
    "/projects.json".to_string()
}
fn default_ingest_path() -> String {
    "/api/ingest".to_string()
}
fn default_logs_path() -> String {
    "/ws/logs".to_string()
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Parsed `base_url`.
    pub fn base(&self) -> Result<Url> {
        Url::parse(&self.base_url)
            .with_context(|| format!("backend.base_url is not a valid URL: {}", self.base_url))
    }

    /// Channel endpoint prefix: `base_url` joined with `logs_path`, with
    /// `http` mapped to `ws` (`https` to `wss`).
    pub fn logs_url(&self) -> Result<String> {
        let mut url = self
            .base()?
            .join(&self.logs_path)
            .with_context(|| format!("Invalid backend.logs_path: {}", self.logs_path))?;
        let scheme = match url.scheme() {
            "https" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme)
            .map_err(|_| anyhow::anyhow!("cannot derive a {} URL from {}", scheme, self.base_url))?;
        Ok(url.to_string())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_close_grace_ms")]
    pub close_grace_ms: u64,
    #[serde(default)]
    pub language: Option<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            close_grace_ms: default_close_grace_ms(),
            language: None,
        }
    }
}

fn default_close_grace_ms() -> u64 {
    1000
}

impl IngestConfig {
    pub fn close_grace(&self) -> Duration {
        Duration::from_millis(self.close_grace_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExportConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_subtitle")]
    pub subtitle: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            subtitle: default_subtitle(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./exports")
}
fn default_subtitle() -> String {
    "AI generated".to_string()
}

/// Default config location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "./config/docview.toml";

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Like [`load_config`], but a missing file at the default location
/// yields the built-in defaults.
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if path == Path::new(DEFAULT_CONFIG_PATH) && !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(Config::default());
    }
    load_config(path)
}

pub fn validate(config: &Config) -> Result<()> {
    let backend = &config.backend;

    let base = backend.base()?;
    if !matches!(base.scheme(), "http" | "https") {
        bail!(
            "backend.base_url must use http or https, got '{}'",
            base.scheme()
        );
    }
    if base.host_str().is_none() {
        bail!("backend.base_url has no host");
    }

    if backend.timeout_secs == 0 {
        bail!("backend.timeout_secs must be > 0");
    }

    for (key, value) in [
        ("projects_path", &backend.projects_path),
        ("manifest_path", &backend.manifest_path),
        ("ingest_path", &backend.ingest_path),
        ("logs_path", &backend.logs_path),
    ] {
        if !value.starts_with('/') {
            bail!("backend.{} must start with '/', got '{}'", key, value);
        }
    }

    if config.ingest.close_grace_ms > 60_000 {
        bail!("ingest.close_grace_ms must be <= 60000");
    }

    Ok(())
}
