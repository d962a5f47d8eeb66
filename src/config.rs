use log::{debug, warn};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::client::{DEFAULT_JOB, WriteClient};
use crate::error::{ExporterError, Result};
use crate::source::MetricSource;

/// Source of configuration
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// File path; format chosen by extension (toml, json, yaml)
    File(PathBuf),
    /// Environment variables with a prefix, `__` separated
    Environment(String),
    /// TOML string
    Toml(String),
}

/// Logging level
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

/// Exporter configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ExporterConfig {
    /// Remote-write endpoint
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Instance label; the hostname when unset
    #[serde(default)]
    pub instance: Option<String>,
    #[serde(default = "default_job")]
    pub job: String,
    /// Push interval in seconds
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default)]
    pub log_level: LogLevel,
}

fn default_job() -> String {
    DEFAULT_JOB.to_string()
}

fn default_interval_secs() -> u64 {
    30
}

impl ExporterConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Load from a single file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        load_config(vec![ConfigSource::File(path.as_ref().to_path_buf())])
    }

    /// Build a client for `registry` from this configuration.
    ///
    /// Basic auth is only applied when a username is set.
    pub fn into_client<R: MetricSource>(self, registry: Arc<R>) -> Result<WriteClient<R>> {
        let mut builder = WriteClient::builder(self.url).job(self.job).registry(registry);
        if let Some(instance) = self.instance {
            builder = builder.instance(instance);
        }
        if let Some(username) = self.username.filter(|u| !u.is_empty()) {
            builder = builder.basic_auth(username, self.password.unwrap_or_default());
        }
        builder.build()
    }
}

/// Load configuration from sources in order; later sources override earlier ones
pub fn load_config(sources: Vec<ConfigSource>) -> Result<ExporterConfig> {
    let mut builder = config::Config::builder();

    for source in sources {
        match source {
            ConfigSource::File(path) => {
                if !path.exists() {
                    warn!("Configuration file not found: {}", path.display());
                    continue;
                }

                let format = file_format(&path)?;
                debug!("Loading configuration from file: {}", path.display());
                builder = builder.add_source(config::File::from(path).format(format));
            }
            ConfigSource::Environment(prefix) => {
                debug!("Loading configuration from environment with prefix: {}", prefix);
                builder = builder.add_source(
                    config::Environment::with_prefix(&prefix)
                        .prefix_separator("__")
                        .separator("__")
                        .try_parsing(true),
                );
            }
            ConfigSource::Toml(toml_str) => {
                debug!("Loading configuration from TOML string");
                builder = builder
                    .add_source(config::File::from_str(&toml_str, config::FileFormat::Toml));
            }
        }
    }

    let config = builder
        .build()
        .map_err(|e| ExporterError::Config(format!("Failed to build configuration: {}", e)))?;

    let result: ExporterConfig = config
        .try_deserialize()
        .map_err(|e| ExporterError::Config(format!("Failed to deserialize configuration: {}", e)))?;

    if result.interval_secs == 0 {
        return Err(ExporterError::Config(
            "interval_secs must be greater than zero".to_string(),
        ));
    }

    debug!("Configuration loaded for endpoint {}", result.url);
    Ok(result)
}

fn file_format(path: &Path) -> Result<config::FileFormat> {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .ok_or_else(|| {
            ExporterError::Config(format!(
                "Configuration file has no extension: {}",
                path.display()
            ))
        })?;

    match extension.as_str() {
        "toml" => Ok(config::FileFormat::Toml),
        "json" => Ok(config::FileFormat::Json),
        "yaml" | "yml" => Ok(config::FileFormat::Yaml),
        other => Err(ExporterError::Config(format!(
            "Unsupported config format: {}",
            other
        ))),
    }
}

/// Configuration builder
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    sources: Vec<ConfigSource>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.sources.push(ConfigSource::File(path.as_ref().to_path_buf()));
        self
    }

    pub fn add_env(mut self, prefix: impl Into<String>) -> Self {
        self.sources.push(ConfigSource::Environment(prefix.into()));
        self
    }

    pub fn add_toml(mut self, toml: impl Into<String>) -> Self {
        self.sources.push(ConfigSource::Toml(toml.into()));
        self
    }

    pub fn build(self) -> Result<ExporterConfig> {
        load_config(self.sources)
    }
}
