//! Configuration loading from TOML files
//!
//! Config file is selected via the --config command line argument
//! (default: config/dev.toml). Every section is optional and falls back
//! to built-in defaults, so the service runs with no config file at all.

use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Site identifier stamped on metrics (e.g., "lot-7-north")
    #[serde(default = "default_site_id")]
    pub id: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self { id: default_site_id() }
    }
}

fn default_site_id() -> String {
    "plate-relay".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    /// Enable the detection TCP listener
    #[serde(default = "default_ingest_enabled")]
    pub enabled: bool,
    /// Detection TCP listener port
    #[serde(default = "default_ingest_port")]
    pub port: u16,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self { enabled: default_ingest_enabled(), port: default_ingest_port() }
    }
}

fn default_ingest_enabled() -> bool {
    true
}

fn default_ingest_port() -> u16 {
    7070
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilterConfig {
    /// Suppression window per admitted code, in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Text lengths eligible for admission
    #[serde(default = "default_accepted_lengths")]
    pub accepted_lengths: Vec<usize>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self { window_secs: default_window_secs(), accepted_lengths: default_accepted_lengths() }
    }
}

fn default_window_secs() -> u64 {
    60
}

fn default_accepted_lengths() -> Vec<usize> {
    vec![3, 6]
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocationConfig {
    /// Label reported until an external actor sets one
    #[serde(default = "default_location_label")]
    pub default: String,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self { default: default_location_label() }
    }
}

fn default_location_label() -> String {
    "0".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectorsConfig {
    /// Collector endpoints; each accepted sighting is posted to all of them
    #[serde(default = "default_collector_urls")]
    pub urls: Vec<String>,
    /// Per-request timeout applied by the HTTP client
    #[serde(default = "default_collector_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for CollectorsConfig {
    fn default() -> Self {
        Self { urls: default_collector_urls(), timeout_ms: default_collector_timeout_ms() }
    }
}

fn default_collector_urls() -> Vec<String> {
    vec!["http://127.0.0.1:5000/transactions/new".to_string()]
}

fn default_collector_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Interval between metrics log reports, in seconds
    #[serde(default = "default_metrics_interval")]
    pub interval_secs: u64,
    /// Admin HTTP port for /metrics, /health, /location (0 to disable)
    #[serde(default = "default_admin_port")]
    pub admin_port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval(), admin_port: default_admin_port() }
    }
}

fn default_metrics_interval() -> u64 {
    10
}

fn default_admin_port() -> u16 {
    9090
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub location: LocationConfig,
    #[serde(default)]
    pub collectors: CollectorsConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    site_id: String,
    ingest_enabled: bool,
    ingest_port: u16,
    window_secs: u64,
    accepted_lengths: Vec<usize>,
    location_default: String,
    collector_urls: Vec<String>,
    collector_timeout_ms: u64,
    metrics_interval_secs: u64,
    admin_port: u16,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default")
    }
}

impl Config {
    fn from_toml(toml_config: TomlConfig, source: &str) -> Self {
        Self {
            site_id: toml_config.site.id,
            ingest_enabled: toml_config.ingest.enabled,
            ingest_port: toml_config.ingest.port,
            window_secs: toml_config.filter.window_secs,
            accepted_lengths: toml_config.filter.accepted_lengths,
            location_default: toml_config.location.default,
            collector_urls: toml_config.collectors.urls,
            collector_timeout_ms: toml_config.collectors.timeout_ms,
            metrics_interval_secs: toml_config.metrics.interval_secs,
            admin_port: toml_config.metrics.admin_port,
            config_file: source.to_string(),
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self::from_toml(toml_config, &path.display().to_string()))
    }

    /// Load configuration - tries the TOML file, falls back to defaults
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {:#}. Using defaults.", e);
                Self::default()
            }
        }
    }

    // Getters for all config fields
    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    pub fn ingest_enabled(&self) -> bool {
        self.ingest_enabled
    }

    pub fn ingest_port(&self) -> u16 {
        self.ingest_port
    }

    pub fn window_secs(&self) -> u64 {
        self.window_secs
    }

    pub fn accepted_lengths(&self) -> &[usize] {
        &self.accepted_lengths
    }

    pub fn location_default(&self) -> &str {
        &self.location_default
    }

    pub fn collector_urls(&self) -> &[String] {
        &self.collector_urls
    }

    pub fn collector_timeout_ms(&self) -> u64 {
        self.collector_timeout_ms
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn admin_port(&self) -> u16 {
        self.admin_port
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to set collector URLs
    #[cfg(test)]
    pub fn with_collector_urls(mut self, urls: Vec<String>) -> Self {
        self.collector_urls = urls;
        self
    }
}
