//! Application configuration
//!
//! Loaded from a TOML file merged with `HLS_BRIDGE_`-prefixed environment
//! variables. `web.base_url` is the only mandatory field; it is the public
//! base every self-referential proxy URL is built from.

use std::time::Duration;

use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::{Deserialize, Serialize};

pub mod duration_serde;

use duration_serde::duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub web: WebConfig,
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public base URL of this deployment; proxy-routed URIs point here.
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the identity/link-resolution API.
    pub api_base: String,
    pub app_key: String,
    pub auth_token: String,
    /// Credential pairs in `user:pass` form.
    #[serde(default)]
    pub profiles: Vec<String>,
    #[serde(with = "duration", default = "default_connect_timeout")]
    pub connect_timeout: Duration,
    #[serde(with = "duration", default = "default_request_timeout")]
    pub request_timeout: Duration,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum manifest entry age before a refetch; zero disables effective
    /// caching while keeping the write path.
    #[serde(with = "duration", default = "default_manifest_ttl")]
    pub manifest_ttl: Duration,
    #[serde(default = "default_manifest_capacity")]
    pub manifest_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Cron expression for the credential pool refresh.
    #[serde(default = "default_pool_refresh_cron")]
    pub pool_refresh_cron: String,
    /// Cron expression for the link validation sweep.
    #[serde(default = "default_link_sweep_cron")]
    pub link_sweep_cron: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    #[serde(default)]
    pub tmdb_api_key: String,
    #[serde(default = "default_metadata_language")]
    pub language: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_user_agent() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

fn default_manifest_ttl() -> Duration {
    Duration::from_secs(120)
}

fn default_manifest_capacity() -> usize {
    512
}

fn default_pool_refresh_cron() -> String {
    // Every 4 hours.
    "0 0 */4 * * *".to_string()
}

fn default_link_sweep_cron() -> String {
    // Daily at 04:30 UTC.
    "0 30 4 * * *".to_string()
}

fn default_metadata_language() -> String {
    "es-ES".to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            manifest_ttl: default_manifest_ttl(),
            manifest_capacity: default_manifest_capacity(),
        }
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            pool_refresh_cron: default_pool_refresh_cron(),
            link_sweep_cron: default_link_sweep_cron(),
        }
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            tmdb_api_key: String::new(),
            language: default_metadata_language(),
        }
    }
}

impl Config {
    /// Load from a TOML file, with `HLS_BRIDGE_*` environment variables
    /// taking precedence (`HLS_BRIDGE_WEB__PORT=9090`).
    pub fn load_from_file(path: &str) -> Result<Self> {
        let config: Config = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("HLS_BRIDGE_").split("__"))
            .extract()
            .with_context(|| format!("failed to load configuration from {path}"))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.web.base_url.starts_with("http://") || self.web.base_url.starts_with("https://"),
            "web.base_url must be an absolute http(s) URL, got '{}'",
            self.web.base_url
        );
        anyhow::ensure!(
            !self.upstream.api_base.is_empty(),
            "upstream.api_base must be set"
        );
        Ok(())
    }

    /// Base URL with any trailing slash removed.
    pub fn proxy_base(&self) -> String {
        self.web.base_url.trim_end_matches('/').to_string()
    }
}
