//! Configuration management for citenet
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values
//!
//! Tunables are collected here and handed to the fetch engine and graph
//! builder at construction; nothing reads them from process-wide state.

use crate::errors::{AppError, Result};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Citation database (record lookups for tree building)
    #[serde(default)]
    pub datasource: DataSourceConfig,

    /// Batch fetch against the XML parsing endpoint
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Citation tree expansion
    #[serde(default)]
    pub graph: GraphConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DataSourceConfig {
    /// Base URL of the citation database API
    #[serde(default = "default_datasource_base_url")]
    pub base_url: String,

    /// Path of the paper lookup endpoint, relative to `base_url`
    #[serde(default = "default_paper_path")]
    pub paper_path: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetchConfig {
    /// Full URL of the XML parsing paper endpoint
    #[serde(default = "default_fetch_endpoint")]
    pub endpoint: String,

    /// Prefix turning a raw DOI into the `id` query value
    #[serde(default = "default_doi_prefix")]
    pub doi_prefix: String,

    /// Extra polls allowed after a "still processing" reply
    #[serde(default)]
    pub poll_give_up_count: u32,

    /// Wait between "still processing" polls, in seconds
    #[serde(default)]
    pub poll_delay_secs: f64,

    /// Backoff per still-failing item before a retry round, in seconds
    #[serde(default = "default_per_item_delay")]
    pub per_item_delay_secs: f64,

    /// Retry rounds after the initial pass
    #[serde(default = "default_retry_rounds")]
    pub retry_rounds: u32,

    /// Items resolved concurrently inside one round (1 = sequential)
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GraphConfig {
    /// Inclusive bound on reference hops followed from the root
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Skip re-expanding a uri already expanded at the same or a shallower depth
    #[serde(default)]
    pub memoize: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level / filter directive (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logging: bool,
}

// Default value functions
fn default_datasource_base_url() -> String { "http://api.richcitations.org/v0/".to_string() }
fn default_paper_path() -> String { "paper".to_string() }
fn default_fetch_endpoint() -> String { "http://xmlapi.richcitations.org/v0/paper".to_string() }
fn default_doi_prefix() -> String { "http://dx.doi.org/".to_string() }
fn default_per_item_delay() -> f64 { 0.9 }
fn default_retry_rounds() -> u32 { 2 }
fn default_max_concurrency() -> usize { 1 }
fn default_timeout() -> u64 { 30 }
fn default_max_depth() -> u32 { 2 }
fn default_log_level() -> String { "info".to_string() }

impl Default for DataSourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_datasource_base_url(),
            paper_path: default_paper_path(),
            timeout_secs: default_timeout(),
        }
    }
}

impl DataSourceConfig {
    /// Full URL of the paper lookup endpoint
    pub fn paper_url(&self) -> String {
        format!("{}{}", self.base_url, self.paper_path)
    }

    /// Get request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_fetch_endpoint(),
            doi_prefix: default_doi_prefix(),
            poll_give_up_count: 0,
            poll_delay_secs: 0.0,
            per_item_delay_secs: default_per_item_delay(),
            retry_rounds: default_retry_rounds(),
            max_concurrency: default_max_concurrency(),
            timeout_secs: default_timeout(),
        }
    }
}

impl FetchConfig {
    /// Reject settings the engine cannot honour
    pub fn validate(&self) -> Result<()> {
        check_delay("fetch.poll_delay_secs", self.poll_delay_secs)?;
        check_delay("fetch.per_item_delay_secs", self.per_item_delay_secs)?;
        if self.max_concurrency == 0 {
            return Err(AppError::Validation {
                message: "max_concurrency must be at least 1".to_string(),
                field: Some("fetch.max_concurrency".to_string()),
            });
        }
        if self.endpoint.is_empty() {
            return Err(AppError::Validation {
                message: "endpoint must not be empty".to_string(),
                field: Some("fetch.endpoint".to_string()),
            });
        }
        Ok(())
    }

    /// Wait between "still processing" polls
    pub fn poll_delay(&self) -> Duration {
        Duration::from_secs_f64(self.poll_delay_secs)
    }

    /// Backoff charged per still-failing item
    pub fn per_item_delay(&self) -> Duration {
        Duration::from_secs_f64(self.per_item_delay_secs)
    }

    /// Get request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn check_delay(field: &str, secs: f64) -> Result<()> {
    if !secs.is_finite() || secs < 0.0 || Duration::try_from_secs_f64(secs).is_err() {
        return Err(AppError::Validation {
            message: format!("{} must be a non-negative number of seconds a Duration can hold (got {})", field, secs),
            field: Some(field.to_string()),
        });
    }
    Ok(())
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            memoize: false,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from `.env`, config files and environment
    pub fn load() -> std::result::Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__FETCH__RETRY_ROUNDS=3
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML/YAML/JSON file
    pub fn from_file(path: &str) -> std::result::Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        config.try_deserialize()
    }

    /// Validate every section that carries contract constraints
    pub fn validate(&self) -> Result<()> {
        self.fetch.validate()
    }
}
