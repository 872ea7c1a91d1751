//! Configuration management for the CallScope dashboard

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Backend API configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Dashboard query configuration
    #[serde(default)]
    pub dashboard: DashboardConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the analytics API, without trailing slash
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key sent with every request
    #[serde(default)]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

/// Dashboard query configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// How long a fetched result is served without refetching, in seconds
    #[serde(default = "default_stale_time_secs")]
    pub stale_time_secs: u64,

    /// Transcripts shown per page
    #[serde(default = "default_transcripts_page_size")]
    pub transcripts_page_size: u32,

    /// Include the organization id in the dashboard metrics cache key.
    ///
    /// Off by default, which keeps the metrics key as
    /// `(dashboardMetrics, apiDateFilter)` so two organizations sharing a
    /// filter share one cache entry.
    #[serde(default)]
    pub scope_metrics_by_org: bool,

    /// Capacity of the analysis-complete event channel
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json or pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_base_url() -> String {
    "http://localhost:3000/api".to_string()
}

const fn default_request_timeout() -> u64 {
    30
}

const fn default_stale_time_secs() -> u64 {
    60 * 60
}

const fn default_transcripts_page_size() -> u32 {
    5
}

const fn default_event_capacity() -> usize {
    16
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            request_timeout: default_request_timeout(),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            stale_time_secs: default_stale_time_secs(),
            transcripts_page_size: default_transcripts_page_size(),
            scope_metrics_by_org: false,
            event_capacity: default_event_capacity(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl ApiConfig {
    /// Request timeout as a [`Duration`]
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

impl DashboardConfig {
    /// Staleness window as a [`Duration`]
    #[must_use]
    pub const fn stale_time(&self) -> Duration {
        Duration::from_secs(self.stale_time_secs)
    }
}

impl Config {
    /// Load configuration from an optional `callscope` file in the working
    /// directory and `CALLSCOPE__SECTION__KEY` environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded, parsed or validated.
    pub fn load() -> crate::Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("callscope").required(false));
        Self::build(builder)
    }

    /// Load configuration from an explicit file, still honouring environment
    /// overrides
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or the result is invalid.
    pub fn load_from(path: &Path) -> crate::Result<Self> {
        let builder = config::Config::builder().add_source(config::File::from(path));
        Self::build(builder)
    }

    fn build(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> crate::Result<Self> {
        let config: Self = builder
            .add_source(
                config::Environment::with_prefix("CALLSCOPE")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        tracing::debug!(
            base_url = %config.api.base_url,
            stale_time_secs = config.dashboard.stale_time_secs,
            "configuration loaded"
        );
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the first offending field.
    pub fn validate(&self) -> crate::Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(crate::Error::validation("api.base_url", "must not be empty"));
        }
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://")
        {
            return Err(crate::Error::validation(
                "api.base_url",
                "must start with http:// or https://",
            ));
        }
        if self.api.request_timeout == 0 {
            return Err(crate::Error::validation(
                "api.request_timeout",
                "must be at least 1 second",
            ));
        }
        if self.dashboard.transcripts_page_size == 0 {
            return Err(crate::Error::validation(
                "dashboard.transcripts_page_size",
                "must be at least 1",
            ));
        }
        if self.dashboard.event_capacity == 0 {
            return Err(crate::Error::validation(
                "dashboard.event_capacity",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}
