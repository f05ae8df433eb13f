//! Tap configuration
//!
//! Loaded from a Singer-style JSON file (`--config`) or from `QUALTRICS_*`
//! environment variables. Tunables default to the values the export API is
//! comfortable with; only the connection and survey fields are required.

use crate::error::{Result, TapError};
use qualtrics_common::timestamp;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Domain the datacenter subdomain is joined to
pub const PLATFORM_DOMAIN: &str = "qualtrics.com";

fn default_poll_interval() -> u64 {
    20
}

fn default_max_poll_attempts() -> u32 {
    180 // one hour at the default interval
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff() -> u64 {
    2
}

fn default_request_timeout() -> u64 {
    300
}

fn default_chunk_size() -> usize {
    10_000
}

/// Configuration for one survey's response export
#[derive(Clone, Serialize, Deserialize)]
pub struct TapConfig {
    /// API token sent as `x-api-token`
    pub api_token: String,

    /// Datacenter subdomain, e.g. "iad1"
    pub datacenter: String,

    /// Survey whose responses are exported
    pub survey_id: String,

    /// Display name written to every record's `SurveyName`
    pub survey: String,

    /// First-run export window start (YYYY-MM-DD)
    pub start_date: String,

    /// Overrides `https://{datacenter}.qualtrics.com`
    #[serde(default)]
    pub base_url: Option<String>,

    /// Seconds between export status checks
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Status checks before giving up on an export
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,

    /// Attempts per HTTP request, including the first
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base of the exponential retry backoff, in seconds
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_secs: u64,

    /// HTTP client timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Rows per normalization batch
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl std::fmt::Debug for TapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TapConfig")
            .field("api_token", &"<redacted>")
            .field("datacenter", &self.datacenter)
            .field("survey_id", &self.survey_id)
            .field("survey", &self.survey)
            .field("start_date", &self.start_date)
            .field("base_url", &self.base_url)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("max_poll_attempts", &self.max_poll_attempts)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_secs", &self.retry_backoff_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}

impl TapConfig {
    /// Create a builder seeded with the required fields
    pub fn builder(
        api_token: impl Into<String>,
        datacenter: impl Into<String>,
        survey_id: impl Into<String>,
        survey: impl Into<String>,
        start_date: impl Into<String>,
    ) -> TapConfigBuilder {
        TapConfigBuilder {
            config: TapConfig {
                api_token: api_token.into(),
                datacenter: datacenter.into(),
                survey_id: survey_id.into(),
                survey: survey.into(),
                start_date: start_date.into(),
                base_url: None,
                poll_interval_secs: default_poll_interval(),
                max_poll_attempts: default_max_poll_attempts(),
                max_retries: default_max_retries(),
                retry_backoff_secs: default_retry_backoff(),
                request_timeout_secs: default_request_timeout(),
                chunk_size: default_chunk_size(),
            },
        }
    }

    /// Load and validate a JSON config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            TapError::config(format!("cannot read config file '{}': {}", path.display(), e))
        })?;
        let config: TapConfig = serde_json::from_str(&raw).map_err(|e| {
            TapError::config(format!("invalid config file '{}': {}", path.display(), e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load and validate configuration from `QUALTRICS_*` environment variables
    pub fn from_env() -> Result<Self> {
        let required = |name: &str| {
            std::env::var(name).map_err(|_| TapError::config(format!("{} must be set", name)))
        };

        let mut builder = TapConfig::builder(
            required("QUALTRICS_API_TOKEN")?,
            required("QUALTRICS_DATACENTER")?,
            required("QUALTRICS_SURVEY_ID")?,
            required("QUALTRICS_SURVEY")?,
            required("QUALTRICS_START_DATE")?,
        );

        if let Ok(url) = std::env::var("QUALTRICS_BASE_URL") {
            builder = builder.base_url(url);
        }
        if let Some(secs) = env_parse("QUALTRICS_POLL_INTERVAL_SECS")? {
            builder = builder.poll_interval_secs(secs);
        }
        if let Some(attempts) = env_parse("QUALTRICS_MAX_POLL_ATTEMPTS")? {
            builder = builder.max_poll_attempts(attempts);
        }
        if let Some(retries) = env_parse("QUALTRICS_MAX_RETRIES")? {
            builder = builder.max_retries(retries);
        }
        if let Some(secs) = env_parse("QUALTRICS_RETRY_BACKOFF_SECS")? {
            builder = builder.retry_backoff_secs(secs);
        }
        if let Some(secs) = env_parse("QUALTRICS_REQUEST_TIMEOUT_SECS")? {
            builder = builder.request_timeout_secs(secs);
        }
        if let Some(rows) = env_parse("QUALTRICS_CHUNK_SIZE")? {
            builder = builder.chunk_size(rows);
        }

        let config = builder.build();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("api_token", &self.api_token),
            ("datacenter", &self.datacenter),
            ("survey_id", &self.survey_id),
            ("survey", &self.survey),
            ("start_date", &self.start_date),
        ] {
            if value.trim().is_empty() {
                return Err(TapError::config(format!("{} cannot be empty", name)));
            }
        }

        timestamp::parse_date(&self.start_date)?;

        if self.max_poll_attempts == 0 {
            return Err(TapError::config("max_poll_attempts must be greater than 0"));
        }
        if self.max_retries == 0 {
            return Err(TapError::config("max_retries must be greater than 0"));
        }
        if self.request_timeout_secs == 0 {
            return Err(TapError::config("request_timeout_secs must be greater than 0"));
        }
        if self.chunk_size == 0 {
            return Err(TapError::config("chunk_size must be greater than 0"));
        }

        Ok(())
    }

    /// Root URL every API path is joined to
    pub fn base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}.{}", self.datacenter, PLATFORM_DOMAIN),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| TapError::config(format!("{} has an invalid value '{}'", name, raw))),
        Err(_) => Ok(None),
    }
}

/// Builder for TapConfig
#[derive(Debug)]
pub struct TapConfigBuilder {
    config: TapConfig,
}

impl TapConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    pub fn poll_interval_secs(mut self, secs: u64) -> Self {
        self.config.poll_interval_secs = secs;
        self
    }

    pub fn max_poll_attempts(mut self, attempts: u32) -> Self {
        self.config.max_poll_attempts = attempts;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    pub fn retry_backoff_secs(mut self, secs: u64) -> Self {
        self.config.retry_backoff_secs = secs;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn chunk_size(mut self, rows: usize) -> Self {
        self.config.chunk_size = rows;
        self
    }

    pub fn build(self) -> TapConfig {
        self.config
    }
}
