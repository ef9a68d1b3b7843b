//! Configuration types for fetching and discovery.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::errors::IconfinderError;
use crate::models::IconFormat;
use crate::select::DEFAULT_FORMATS;
use crate::size_range::DEFAULT_MAX_ICON_SIZE;

/// Configuration for HTTP fetching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: f64,
    /// Maximum number of redirects to follow.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// User agent string.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Bodies reaching this many bytes are rejected.
    #[serde(default = "default_max_size")]
    pub max_response_size: usize,
    /// Additional headers to include.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

fn default_timeout() -> f64 {
    5.0
}

fn default_max_redirects() -> usize {
    10
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (iPhone; CPU iPhone OS 10_0 like Mac OS X) AppleWebKit/602.1.38 \
     (KHTML, like Gecko) Version/10.0 Mobile/14A5297c Safari/602.1"
        .to_string()
}

fn default_max_size() -> usize {
    10 * 1024 * 1024 // 10MB
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            max_redirects: default_max_redirects(),
            user_agent: default_user_agent(),
            max_response_size: default_max_size(),
            headers: HashMap::new(),
        }
    }
}

impl FetchConfig {
    /// Creates a new fetch configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the timeout.
    #[must_use]
    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Sets the redirect cap.
    #[must_use]
    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    /// Sets the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the body size cap.
    #[must_use]
    pub fn with_max_response_size(mut self, bytes: usize) -> Self {
        self.max_response_size = bytes;
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Gets timeout as Duration.
    ///
    /// Negative, NaN or unrepresentably large values are rejected.
    pub fn timeout(&self) -> Result<Duration, IconfinderError> {
        Duration::try_from_secs_f64(self.timeout_seconds).map_err(|e| {
            IconfinderError::Config(format!("timeout_seconds {}: {e}", self.timeout_seconds))
        })
    }
}

/// Engine-level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinderConfig {
    /// Formats returned by an [`IconFinder`](crate::finder::IconFinder).
    #[serde(default = "default_formats")]
    pub default_formats: Vec<IconFormat>,
    /// Drop raw bodies after sizing.
    #[serde(default)]
    pub discard_image_bytes: bool,
    /// Cap on simultaneous icon fetches; `None` launches all at once.
    #[serde(default)]
    pub max_concurrency: Option<usize>,
    /// Upper bound for size ranges.
    #[serde(default = "default_max_icon_size")]
    pub max_icon_size: u32,
    /// HTTP client settings.
    #[serde(default)]
    pub fetch: FetchConfig,
}

fn default_formats() -> Vec<IconFormat> {
    DEFAULT_FORMATS.to_vec()
}

fn default_max_icon_size() -> u32 {
    DEFAULT_MAX_ICON_SIZE
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            default_formats: default_formats(),
            discard_image_bytes: false,
            max_concurrency: None,
            max_icon_size: default_max_icon_size(),
            fetch: FetchConfig::default(),
        }
    }
}

impl FinderConfig {
    /// Loads a configuration from JSON, filling in defaults.
    pub fn from_json(json: &str) -> Result<Self, IconfinderError> {
        Ok(serde_json::from_str(json)?)
    }
}
