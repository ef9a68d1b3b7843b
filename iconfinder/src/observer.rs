//! Observability hooks for discovery.
//!
//! The engine reports every page and icon fetch to a [`FetchObserver`]. The
//! default [`LoggingFetchObserver`] turns them into `tracing` events; hosts
//! can plug in their own metrics.

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::errors::IconfinderError;

/// Receives fetch lifecycle notifications.
pub trait FetchObserver: Send + Sync {
    /// Called when a fetch starts.
    fn on_fetch_start(&self, url: &str, request_id: &str);

    /// Called when a response arrives, whatever its status.
    fn on_fetch_complete(&self, url: &str, request_id: &str, duration_ms: f64, status_code: u16);

    /// Called when a fetch fails before or while reading the response.
    fn on_fetch_error(&self, url: &str, request_id: &str, duration_ms: f64, error: &str);

    /// Called when the cache could not serve or store an entry.
    fn on_cache_error(&self, key: &str, error: &str);

    /// Called when a discovery finishes.
    fn on_discovery_complete(
        &self,
        site_url: &str,
        request_id: &str,
        duration_ms: f64,
        icon_count: usize,
        failure_count: usize,
    );
}

/// No-op implementation of [`FetchObserver`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpFetchObserver;

impl FetchObserver for NoOpFetchObserver {
    fn on_fetch_start(&self, _url: &str, _request_id: &str) {}
    fn on_fetch_complete(&self, _url: &str, _request_id: &str, _duration_ms: f64, _status_code: u16) {}
    fn on_fetch_error(&self, _url: &str, _request_id: &str, _duration_ms: f64, _error: &str) {}
    fn on_cache_error(&self, _key: &str, _error: &str) {}
    fn on_discovery_complete(&self, _site_url: &str, _request_id: &str, _duration_ms: f64, _icon_count: usize, _failure_count: usize) {}
}

/// Observer that logs through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingFetchObserver;

impl FetchObserver for LoggingFetchObserver {
    fn on_fetch_start(&self, url: &str, request_id: &str) {
        debug!(url = %url, request_id = %request_id, "Fetching");
    }

    fn on_fetch_complete(&self, url: &str, request_id: &str, duration_ms: f64, status_code: u16) {
        debug!(
            url = %url,
            request_id = %request_id,
            duration_ms = duration_ms,
            status = status_code,
            "Fetched"
        );
    }

    fn on_fetch_error(&self, url: &str, request_id: &str, duration_ms: f64, error: &str) {
        debug!(
            url = %url,
            request_id = %request_id,
            duration_ms = duration_ms,
            error = %error,
            "Fetch failed"
        );
    }

    fn on_cache_error(&self, key: &str, error: &str) {
        warn!(key = %key, error = %error, "Icon cache error");
    }

    fn on_discovery_complete(
        &self,
        site_url: &str,
        request_id: &str,
        duration_ms: f64,
        icon_count: usize,
        failure_count: usize,
    ) {
        info!(
            site_url = %site_url,
            request_id = %request_id,
            duration_ms = duration_ms,
            icons = icon_count,
            failures = failure_count,
            "Discovery complete"
        );
    }
}

/// A notification recorded by [`CollectingFetchObserver`].
#[derive(Debug, Clone, PartialEq)]
pub enum ObservedEvent {
    /// A fetch started.
    Start {
        /// Requested URL.
        url: String,
    },
    /// A response arrived.
    Complete {
        /// Requested URL.
        url: String,
        /// HTTP status.
        status: u16,
    },
    /// A fetch failed.
    Error {
        /// Requested URL.
        url: String,
        /// Error message.
        error: String,
    },
    /// The cache misbehaved.
    CacheError {
        /// Cache key.
        key: String,
    },
    /// A discovery finished.
    Discovery {
        /// Site URL.
        site_url: String,
        /// Icons found.
        icons: usize,
        /// Failed candidates.
        failures: usize,
    },
}

/// Observer that records every notification in memory.
#[derive(Debug, Default)]
pub struct CollectingFetchObserver {
    events: Mutex<Vec<ObservedEvent>>,
}

impl CollectingFetchObserver {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<ObservedEvent> {
        self.events.lock().clone()
    }

    /// URLs for which a fetch was started.
    #[must_use]
    pub fn started_urls(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                ObservedEvent::Start { url } => Some(url.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: ObservedEvent) {
        self.events.lock().push(event);
    }
}

impl FetchObserver for CollectingFetchObserver {
    fn on_fetch_start(&self, url: &str, _request_id: &str) {
        self.record(ObservedEvent::Start { url: url.to_string() });
    }

    fn on_fetch_complete(&self, url: &str, _request_id: &str, _duration_ms: f64, status_code: u16) {
        self.record(ObservedEvent::Complete {
            url: url.to_string(),
            status: status_code,
        });
    }

    fn on_fetch_error(&self, url: &str, _request_id: &str, _duration_ms: f64, error: &str) {
        self.record(ObservedEvent::Error {
            url: url.to_string(),
            error: error.to_string(),
        });
    }

    fn on_cache_error(&self, key: &str, _error: &str) {
        self.record(ObservedEvent::CacheError { key: key.to_string() });
    }

    fn on_discovery_complete(
        &self,
        site_url: &str,
        _request_id: &str,
        _duration_ms: f64,
        icon_count: usize,
        failure_count: usize,
    ) {
        self.record(ObservedEvent::Discovery {
            site_url: site_url.to_string(),
            icons: icon_count,
            failures: failure_count,
        });
    }
}

/// Installs a global fmt subscriber filtered by `filter` (`RUST_LOG` syntax).
///
/// Fails if the filter is invalid or a subscriber is already installed.
pub fn init_tracing(filter: &str) -> Result<(), IconfinderError> {
    let filter = EnvFilter::try_new(filter).map_err(|e| IconfinderError::Config(e.to_string()))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| IconfinderError::Config(e.to_string()))
}

/// Like [`init_tracing`] but emits one JSON object per event.
pub fn init_json_tracing(filter: &str) -> Result<(), IconfinderError> {
    let filter = EnvFilter::try_new(filter).map_err(|e| IconfinderError::Config(e.to_string()))?;
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| IconfinderError::Config(e.to_string()))
}
