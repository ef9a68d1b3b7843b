//! Canned HTTP responses.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use url::Url;

use crate::errors::FetchError;
use crate::fetch::{FetchConfig, FetchResponse, Fetcher};

/// A response served by [`StaticFetcher`].
#[derive(Debug, Clone)]
pub struct StaticResponse {
    status: u16,
    content_type: Option<String>,
    body: Vec<u8>,
    final_url: Option<String>,
    delay: Option<Duration>,
}

impl StaticResponse {
    /// A 200 response with `body`.
    #[must_use]
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            content_type: None,
            body: body.into(),
            final_url: None,
            delay: None,
        }
    }

    /// A 200 `text/html` response.
    #[must_use]
    pub fn html(body: impl Into<Vec<u8>>) -> Self {
        Self::ok(body).with_content_type("text/html; charset=utf-8")
    }

    /// An empty response with `status`.
    #[must_use]
    pub fn status(status: u16) -> Self {
        Self {
            status,
            ..Self::ok(Vec::<u8>::new())
        }
    }

    /// Sets the `Content-Type` header.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Pretends the request was redirected to `url`.
    #[must_use]
    pub fn redirected_to(mut self, url: impl Into<String>) -> Self {
        self.final_url = Some(url.into());
        self
    }

    /// Delays the response.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// A [`Fetcher`] that serves canned responses by exact URL.
///
/// Unknown URLs fail with [`FetchError::Request`], like an unreachable host.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    responses: HashMap<String, StaticResponse>,
    config: FetchConfig,
    requests: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StaticFetcher {
    /// Creates a fetcher with no responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `response` for `url`.
    #[must_use]
    pub fn with(mut self, url: impl Into<String>, response: StaticResponse) -> Self {
        self.responses.insert(url.into(), response);
        self
    }

    /// URLs requested so far, in request order.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    /// Number of requests for `url`.
    #[must_use]
    pub fn request_count(&self, url: &str) -> usize {
        self.requests.lock().iter().filter(|u| *u == url).count()
    }

    /// Highest number of simultaneous requests seen.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchResponse, FetchError> {
        let url = url.as_str();
        self.requests.lock().push(url.to_string());

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let response = self
            .responses
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Request(format!("no route to {url}")))?;

        if let Some(delay) = response.delay {
            tokio::time::sleep(delay).await;
        }

        Ok(FetchResponse::from_bytes(
            response.status,
            response.final_url.unwrap_or_else(|| url.to_string()),
            response.content_type.as_deref(),
            response.body,
        ))
    }

    fn config(&self) -> &FetchConfig {
        &self.config
    }
}
