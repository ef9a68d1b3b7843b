//! HTTP client abstraction.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use url::Url;

use super::config::FetchConfig;
use crate::errors::FetchError;

/// Response body delivered as a stream of chunks.
pub type BodyStream = BoxStream<'static, Result<Bytes, FetchError>>;

/// An HTTP response whose body has not been read yet.
pub struct FetchResponse {
    /// HTTP status code.
    pub status: u16,
    /// URL after redirects.
    pub final_url: String,
    /// `Content-Type` header, if present.
    pub content_type: Option<String>,
    /// The body.
    pub body: BodyStream,
}

impl FetchResponse {
    /// Builds a response around an in-memory body.
    #[must_use]
    pub fn from_bytes(
        status: u16,
        final_url: impl Into<String>,
        content_type: Option<&str>,
        body: impl Into<Bytes>,
    ) -> Self {
        let body: Bytes = body.into();
        let chunks: Vec<Result<Bytes, FetchError>> = if body.is_empty() {
            Vec::new()
        } else {
            vec![Ok(body)]
        };
        Self {
            status,
            final_url: final_url.into(),
            content_type: content_type.map(str::to_string),
            body: stream::iter(chunks).boxed(),
        }
    }

    /// Whether the status is 2xx.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl std::fmt::Debug for FetchResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchResponse")
            .field("status", &self.status)
            .field("final_url", &self.final_url)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// Reads a body, failing once it reaches `limit` bytes.
///
/// A body of exactly `limit` bytes is rejected, so a truncated body is never
/// mistaken for a complete one.
pub async fn read_body_limited(mut body: BodyStream, limit: usize) -> Result<Vec<u8>, FetchError> {
    let mut buf = Vec::new();
    while let Some(chunk) = body.next().await {
        buf.extend_from_slice(&chunk?);
        if buf.len() >= limit {
            return Err(FetchError::BodyTooLarge { limit });
        }
    }
    if buf.len() >= limit {
        return Err(FetchError::BodyTooLarge { limit });
    }
    Ok(buf)
}

/// Issues GET requests.
///
/// Implementations must be safe to share between concurrent fetch tasks.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Sends a GET request for `url`.
    async fn fetch(&self, url: &Url) -> Result<FetchResponse, FetchError>;

    /// Gets the configuration.
    fn config(&self) -> &FetchConfig;
}

#[cfg(feature = "http")]
pub use reqwest_impl::ReqwestFetcher;

#[cfg(feature = "http")]
mod reqwest_impl {
    use super::{async_trait, BodyStream, FetchConfig, FetchError, FetchResponse, Fetcher, StreamExt, Url};
    use crate::errors::IconfinderError;
    use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};

    /// [`Fetcher`] backed by a shared `reqwest` client.
    ///
    /// One client per engine: the connection pool and cookie jar are shared
    /// by every fetch.
    #[derive(Debug, Clone)]
    pub struct ReqwestFetcher {
        client: reqwest::Client,
        config: FetchConfig,
    }

    impl ReqwestFetcher {
        /// Builds a client from `config`.
        pub fn new(config: FetchConfig) -> Result<Self, IconfinderError> {
            let mut headers = HeaderMap::new();
            headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
            for (key, value) in &config.headers {
                let name = HeaderName::from_bytes(key.as_bytes())
                    .map_err(|e| IconfinderError::Config(format!("header {key}: {e}")))?;
                let value = HeaderValue::from_str(value)
                    .map_err(|e| IconfinderError::Config(format!("header {key}: {e}")))?;
                headers.insert(name, value);
            }

            let client = reqwest::Client::builder()
                .cookie_store(true)
                .timeout(config.timeout()?)
                .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
                .user_agent(config.user_agent.clone())
                .default_headers(headers)
                .build()
                .map_err(|e| IconfinderError::Config(e.to_string()))?;

            Ok(Self { client, config })
        }

        /// Wraps an existing client.
        #[must_use]
        pub const fn with_client(client: reqwest::Client, config: FetchConfig) -> Self {
            Self { client, config }
        }
    }

    #[async_trait]
    impl Fetcher for ReqwestFetcher {
        async fn fetch(&self, url: &Url) -> Result<FetchResponse, FetchError> {
            let response = self
                .client
                .get(url.clone())
                .send()
                .await
                .map_err(|e| FetchError::Request(e.to_string()))?;

            let status = response.status().as_u16();
            let final_url = response.url().to_string();
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body: BodyStream = response
                .bytes_stream()
                .map(|chunk| chunk.map_err(|e| FetchError::Body(e.to_string())))
                .boxed();

            Ok(FetchResponse {
                status,
                final_url,
                content_type,
                body,
            })
        }

        fn config(&self) -> &FetchConfig {
            &self.config
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn chunked(chunks: &[&'static [u8]]) -> BodyStream {
        stream::iter(chunks.iter().map(|c| Ok(Bytes::from_static(c))).collect::<Vec<_>>()).boxed()
    }

    #[tokio::test]
    async fn test_read_body_under_limit() {
        let body = read_body_limited(chunked(&[b"abc", b"def"]), 7).await.unwrap();
        assert_eq!(body, b"abcdef");
    }

    #[tokio::test]
    async fn test_read_body_at_limit_is_rejected() {
        let err = read_body_limited(chunked(&[b"abc", b"def"]), 6).await.unwrap_err();
        assert!(matches!(err, FetchError::BodyTooLarge { limit: 6 }));
    }

    #[tokio::test]
    async fn test_read_body_stops_early() {
        let body: BodyStream = stream::iter(vec![
            Ok(Bytes::from_static(b"0123456789")),
            Err(FetchError::Body("never reached".into())),
        ])
        .boxed();
        let err = read_body_limited(body, 4).await.unwrap_err();
        assert!(matches!(err, FetchError::BodyTooLarge { limit: 4 }));
    }

    #[tokio::test]
    async fn test_read_body_propagates_stream_error() {
        let body: BodyStream = stream::iter(vec![
            Ok(Bytes::from_static(b"ab")),
            Err(FetchError::Body("connection reset".into())),
        ])
        .boxed();
        let err = read_body_limited(body, 100).await.unwrap_err();
        assert!(matches!(err, FetchError::Body(_)));
    }

    #[tokio::test]
    async fn test_from_bytes() {
        let response = FetchResponse::from_bytes(200, "http://a.com/", Some("text/html"), "<html>");
        assert!(response.is_success());
        assert_eq!(response.content_type.as_deref(), Some("text/html"));
        assert_eq!(read_body_limited(response.body, 1024).await.unwrap(), b"<html>");

        let empty = FetchResponse::from_bytes(204, "http://a.com/", None, Vec::new());
        assert!(read_body_limited(empty.body, 1024).await.unwrap().is_empty());
        assert!(!FetchResponse::from_bytes(404, "u", None, "x").is_success());
    }
}
