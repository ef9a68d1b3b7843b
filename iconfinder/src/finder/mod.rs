//! Discovery orchestration.
//!
//! [`Besticon`] is the long-lived engine: it owns the HTTP client, the
//! optional cache and the decode registry. [`IconFinder`] is a cheap,
//! per-lookup view on top of it that remembers the last result and answers
//! selection queries against it.


use chrono::Local;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, Instrument};
use url::Url;
use uuid::Uuid;

use crate::cache::{cache_key, CachedResult, IconCache};
use crate::cancellation::CancellationToken;
use crate::charset::to_utf8;
use crate::decode::FormatRegistry;
use crate::errors::IconfinderError;
use crate::extract::{default_icon_urls, find_icon_links};
use crate::fetch::{fetch_all_icons, fetch_body, FetchConfig, FetchContext, Fetcher, FinderConfig};
use crate::models::{Discovery, FailedCandidate, Icon, IconFormat};
use crate::observer::{FetchObserver, LoggingFetchObserver};
use crate::select::{best_icon, discard_unwanted_formats, icon_in_size_range, reject_broken_icons, sort_icons};
use crate::size_range::SizeRange;

/// The discovery engine.
///
/// Construct once and share; cloning is cheap and clones share the client,
/// cache and registry.
#[derive(Clone)]
pub struct Besticon {
    fetcher: Arc<dyn Fetcher>,
    cache: Option<Arc<dyn IconCache>>,
    observer: Arc<dyn FetchObserver>,
    registry: Arc<FormatRegistry>,
    default_formats: Vec<IconFormat>,
    discard_image_bytes: bool,
    max_response_body_size: usize,
    max_concurrency: Option<usize>,
    max_icon_size: u32,
}

impl std::fmt::Debug for Besticon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Besticon")
            .field("cache_enabled", &self.cache_enabled())
            .field("registry", &self.registry.formats().collect::<Vec<_>>())
            .field("default_formats", &self.default_formats)
            .field("discard_image_bytes", &self.discard_image_bytes)
            .field("max_response_body_size", &self.max_response_body_size)
            .field("max_concurrency", &self.max_concurrency)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Besticon`].
#[derive(Default)]
pub struct BesticonBuilder {
    fetcher: Option<Arc<dyn Fetcher>>,
    cache: Option<Arc<dyn IconCache>>,
    observer: Option<Arc<dyn FetchObserver>>,
    registry: Option<FormatRegistry>,
    config: FinderConfig,
    max_response_body_size: Option<usize>,
}

impl BesticonBuilder {
    /// Creates a builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies engine settings. Later builder calls override them.
    #[must_use]
    pub fn config(mut self, config: FinderConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses `fetcher` instead of the default HTTP client.
    #[must_use]
    pub fn fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Enables result caching.
    #[must_use]
    pub fn cache(mut self, cache: Arc<dyn IconCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Sets the lifecycle observer.
    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn FetchObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Replaces the image format registry.
    #[must_use]
    pub fn registry(mut self, registry: FormatRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Formats returned when a finder does not restrict them.
    #[must_use]
    pub fn default_formats(mut self, formats: impl Into<Vec<IconFormat>>) -> Self {
        self.config.default_formats = formats.into();
        self
    }

    /// Drops raw bodies after sizing.
    #[must_use]
    pub const fn discard_image_bytes(mut self, discard: bool) -> Self {
        self.config.discard_image_bytes = discard;
        self
    }

    /// Rejects bodies reaching `bytes`.
    #[must_use]
    pub const fn max_response_body_size(mut self, bytes: usize) -> Self {
        self.max_response_body_size = Some(bytes);
        self
    }

    /// Caps simultaneous icon fetches per discovery.
    #[must_use]
    pub const fn max_concurrency(mut self, max: usize) -> Self {
        self.config.max_concurrency = Some(max);
        self
    }

    /// Builds the engine.
    ///
    /// Without an explicit fetcher a `reqwest` client is built from the
    /// configured [`FetchConfig`].
    pub fn build(self) -> Result<Besticon, IconfinderError> {
        let FinderConfig {
            default_formats,
            discard_image_bytes,
            max_concurrency,
            max_icon_size,
            fetch,
        } = self.config;

        if max_concurrency == Some(0) {
            return Err(IconfinderError::Config("max_concurrency must be at least 1".into()));
        }

        let max_response_body_size = self.max_response_body_size.unwrap_or(fetch.max_response_size);
        let fetcher = match self.fetcher {
            Some(fetcher) => fetcher,
            None => default_fetcher(fetch)?,
        };
        let default_formats = if default_formats.is_empty() {
            crate::select::DEFAULT_FORMATS.to_vec()
        } else {
            default_formats
        };

        Ok(Besticon {
            fetcher,
            cache: self.cache,
            observer: self.observer.unwrap_or_else(|| Arc::new(LoggingFetchObserver)),
            registry: Arc::new(self.registry.unwrap_or_default()),
            default_formats,
            discard_image_bytes,
            max_response_body_size,
            max_concurrency,
            max_icon_size,
        })
    }
}

#[cfg(feature = "http")]
fn default_fetcher(config: FetchConfig) -> Result<Arc<dyn Fetcher>, IconfinderError> {
    Ok(Arc::new(crate::fetch::ReqwestFetcher::new(config)?))
}

#[cfg(not(feature = "http"))]
fn default_fetcher(_config: FetchConfig) -> Result<Arc<dyn Fetcher>, IconfinderError> {
    Err(IconfinderError::Config(
        "no fetcher configured and the `http` feature is disabled".into(),
    ))
}

impl Besticon {
    /// Creates an engine with default settings.
    pub fn new() -> Result<Self, IconfinderError> {
        BesticonBuilder::new().build()
    }

    /// Returns a builder.
    #[must_use]
    pub fn builder() -> BesticonBuilder {
        BesticonBuilder::new()
    }

    /// Starts a new lookup.
    #[must_use]
    pub fn new_icon_finder(&self) -> IconFinder<'_> {
        IconFinder::new(self)
    }

    /// Whether results are cached.
    #[must_use]
    pub fn cache_enabled(&self) -> bool {
        self.cache.is_some()
    }

    /// The image format registry.
    #[must_use]
    pub fn registry(&self) -> &FormatRegistry {
        &self.registry
    }

    /// Formats returned when a finder does not restrict them.
    #[must_use]
    pub fn default_formats(&self) -> &[IconFormat] {
        &self.default_formats
    }

    /// Parses a size range against this engine's size limit.
    pub fn parse_size_range(&self, s: &str) -> Result<SizeRange, IconfinderError> {
        SizeRange::parse(s, self.max_icon_size)
    }

    /// Discovers all icons of `site_url`, best first.
    ///
    /// The page is fetched and its icon links are combined with the
    /// well-known paths. If the page cannot be fetched, answers with a
    /// non-2xx status or is empty, only the well-known paths are tried.
    pub async fn fetch_icons(&self, site_url: &str) -> Result<Discovery, IconfinderError> {
        self.discover(site_url, None).await
    }

    /// Like [`fetch_icons`](Self::fetch_icons), but stops pending icon
    /// fetches once `token` is cancelled.
    pub async fn fetch_icons_with_cancellation(
        &self,
        site_url: &str,
        token: Arc<CancellationToken>,
    ) -> Result<Discovery, IconfinderError> {
        self.discover(site_url, Some(token)).await
    }

    fn fetch_context(&self, request_id: String) -> FetchContext {
        FetchContext {
            fetcher: Arc::clone(&self.fetcher),
            registry: Arc::clone(&self.registry),
            observer: Arc::clone(&self.observer),
            max_body_size: self.max_response_body_size,
            keep_image_data: !self.discard_image_bytes,
            max_concurrency: self.max_concurrency,
            request_id,
        }
    }

    async fn discover(
        &self,
        site_url: &str,
        token: Option<Arc<CancellationToken>>,
    ) -> Result<Discovery, IconfinderError> {
        let request_id = Uuid::new_v4().to_string();
        let span = tracing::info_span!("discover", site_url = %site_url, request_id = %request_id);

        async move {
            let start = Instant::now();
            let ctx = Arc::new(self.fetch_context(request_id.clone()));
            let links = self.candidate_links(&ctx, site_url).await?;

            let outcomes = fetch_all_icons(&ctx, &links, token).await;
            let mut discovery = Discovery::from_outcomes(outcomes);
            discovery.icons = reject_broken_icons(std::mem::take(&mut discovery.icons));
            sort_icons(&mut discovery.icons, true);

            self.observer.on_discovery_complete(
                site_url,
                &request_id,
                start.elapsed().as_secs_f64() * 1000.0,
                discovery.icons.len(),
                discovery.failures.len(),
            );
            Ok(discovery)
        }
        .instrument(span)
        .await
    }

    async fn candidate_links(
        &self,
        ctx: &FetchContext,
        site_url: &str,
    ) -> Result<Vec<String>, IconfinderError> {
        match fetch_body(ctx, site_url).await {
            Ok(page) => {
                let base = Url::parse(&page.final_url)
                    .or_else(|_| Url::parse(site_url))
                    .map_err(|e| IconfinderError::invalid_url(format!("{site_url}: {e}")))?;
                let html = to_utf8(&page.body, page.content_type.as_deref());
                find_icon_links(&base, &html)
            }
            Err(e) => {
                debug!(error = %e, "Page unavailable, trying well-known icon paths");
                default_icon_urls(site_url)
            }
        }
    }
}

/// One lookup against a [`Besticon`] engine.
pub struct IconFinder<'a> {
    engine: &'a Besticon,
    formats_allowed: Vec<IconFormat>,
    host_only_domains: Vec<String>,
    icons: Vec<Icon>,
    failures: Vec<FailedCandidate>,
}

impl std::fmt::Debug for IconFinder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IconFinder")
            .field("formats_allowed", &self.formats_allowed)
            .field("host_only_domains", &self.host_only_domains)
            .field("icons", &self.icons.len())
            .field("failures", &self.failures.len())
            .finish_non_exhaustive()
    }
}

impl<'a> IconFinder<'a> {
    /// Creates a finder with the engine's default formats.
    #[must_use]
    pub const fn new(engine: &'a Besticon) -> Self {
        Self {
            engine,
            formats_allowed: Vec::new(),
            host_only_domains: Vec::new(),
            icons: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Restricts results to `formats`; an empty list means the engine default.
    #[must_use]
    pub fn with_formats(mut self, formats: impl Into<Vec<IconFormat>>) -> Self {
        self.formats_allowed = formats.into();
        self
    }

    /// Hosts whose URLs are reduced to scheme and host before lookup.
    ///
    /// `"*"` matches every host.
    #[must_use]
    pub fn with_host_only_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.host_only_domains = domains.into_iter().map(Into::into).collect();
        self
    }

    /// Discovers the icons of `url` and returns those in allowed formats.
    ///
    /// `url` is trimmed and gets an `http://` prefix if it has no scheme.
    pub async fn fetch_icons(&mut self, url: &str) -> Result<Vec<Icon>, IconfinderError> {
        self.run(url, None).await
    }

    /// Like [`fetch_icons`](Self::fetch_icons) with cooperative cancellation.
    ///
    /// Cancelled results are never cached.
    pub async fn fetch_icons_with_cancellation(
        &mut self,
        url: &str,
        token: Arc<CancellationToken>,
    ) -> Result<Vec<Icon>, IconfinderError> {
        self.run(url, Some(token)).await
    }

    /// Discovers the icons of `url` and returns the largest.
    pub async fn fetch_best_icon(&mut self, url: &str) -> Result<Icon, IconfinderError> {
        self.fetch_icons(url).await?;
        self.best_icon().ok_or(IconfinderError::NoIconsFound)
    }

    /// Icons of the last lookup in allowed formats, best first.
    #[must_use]
    pub fn icons(&self) -> Vec<Icon> {
        discard_unwanted_formats(&self.icons, self.formats())
    }

    /// Candidates of the last lookup that failed.
    ///
    /// Empty when the result came from the cache.
    #[must_use]
    pub fn failures(&self) -> &[FailedCandidate] {
        &self.failures
    }

    /// The allowed icon that best fits `range`.
    #[must_use]
    pub fn icon_in_size_range(&self, range: SizeRange) -> Option<Icon> {
        icon_in_size_range(&self.icons(), range)
    }

    /// The largest allowed icon.
    #[must_use]
    pub fn best_icon(&self) -> Option<Icon> {
        best_icon(&self.icons()).cloned()
    }

    /// Reduces `url` to `scheme://host[:port]` if its host is listed as
    /// host-only. Unparsable URLs are returned unchanged.
    #[must_use]
    pub fn strip_if_necessary(&self, url: &str) -> String {
        let Ok(parsed) = Url::parse(url) else {
            return url.to_string();
        };
        let Some(host) = parsed.host_str() else {
            return url.to_string();
        };
        let authority = match parsed.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        if self
            .host_only_domains
            .iter()
            .any(|domain| domain == "*" || *domain == authority)
        {
            format!("{}://{authority}", parsed.scheme())
        } else {
            url.to_string()
        }
    }

    fn formats(&self) -> &[IconFormat] {
        if self.formats_allowed.is_empty() {
            &self.engine.default_formats
        } else {
            &self.formats_allowed
        }
    }

    fn normalize(&self, url: &str) -> String {
        let url = url.trim();
        let url = if url.starts_with("http:") || url.starts_with("https:") {
            url.to_string()
        } else {
            format!("http://{url}")
        };
        self.strip_if_necessary(&url)
    }

    async fn run(
        &mut self,
        url: &str,
        token: Option<Arc<CancellationToken>>,
    ) -> Result<Vec<Icon>, IconfinderError> {
        let url = self.normalize(url);
        self.icons.clear();
        self.failures.clear();

        let engine = self.engine;
        let result = match &engine.cache {
            Some(cache) => self.run_cached(cache.as_ref(), &url, token).await,
            None => engine.discover(&url, token).await.map(|discovery| self.absorb(discovery)),
        };
        result.map(|()| self.icons())
    }

    fn absorb(&mut self, discovery: Discovery) {
        self.icons = discovery.icons;
        self.failures = discovery.failures;
    }

    async fn run_cached(
        &mut self,
        cache: &dyn IconCache,
        url: &str,
        token: Option<Arc<CancellationToken>>,
    ) -> Result<(), IconfinderError> {
        let engine = self.engine;
        let key = cache_key(Local::now().date_naive(), url);

        match cache.get(&key).and_then(|hit| hit.map(|b| CachedResult::decode(&b)).transpose()) {
            Ok(Some(cached)) => {
                debug!(key = %key, "Icon cache hit");
                self.icons = cached.into_result()?;
                return Ok(());
            }
            Ok(None) => {}
            Err(e) => engine.observer.on_cache_error(&key, &e.to_string()),
        }

        let cancelled = token.clone();
        let discovery = engine.discover(url, token).await?;
        if !cancelled.is_some_and(|t| t.is_cancelled()) {
            let stored = CachedResult::from_icons(discovery.icons.clone())
                .encode()
                .and_then(|bytes| cache.put(&key, bytes));
            if let Err(e) = stored {
                engine.observer.on_cache_error(&key, &e.to_string());
            }
        }
        self.absorb(discovery);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StaticFetcher, StaticResponse};
    use pretty_assertions::assert_eq;

    fn engine() -> Besticon {
        Besticon::builder()
            .fetcher(Arc::new(StaticFetcher::new()))
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_defaults() {
        let engine = engine();
        assert_eq!(engine.default_formats(), &[IconFormat::Gif, IconFormat::Ico, IconFormat::Jpg, IconFormat::Png]);
        assert!(!engine.cache_enabled());
        assert_eq!(engine.max_response_body_size, 10 * 1024 * 1024);
        assert_eq!(engine.max_concurrency, None);
        assert!(!engine.discard_image_bytes);
    }

    #[test]
    fn test_builder_rejects_zero_concurrency() {
        let result = Besticon::builder()
            .fetcher(Arc::new(StaticFetcher::new()))
            .max_concurrency(0)
            .build();
        assert!(matches!(result, Err(IconfinderError::Config(_))));
    }

    #[cfg(feature = "http")]
    #[test]
    fn test_builder_rejects_out_of_range_timeout() {
        let config = FinderConfig::from_json(r#"{"fetch": {"timeout_seconds": 1e20}}"#).unwrap();
        let result = Besticon::builder().config(config).build();
        assert!(matches!(result, Err(IconfinderError::Config(_))));
    }

    #[test]
    fn test_debug_lists_registered_formats() {
        let rendered = format!("{:?}", engine());
        assert!(rendered.contains("registry: [Png"), "{rendered}");
        assert!(rendered.contains("Ico"), "{rendered}");
    }

    #[test]
    fn test_builder_from_config() {
        let config = FinderConfig {
            default_formats: vec![IconFormat::Png],
            discard_image_bytes: true,
            max_concurrency: Some(3),
            max_icon_size: 256,
            fetch: FetchConfig::default().with_max_response_size(1024),
        };
        let engine = Besticon::builder()
            .config(config)
            .fetcher(Arc::new(StaticFetcher::new()))
            .build()
            .unwrap();
        assert_eq!(engine.default_formats(), &[IconFormat::Png]);
        assert_eq!(engine.max_response_body_size, 1024);
        assert_eq!(engine.max_concurrency, Some(3));
        assert!(engine.parse_size_range("300").is_err());
        assert!(engine.parse_size_range("256").is_ok());
    }

    #[test]
    fn test_strip_if_necessary() {
        let engine = engine();
        let finder = engine
            .new_icon_finder()
            .with_host_only_domains(["youtube.com", "example.com:8080"]);

        assert_eq!(finder.strip_if_necessary("https://youtube.com/watch?v=abc"), "https://youtube.com");
        assert_eq!(finder.strip_if_necessary("http://example.com:8080/a/b"), "http://example.com:8080");
        assert_eq!(finder.strip_if_necessary("http://www.youtube.com/watch"), "http://www.youtube.com/watch");
        assert_eq!(finder.strip_if_necessary("::not a url::"), "::not a url::");

        let wildcard = engine.new_icon_finder().with_host_only_domains(["*"]);
        assert_eq!(wildcard.strip_if_necessary("http://any.org/page"), "http://any.org");
    }

    #[test]
    fn test_normalize() {
        let engine = engine();
        let finder = engine.new_icon_finder();
        assert_eq!(finder.normalize("  example.com  "), "http://example.com");
        assert_eq!(finder.normalize("https://example.com/x"), "https://example.com/x");
        assert_eq!(finder.normalize("http:example.com"), "http:example.com");
    }

    #[tokio::test]
    async fn test_finder_filters_formats() {
        let fetcher = StaticFetcher::new()
            .with("http://a.com/", StaticResponse::html(r#"<link rel="icon" href="/i.svg">"#))
            .with("http://a.com/i.svg", StaticResponse::ok(crate::testing::fixtures::SVG))
            .with("http://a.com/favicon.ico", StaticResponse::ok(crate::testing::fixtures::ico_bytes(&[32])));
        let engine = Besticon::builder().fetcher(Arc::new(fetcher)).build().unwrap();

        let mut finder = engine.new_icon_finder();
        let icons = finder.fetch_icons("a.com/").await.unwrap();
        assert_eq!(icons.len(), 1);
        assert_eq!(icons[0].format, IconFormat::Ico);

        let mut finder = engine.new_icon_finder().with_formats([IconFormat::Svg, IconFormat::Ico]);
        finder.fetch_icons("http://a.com/").await.unwrap();
        let range = SizeRange::parse("16", 500).unwrap();
        assert_eq!(finder.icon_in_size_range(range).unwrap().format, IconFormat::Svg);
        assert_eq!(finder.failures().len(), 2);
    }
}
