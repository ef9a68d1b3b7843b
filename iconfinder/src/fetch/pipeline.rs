//! Concurrent fetch-and-decode of icon candidates.

use sha1::{Digest, Sha1};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Semaphore};
use url::Url;

use super::client::{read_body_limited, Fetcher};
use crate::cancellation::CancellationToken;
use crate::decode::{is_svg, FormatRegistry};
use crate::errors::FetchError;
use crate::models::{Icon, IconFormat, IconOutcome};
use crate::observer::FetchObserver;

/// Width and height reported for SVG icons, which have no pixel size.
pub const SVG_SIZE: u32 = 9999;

/// Everything a fetch task needs, shared by handle between tasks.
#[derive(Clone)]
pub struct FetchContext {
    /// HTTP client.
    pub fetcher: Arc<dyn Fetcher>,
    /// Image format registry.
    pub registry: Arc<FormatRegistry>,
    /// Lifecycle observer.
    pub observer: Arc<dyn FetchObserver>,
    /// Bodies reaching this size are rejected.
    pub max_body_size: usize,
    /// Keep raw bodies on the returned icons.
    pub keep_image_data: bool,
    /// Cap on simultaneous fetches.
    pub max_concurrency: Option<usize>,
    /// Correlates observer notifications of one discovery.
    pub request_id: String,
}

impl std::fmt::Debug for FetchContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchContext")
            .field("max_body_size", &self.max_body_size)
            .field("keep_image_data", &self.keep_image_data)
            .field("max_concurrency", &self.max_concurrency)
            .field("request_id", &self.request_id)
            .finish_non_exhaustive()
    }
}

/// A fetched HTML page.
#[derive(Debug, Clone)]
pub struct Page {
    /// URL after redirects.
    pub final_url: String,
    /// `Content-Type` header, if any.
    pub content_type: Option<String>,
    /// Raw body, never empty.
    pub body: Vec<u8>,
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// GETs `url` and reads the whole body within the size cap.
///
/// Non-2xx answers and empty bodies are errors.
pub async fn fetch_body(ctx: &FetchContext, url: &str) -> Result<Page, FetchError> {
    let start = Instant::now();
    ctx.observer.on_fetch_start(url, &ctx.request_id);

    let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")));
    let response = match parsed {
        Ok(parsed) => ctx.fetcher.fetch(&parsed).await,
        Err(e) => Err(e),
    };
    let response = match response {
        Ok(response) => response,
        Err(e) => {
            ctx.observer
                .on_fetch_error(url, &ctx.request_id, elapsed_ms(start), &e.to_string());
            return Err(e);
        }
    };
    ctx.observer
        .on_fetch_complete(url, &ctx.request_id, elapsed_ms(start), response.status);

    if !response.is_success() {
        return Err(FetchError::Status(response.status));
    }

    let body = read_body_limited(response.body, ctx.max_body_size).await?;
    if body.is_empty() {
        return Err(FetchError::EmptyBody);
    }

    Ok(Page {
        final_url: response.final_url,
        content_type: response.content_type,
        body,
    })
}

/// Sizes a downloaded body and builds the icon record.
pub fn icon_from_body(
    url: &str,
    body: Vec<u8>,
    registry: &FormatRegistry,
    keep_image_data: bool,
) -> Result<Icon, FetchError> {
    if body.is_empty() {
        return Err(FetchError::EmptyBody);
    }

    let (format, width, height) = if is_svg(&body) {
        (IconFormat::Svg, SVG_SIZE, SVG_SIZE)
    } else {
        let config = registry.decode_config(&body)?;
        (config.format, config.width, config.height)
    };

    let sha1sum = hex::encode(Sha1::digest(&body));
    let icon = Icon::new(url, format, width, height).with_body_info(body.len(), sha1sum);
    Ok(if keep_image_data {
        icon.with_image_data(body)
    } else {
        icon
    })
}

/// Fetches and sizes one candidate. Never fails as a whole.
pub async fn fetch_icon(ctx: &FetchContext, url: &str) -> IconOutcome {
    let result = match fetch_body(ctx, url).await {
        Ok(page) => icon_from_body(url, page.body, &ctx.registry, ctx.keep_image_data),
        Err(e) => Err(e),
    };
    match result {
        Ok(icon) => IconOutcome::Fetched(icon),
        Err(error) => IconOutcome::failed(url, error),
    }
}

async fn fetch_icon_guarded(
    ctx: &FetchContext,
    url: &str,
    semaphore: Option<&Semaphore>,
    token: Option<&CancellationToken>,
) -> IconOutcome {
    let work = async {
        let _permit = match semaphore {
            Some(semaphore) => match semaphore.acquire().await {
                Ok(permit) => Some(permit),
                Err(e) => return IconOutcome::failed(url, FetchError::TaskFailed(e.to_string())),
            },
            None => None,
        };
        fetch_icon(ctx, url).await
    };

    match token {
        Some(token) => tokio::select! {
            biased;
            () = token.cancelled() => {
                IconOutcome::failed(url, FetchError::Cancelled(token.reason().unwrap_or_default()))
            }
            outcome = work => outcome,
        },
        None => work.await,
    }
}

/// Fetches every candidate concurrently and waits for all of them.
///
/// Returns exactly one outcome per input URL, ordered by URL so that task
/// completion order never leaks. A task that panics is reported as
/// [`FetchError::TaskFailed`].
pub async fn fetch_all_icons(
    ctx: &Arc<FetchContext>,
    urls: &[String],
    token: Option<Arc<CancellationToken>>,
) -> Vec<IconOutcome> {
    let (tx, mut rx) = mpsc::channel(urls.len().max(1));
    let semaphore = ctx.max_concurrency.map(|n| Arc::new(Semaphore::new(n.max(1))));

    let mut handles = Vec::with_capacity(urls.len());
    for url in urls {
        let tx = tx.clone();
        let ctx = Arc::clone(ctx);
        let semaphore = semaphore.clone();
        let token = token.clone();
        let task_url = url.clone();
        let handle = tokio::spawn(async move {
            let outcome =
                fetch_icon_guarded(&ctx, &task_url, semaphore.as_deref(), token.as_deref()).await;
            // The receiver outlives every sender.
            let _ = tx.send(outcome).await;
        });
        handles.push((url.clone(), handle));
    }
    drop(tx);

    let mut outcomes = Vec::with_capacity(urls.len());
    while let Some(outcome) = rx.recv().await {
        outcomes.push(outcome);
    }

    for (url, handle) in handles {
        if let Err(e) = handle.await {
            tracing::warn!(url = %url, error = %e, "Icon fetch task failed");
            outcomes.push(IconOutcome::failed(url, FetchError::TaskFailed(e.to_string())));
        }
    }

    outcomes.sort_by(|a, b| a.url().cmp(b.url()));
    outcomes
}
