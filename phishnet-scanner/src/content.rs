use crate::error::{Result, ScanError};
use crate::fetch::FetchProvider;
use crate::result::{ContentBatch, ContentOutcome, ContentRecord};
use futures::stream::{self, Stream, StreamExt};
use scraper::{ElementRef, Html, Selector};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{debug, info, warn};

pub type ProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Elements whose text never counts as visible body text.
const HIDDEN_ELEMENTS: [&str; 5] = ["script", "style", "head", "title", "meta"];

static TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("title selector is valid"));

static META_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta").expect("meta selector is valid"));

pub struct ContentFetcher<P> {
    provider: P,
    timeout: Duration,
    concurrency: usize,
    progress_callback: Option<ProgressCallback>,
}

impl<P: FetchProvider> ContentFetcher<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            timeout: DEFAULT_TIMEOUT,
            concurrency: DEFAULT_CONCURRENCY,
            progress_callback: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Fetches one page and extracts its text. Never fails: any error becomes
    /// an empty record paired with a [`crate::FetchFailure`].
    pub async fn fetch_content(&self, url: &str) -> ContentOutcome {
        let outcome = match self.fetch_page(url).await {
            Ok(body) => ContentOutcome::Extracted(extract_content(url, &body)),
            Err(e) => {
                warn!(
                    "Failed to extract content from {}: {}: {}",
                    url,
                    e.kind(),
                    e
                );
                ContentOutcome::failed(url.to_string(), e.to_string())
            }
        };

        if let Some(ref callback) = self.progress_callback {
            callback(url.to_string());
        }

        outcome
    }

    /// Outcomes in the same order as `urls`, at most `concurrency` in flight.
    pub fn fetch_stream<'a>(
        &'a self,
        urls: &'a [String],
    ) -> impl Stream<Item = ContentOutcome> + 'a {
        stream::iter(urls)
            .map(move |url| self.fetch_content(url))
            .buffered(self.concurrency)
    }

    /// Outcomes in completion order, at most `concurrency` in flight. A slow
    /// page never holds back pages that already finished.
    pub fn fetch_stream_unordered<'a>(
        &'a self,
        urls: &'a [String],
    ) -> impl Stream<Item = ContentOutcome> + 'a {
        stream::iter(urls)
            .map(move |url| self.fetch_content(url))
            .buffer_unordered(self.concurrency)
    }

    pub async fn fetch_many(&self, urls: &[String]) -> ContentBatch {
        info!(
            "Fetching content for {} URLs with {} workers",
            urls.len(),
            self.concurrency
        );

        let outcomes: Vec<ContentOutcome> = self.fetch_stream(urls).collect().await;
        let batch: ContentBatch = outcomes.into_iter().collect();

        info!(
            "Content fetch complete: {} records, {} failures",
            batch.records.len(),
            batch.failures.len()
        );
        batch
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        // The provider gets the deadline too, but a provider that ignores it
        // must not stall the batch.
        let response = tokio::time::timeout(self.timeout, self.provider.fetch(url, self.timeout))
            .await
            .map_err(|_| ScanError::Timeout(self.timeout))??;

        debug!("{} answered {}", url, response.status_code);
        Ok(response.error_for_status()?.body)
    }
}

/// Pulls title, meta content and visible text out of an HTML document.
pub fn extract_content(url: &str, html: &str) -> ContentRecord {
    let document = Html::parse_document(html);

    let title = document
        .select(&TITLE_SELECTOR)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    let meta = document
        .select(&META_SELECTOR)
        .filter_map(|element| element.value().attr("content"))
        .filter(|content| !content.is_empty())
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(" | ");

    let body_text = visible_text(&document);

    ContentRecord::new(url.to_string(), title, meta, body_text)
}

/// Text nodes outside [`HIDDEN_ELEMENTS`], whitespace collapsed to single spaces.
pub fn visible_text(document: &Html) -> String {
    let mut pieces = Vec::new();
    collect_visible_text(document.root_element(), &mut pieces);

    pieces
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn collect_visible_text<'a>(element: ElementRef<'a>, pieces: &mut Vec<&'a str>) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                pieces.push(trimmed);
            }
        } else if let Some(child_element) = ElementRef::wrap(child)
            && !HIDDEN_ELEMENTS.contains(&child_element.value().name())
        {
            collect_visible_text(child_element, pieces);
        }
    }
}
