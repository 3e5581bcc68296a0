use crate::config::PipelineConfig;
use crate::data::RegistrationCache;
use crate::dataset::{
    FeatureRow, Label, LabeledSource, conflicting_urls, dedup_by_domain, dedup_first,
    join_features, merge, validate_training_table,
};
use crate::error::{PipelineError, Result};
use crate::lexical::{extract_domain, normalize_domain};
use crate::registration::{RegistrationRecord, RegistrationResolver};
use crate::report::{
    CONTENT_COLUMNS, FAILURE_COLUMNS, TableSink, write_feature_table, write_registration_table,
};
use crate::sources::LabelSource;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use phishnet_scanner::{ContentFetcher, ContentRecord, FetchProvider, ProgressCallback};
use std::collections::HashMap;
use std::fs;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{info, warn};

/// What a finished build produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSummary {
    pub total_urls: usize,
    pub rows: usize,
    pub phishing_rows: usize,
    pub benign_rows: usize,
    pub content_failures: usize,
    pub domains: usize,
    pub unknown_age: usize,
    pub lookups: usize,
    pub conflicting_urls: usize,
    pub trainable: bool,
    pub features_path: PathBuf,
    pub failures_path: Option<PathBuf>,
}

/// Runs label sources through lexical analysis, content fetching and
/// registration lookups, then writes the assembled table.
pub struct Pipeline<P> {
    config: PipelineConfig,
    fetcher: ContentFetcher<Arc<P>>,
    resolver: RegistrationResolver<Arc<P>>,
    content_bar: ProgressBar,
    registration_bar: ProgressBar,
}

fn progress_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.cyan} {msg} [{bar:30.cyan/blue}] {pos}/{len} ({eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

fn bar_callback(bar: &ProgressBar) -> ProgressCallback {
    let bar = bar.clone();
    Arc::new(move |_item: String| bar.inc(1))
}

impl<P: FetchProvider> Pipeline<P> {
    pub fn new(config: PipelineConfig, provider: P, cache: Arc<RegistrationCache>) -> Self {
        let provider = Arc::new(provider);
        let content_bar = ProgressBar::hidden();
        let registration_bar = ProgressBar::hidden();

        let fetcher = ContentFetcher::new(provider.clone())
            .with_timeout(config.fetch_timeout)
            .with_concurrency(config.concurrency)
            .with_progress_callback(bar_callback(&content_bar));

        let resolver = RegistrationResolver::new(provider, cache)
            .with_rdap_base(config.rdap_base.clone())
            .with_timeout(config.lookup_timeout)
            .with_lookup_delay(config.lookup_delay)
            .with_concurrency(config.concurrency)
            .with_progress_callback(bar_callback(&registration_bar));

        Self {
            config,
            fetcher,
            resolver,
            content_bar,
            registration_bar,
        }
    }

    pub async fn build(&self, sources: &[LabelSource]) -> Result<BuildSummary> {
        self.build_until(sources, std::future::pending()).await
    }

    /// Like [`Self::build`], but stops as soon as `shutdown` completes. Rows
    /// finished before that point are already on disk; the call returns
    /// [`PipelineError::Interrupted`].
    pub async fn build_until<S>(&self, sources: &[LabelSource], shutdown: S) -> Result<BuildSummary>
    where
        S: Future<Output = ()>,
    {
        self.config.validate()?;
        if sources.is_empty() {
            return Err(PipelineError::Config("no label sources given".to_string()));
        }
        fs::create_dir_all(&self.config.data_dir)?;

        // A failure report from an earlier run must not outlive it.
        let failures_path = self.config.failures_path();
        if failures_path.exists() {
            fs::remove_file(&failures_path)?;
        }

        let mut loaded = Vec::with_capacity(sources.len());
        for source in sources {
            let urls: Vec<String> = source.load()?.into_iter().map(|record| record.url).collect();
            loaded.push((source, urls));
        }

        let all_urls: Vec<String> = dedup_first(
            loaded.iter().flat_map(|(_, urls)| urls.iter().cloned()).collect(),
            |url: &String| url.as_str(),
        );
        info!("Building dataset from {} unique URLs", all_urls.len());

        tokio::pin!(shutdown);

        let (contents, content_failures) = if self.config.fetch_content {
            self.fetch_stage(&all_urls, shutdown.as_mut()).await?
        } else {
            (HashMap::new(), 0)
        };

        let registrations = if self.config.resolve_registration {
            let domains: Vec<String> = dedup_first(
                all_urls
                    .iter()
                    .map(|url| normalize_domain(&extract_domain(url)))
                    .filter(|domain| !domain.is_empty())
                    .collect(),
                |domain: &String| domain.as_str(),
            );
            self.resolve_stage(&domains, shutdown.as_mut()).await?
        } else {
            HashMap::new()
        };

        let analyzer = self.config.analyzer();
        let labeled: Vec<LabeledSource> = loaded
            .into_iter()
            .map(|(source, urls)| {
                let lexical = analyzer.analyze_bulk(&urls);
                let rows = join_features(lexical, &contents, &registrations);
                LabeledSource::new(source.name(), source.label, rows)
            })
            .collect();

        let rows = merge(labeled);
        let features_path = self.config.features_path();
        write_feature_table(&features_path, &rows)?;
        info!("Wrote {} rows to {}", rows.len(), features_path.display());

        let trainable = match validate_training_table(&rows) {
            Ok(()) => true,
            Err(e) => {
                warn!("{}", e);
                false
            }
        };

        Ok(BuildSummary {
            total_urls: all_urls.len(),
            rows: rows.len(),
            phishing_rows: count_label(&rows, Label::Phishing),
            benign_rows: count_label(&rows, Label::Benign),
            content_failures,
            domains: registrations.len(),
            unknown_age: registrations.values().filter(|r| !r.has_known_age()).count(),
            lookups: self.resolver.lookups_performed(),
            conflicting_urls: conflicting_urls(&rows).len(),
            trainable,
            features_path,
            failures_path: (content_failures > 0).then_some(failures_path),
        })
    }

    /// Streams content rows and failures to disk as each URL completes, in
    /// completion order, so an interrupt loses only fetches still in flight.
    async fn fetch_stage<S>(
        &self,
        urls: &[String],
        mut shutdown: Pin<&mut S>,
    ) -> Result<(HashMap<String, ContentRecord>, usize)>
    where
        S: Future<Output = ()>,
    {
        let failures_path = self.config.failures_path();
        let mut content_sink = TableSink::create(&self.config.content_path(), &CONTENT_COLUMNS)?;
        let mut failure_sink: Option<TableSink> = None;
        let mut contents = HashMap::with_capacity(urls.len());

        self.start_bar(&self.content_bar, "Fetching content", urls.len());
        let stream = self.fetcher.fetch_stream_unordered(urls);
        tokio::pin!(stream);

        loop {
            let outcome = tokio::select! {
                _ = shutdown.as_mut() => {
                    self.content_bar.abandon_with_message("Content fetch interrupted");
                    warn!("Interrupted after {} of {} content fetches", content_sink.rows(), urls.len());
                    return Err(PipelineError::Interrupted(content_sink.rows(), urls.len()));
                }
                next = stream.next() => match next {
                    Some(outcome) => outcome,
                    None => break,
                },
            };

            let (record, failure) = outcome.into_parts();
            content_sink.append(&record)?;

            if let Some(failure) = failure {
                if failure_sink.is_none() {
                    failure_sink = Some(TableSink::create(&failures_path, &FAILURE_COLUMNS)?);
                }
                if let Some(sink) = failure_sink.as_mut() {
                    sink.append(&failure)?;
                }
            }

            contents.insert(record.url.clone(), record);
        }

        let failures = failure_sink.as_ref().map_or(0, TableSink::rows);
        self.content_bar.finish_with_message(format!(
            "Content fetched ({} failures)",
            failures
        ));
        info!(
            "Content stage complete: {} pages, {} failures",
            contents.len(),
            failures
        );
        Ok((contents, failures))
    }

    async fn resolve_stage<S>(
        &self,
        domains: &[String],
        shutdown: Pin<&mut S>,
    ) -> Result<HashMap<String, RegistrationRecord>>
    where
        S: Future<Output = ()>,
    {
        self.start_bar(&self.registration_bar, "Resolving registrations", domains.len());

        let records = tokio::select! {
            _ = shutdown => {
                let done = self.registration_bar.position() as usize;
                self.registration_bar.abandon_with_message("Registration lookups interrupted");
                warn!("Interrupted after {} of {} registration lookups", done, domains.len());
                return Err(PipelineError::Interrupted(done, domains.len()));
            }
            records = self.resolver.resolve_many(domains) => records?,
        };

        let records = dedup_by_domain(records);
        write_registration_table(&self.config.registration_path(), &records)?;
        self.registration_bar.finish_with_message("Registrations resolved");

        Ok(records
            .into_iter()
            .map(|record| (record.domain.clone(), record))
            .collect())
    }

    fn start_bar(&self, bar: &ProgressBar, message: &'static str, len: usize) {
        if self.config.show_progress_bars {
            bar.set_draw_target(ProgressDrawTarget::stderr());
        }
        bar.set_style(progress_style());
        bar.set_length(len as u64);
        bar.set_position(0);
        bar.set_message(message);
    }
}

fn count_label(rows: &[FeatureRow], label: Label) -> usize {
    rows.iter().filter(|row| row.label == label).count()
}

/// Human-readable summary of a build.
pub fn generate_build_report(summary: &BuildSummary) -> String {
    let mut report = String::new();
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
    report.push_str("# Summary:\n");
    report.push_str(&format!("  Unique URLs: {}\n", summary.total_urls));
    report.push_str(&format!(
        "  Rows written: {} ({} phishing, {} benign)\n",
        summary.rows, summary.phishing_rows, summary.benign_rows
    ));
    report.push_str(&format!("  Content failures: {}\n", summary.content_failures));
    report.push_str(&format!(
        "  Domains resolved: {} ({} unknown age, {} new lookups)\n",
        summary.domains, summary.unknown_age, summary.lookups
    ));
    if summary.conflicting_urls > 0 {
        report.push_str(&format!(
            "  URLs with conflicting labels: {}\n",
            summary.conflicting_urls
        ));
    }
    report.push_str("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
    report.push_str(&format!("  Table: {}\n", summary.features_path.display()));
    if let Some(ref failures_path) = summary.failures_path {
        report.push_str(&format!("  Failures: {}\n", failures_path.display()));
    }
    if !summary.trainable {
        report.push_str("  Warning: table has fewer than two label classes\n");
    }

    report
}
