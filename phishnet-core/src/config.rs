use crate::error::{PipelineError, Result};
use crate::lexical::{DEFAULT_BRAND_KEYWORDS, DEFAULT_SUSPICIOUS_TLDS, LexicalAnalyzer};
use crate::registration::{DEFAULT_LOOKUP_DELAY, DEFAULT_LOOKUP_TIMEOUT};
use crate::report::{
    CONTENT_FEATURES_FILE, FAILED_URLS_FILE, REGISTRATION_FEATURES_FILE, URL_FEATURES_FILE,
};
use phishnet_scanner::content::{DEFAULT_CONCURRENCY, DEFAULT_TIMEOUT};
use phishnet_scanner::rdap::DEFAULT_RDAP_BASE;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CACHE_FILE: &str = "registration_cache.db";
pub const LOG_FILE: &str = "pipeline.log";

/// Everything a pipeline run needs, built once by the caller and handed to
/// each component.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub fetch_timeout: Duration,
    pub lookup_timeout: Duration,
    pub concurrency: usize,
    pub lookup_delay: Duration,
    pub rdap_base: String,
    pub brand_keywords: Vec<String>,
    pub suspicious_tlds: Vec<String>,
    pub fetch_content: bool,
    pub resolve_registration: bool,
    pub show_progress_bars: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("~/.config/phishnet/"),
            fetch_timeout: DEFAULT_TIMEOUT,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
            concurrency: DEFAULT_CONCURRENCY,
            lookup_delay: DEFAULT_LOOKUP_DELAY,
            rdap_base: DEFAULT_RDAP_BASE.to_string(),
            brand_keywords: DEFAULT_BRAND_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            suspicious_tlds: DEFAULT_SUSPICIOUS_TLDS.iter().map(|s| s.to_string()).collect(),
            fetch_content: true,
            resolve_registration: true,
            show_progress_bars: true,
        }
    }
}

impl PipelineConfig {
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(PipelineError::Config("concurrency must be at least 1".to_string()));
        }
        if self.fetch_timeout.is_zero() || self.lookup_timeout.is_zero() {
            return Err(PipelineError::Config("timeouts must be non-zero".to_string()));
        }
        if self.rdap_base.trim().is_empty() {
            return Err(PipelineError::Config("RDAP base URL is empty".to_string()));
        }
        Ok(())
    }

    pub fn analyzer(&self) -> LexicalAnalyzer {
        LexicalAnalyzer::new(&self.brand_keywords, &self.suspicious_tlds)
    }

    pub fn cache_path(&self) -> PathBuf {
        self.data_dir.join(CACHE_FILE)
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join(LOG_FILE)
    }

    pub fn features_path(&self) -> PathBuf {
        self.data_dir.join(URL_FEATURES_FILE)
    }

    pub fn failures_path(&self) -> PathBuf {
        self.data_dir.join(FAILED_URLS_FILE)
    }

    pub fn content_path(&self) -> PathBuf {
        self.data_dir.join(CONTENT_FEATURES_FILE)
    }

    pub fn registration_path(&self) -> PathBuf {
        self.data_dir.join(REGISTRATION_FEATURES_FILE)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

/// Splits a comma-separated override such as `paypal,bank` into a list.
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
