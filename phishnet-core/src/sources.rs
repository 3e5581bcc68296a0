// Readers for the local files that provide labeled URLs

use crate::dataset::{Label, UrlRecord, dedup_first};
use crate::error::{PipelineError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// PhishTank CSV export; URLs come from the `url` column.
    PhishTank,
    /// Tranco/Alexa style `rank,domain` rows.
    Tranco,
    /// One URL per line. Blank lines and `#` comments are skipped.
    List,
}

impl SourceFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "phishtank" => Some(SourceFormat::PhishTank),
            "tranco" | "alexa" => Some(SourceFormat::Tranco),
            "list" | "txt" => Some(SourceFormat::List),
            _ => None,
        }
    }
}

/// A label-source file and the label every URL in it receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSource {
    pub path: PathBuf,
    pub format: SourceFormat,
    pub label: Label,
}

impl LabelSource {
    pub fn new(path: impl Into<PathBuf>, format: SourceFormat, label: Label) -> Self {
        Self {
            path: path.into(),
            format,
            label,
        }
    }

    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Unlabeled, deduplicated records in file order. An empty source is an error.
    pub fn load(&self) -> Result<Vec<UrlRecord>> {
        let urls = match self.format {
            SourceFormat::PhishTank => load_phishtank_csv(&self.path)?,
            SourceFormat::Tranco => load_tranco_csv(&self.path)?,
            SourceFormat::List => load_url_list(&self.path)?,
        };

        if urls.is_empty() {
            return Err(PipelineError::EmptySource(self.path.display().to_string()));
        }

        info!("Loaded {} URLs from {} ({})", urls.len(), self.name(), self.label);
        Ok(urls.into_iter().map(UrlRecord::new).collect())
    }
}

pub fn load_phishtank_csv(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let column = headers
        .iter()
        .position(|header| header.trim() == "url")
        .ok_or_else(|| PipelineError::MissingColumn {
            column: "url".to_string(),
            source_name: path.display().to_string(),
        })?;

    let mut urls = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(url) = record.get(column) {
            urls.push(url.to_string());
        }
    }

    Ok(clean(urls))
}

/// Rows whose rank isn't a number (a header line) are skipped. Domains are
/// lowercased and given an `https://` prefix.
pub fn load_tranco_csv(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut urls = Vec::new();
    for record in reader.records() {
        let record = record?;
        let (Some(rank), Some(domain)) = (record.get(0), record.get(1)) else {
            continue;
        };
        if rank.trim().parse::<u64>().is_err() {
            debug!("Skipping non-ranked row in {}: {:?}", path.display(), rank);
            continue;
        }

        let domain = domain.trim().to_lowercase();
        if !domain.is_empty() {
            urls.push(format!("https://{}", domain));
        }
    }

    Ok(clean(urls))
}

pub fn load_url_list(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)?;
    let urls = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .map(str::to_string)
        .collect();

    Ok(clean(urls))
}

/// Trims, drops empty entries and keeps the first occurrence of each URL.
fn clean(urls: Vec<String>) -> Vec<String> {
    let trimmed = urls
        .into_iter()
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .collect();
    dedup_first(trimmed, |url: &String| url.as_str())
}
