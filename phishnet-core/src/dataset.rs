// Joining per-URL features, labeling and deduplication

use crate::error::{PipelineError, Result};
use crate::lexical::{LexicalFeatures, extract_domain, normalize_domain};
use crate::registration::{RegistrationRecord, UNKNOWN_AGE};
use chrono::{DateTime, Utc};
use phishnet_scanner::ContentRecord;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{debug, info, warn};

/// Column order of the assembled table.
pub const FEATURE_COLUMNS: [&str; 17] = [
    "url",
    "url_length",
    "num_dots",
    "uses_ip_address",
    "has_at",
    "has_dash",
    "has_special_chars",
    "suspicious_tld",
    "has_brand_keyword",
    "title",
    "meta",
    "body_text",
    "domain_age_days",
    "registrar",
    "creation_date",
    "expiration_date",
    "label",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Label {
    Benign,
    Phishing,
}

impl From<Label> for u8 {
    fn from(label: Label) -> u8 {
        match label {
            Label::Benign => 0,
            Label::Phishing => 1,
        }
    }
}

impl TryFrom<u8> for Label {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Label::Benign),
            1 => Ok(Label::Phishing),
            other => Err(format!("label must be 0 or 1, got {}", other)),
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Benign => write!(f, "benign"),
            Label::Phishing => write!(f, "phishing"),
        }
    }
}

/// A URL as it comes out of a label source. The label stays unset until
/// the assembler attaches the source's label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UrlRecord {
    pub url: String,
    pub label: Option<Label>,
}

impl UrlRecord {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            label: None,
        }
    }

    pub fn with_label(mut self, label: Label) -> Self {
        self.label = Some(label);
        self
    }
}

/// Joined, still unlabeled features for one URL.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    pub lexical: LexicalFeatures,
    pub content: Option<ContentRecord>,
    pub registration: Option<RegistrationRecord>,
}

impl FeatureRecord {
    pub fn new(lexical: LexicalFeatures) -> Self {
        Self {
            lexical,
            content: None,
            registration: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.lexical.url
    }

    pub fn with_content(mut self, content: ContentRecord) -> Self {
        self.content = Some(content);
        self
    }

    pub fn with_registration(mut self, registration: RegistrationRecord) -> Self {
        self.registration = Some(registration);
        self
    }

    /// Flattens into a table row, filling absent joins with sentinels.
    pub fn into_row(self, label: Label) -> FeatureRow {
        let LexicalFeatures {
            url,
            url_length,
            num_dots,
            uses_ip_address,
            has_at,
            has_dash,
            has_special_chars,
            suspicious_tld,
            has_brand_keyword,
        } = self.lexical;

        let content = self.content.unwrap_or_default();
        let registration = self
            .registration
            .unwrap_or_else(|| RegistrationRecord::unknown(""));

        FeatureRow {
            url,
            url_length,
            num_dots,
            uses_ip_address,
            has_at,
            has_dash,
            has_special_chars,
            suspicious_tld,
            has_brand_keyword,
            title: content.title,
            meta: content.meta,
            body_text: content.body_text,
            domain_age_days: registration.domain_age_days,
            registrar: registration.registrar,
            creation_date: registration.creation_date,
            expiration_date: registration.expiration_date,
            label,
        }
    }
}

/// One row of the training table. Every column is always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub url: String,
    pub url_length: usize,
    pub num_dots: usize,
    #[serde(with = "flag")]
    pub uses_ip_address: bool,
    #[serde(with = "flag")]
    pub has_at: bool,
    #[serde(with = "flag")]
    pub has_dash: bool,
    #[serde(with = "flag")]
    pub has_special_chars: bool,
    #[serde(with = "flag")]
    pub suspicious_tld: bool,
    #[serde(with = "flag")]
    pub has_brand_keyword: bool,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub meta: String,
    #[serde(default)]
    pub body_text: String,
    #[serde(default = "unknown_age")]
    pub domain_age_days: i64,
    pub registrar: Option<String>,
    pub creation_date: Option<DateTime<Utc>>,
    pub expiration_date: Option<DateTime<Utc>>,
    pub label: Label,
}

fn unknown_age() -> i64 {
    UNKNOWN_AGE
}

impl FeatureRow {
    pub fn url_record(&self) -> UrlRecord {
        UrlRecord::new(self.url.clone()).with_label(self.label)
    }
}

/// Booleans as `0`/`1` so every lexical column is numeric. Reading also
/// accepts `true`/`false`.
mod flag {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" => Ok(true),
            "0" | "false" | "" => Ok(false),
            other => Err(D::Error::custom(format!("invalid flag value '{}'", other))),
        }
    }
}

/// A feature table whose every row carries the same label.
#[derive(Debug, Clone)]
pub struct LabeledSource {
    pub name: String,
    pub label: Label,
    pub rows: Vec<FeatureRecord>,
}

impl LabeledSource {
    pub fn new(name: impl Into<String>, label: Label, rows: Vec<FeatureRecord>) -> Self {
        Self {
            name: name.into(),
            label,
            rows,
        }
    }
}

/// Keeps the first item for each key, preserving order.
pub fn dedup_first<T>(items: Vec<T>, key: impl Fn(&T) -> &str) -> Vec<T> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(key(item).to_string()))
        .collect()
}

pub fn dedup_by_url(rows: Vec<FeatureRecord>) -> Vec<FeatureRecord> {
    dedup_first(rows, |row| row.url())
}

pub fn dedup_by_domain(records: Vec<RegistrationRecord>) -> Vec<RegistrationRecord> {
    dedup_first(records, |record| record.domain.as_str())
}

/// Attaches content (by exact URL) and registration data (by hostname) to
/// each lexical row. Rows without a match keep the join empty.
pub fn join_features(
    lexical: Vec<LexicalFeatures>,
    content: &HashMap<String, ContentRecord>,
    registrations: &HashMap<String, RegistrationRecord>,
) -> Vec<FeatureRecord> {
    lexical
        .into_iter()
        .map(|features| {
            let domain = normalize_domain(&extract_domain(&features.url));
            let mut record = FeatureRecord::new(features);
            if let Some(page) = content.get(record.url()) {
                record = record.with_content(page.clone());
            }
            if let Some(registration) = registrations.get(&domain) {
                record = record.with_registration(registration.clone());
            }
            record
        })
        .collect()
}

/// Labels and concatenates sources in order. Duplicate URLs are collapsed
/// within a source (first kept) but never across sources: a URL present in
/// two differently labeled sources yields two rows and a warning.
pub fn merge(sources: Vec<LabeledSource>) -> Vec<FeatureRow> {
    let mut rows = Vec::new();

    for source in sources {
        let before = source.rows.len();
        let unique = dedup_by_url(source.rows);
        if unique.len() < before {
            debug!(
                "Dropped {} duplicate URLs from source {}",
                before - unique.len(),
                source.name
            );
        }

        info!(
            "Labeling {} rows from {} as {}",
            unique.len(),
            source.name,
            source.label
        );
        let label = source.label;
        rows.extend(unique.into_iter().map(|record| record.into_row(label)));
    }

    let conflicts = conflicting_urls(&rows);
    if !conflicts.is_empty() {
        warn!(
            "{} URLs appear with both labels, e.g. {}",
            conflicts.len(),
            conflicts[0]
        );
    }

    rows
}

/// URLs that occur with more than one label, in first-seen order.
pub fn conflicting_urls(rows: &[FeatureRow]) -> Vec<String> {
    let mut labels: HashMap<&str, HashSet<Label>> = HashMap::new();
    let mut order = Vec::new();

    for row in rows {
        let entry = labels.entry(row.url.as_str()).or_default();
        if entry.is_empty() {
            order.push(row.url.as_str());
        }
        entry.insert(row.label);
    }

    order
        .into_iter()
        .filter(|url| labels[url].len() > 1)
        .map(str::to_string)
        .collect()
}

/// The trainer needs both classes present.
pub fn validate_training_table(rows: &[FeatureRow]) -> Result<()> {
    let classes: HashSet<Label> = rows.iter().map(|row| row.label).collect();
    if classes.len() < 2 {
        return Err(PipelineError::TooFewClasses(classes.len()));
    }
    Ok(())
}
