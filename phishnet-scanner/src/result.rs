use serde::{Deserialize, Serialize};

/// Text extracted from one page. Empty fields mean extraction failed, not
/// that the page was blank; see [`ContentOutcome`] for which one it was.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub url: String,
    pub title: String,
    pub meta: String,
    pub body_text: String,
}

impl ContentRecord {
    pub fn new(url: String, title: String, meta: String, body_text: String) -> Self {
        Self {
            url,
            title,
            meta,
            body_text,
        }
    }

    pub fn empty(url: String) -> Self {
        Self {
            url,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.meta.is_empty() && self.body_text.is_empty()
    }
}

/// One row of the failure report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchFailure {
    pub url: String,
    pub error: String,
}

impl FetchFailure {
    pub fn new(url: String, error: String) -> Self {
        Self { url, error }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentOutcome {
    Extracted(ContentRecord),
    Failed {
        record: ContentRecord,
        failure: FetchFailure,
    },
}

impl ContentOutcome {
    pub fn failed(url: String, error: String) -> Self {
        ContentOutcome::Failed {
            record: ContentRecord::empty(url.clone()),
            failure: FetchFailure::new(url, error),
        }
    }

    pub fn record(&self) -> &ContentRecord {
        match self {
            ContentOutcome::Extracted(record) => record,
            ContentOutcome::Failed { record, .. } => record,
        }
    }

    pub fn failure(&self) -> Option<&FetchFailure> {
        match self {
            ContentOutcome::Extracted(_) => None,
            ContentOutcome::Failed { failure, .. } => Some(failure),
        }
    }

    pub fn into_parts(self) -> (ContentRecord, Option<FetchFailure>) {
        match self {
            ContentOutcome::Extracted(record) => (record, None),
            ContentOutcome::Failed { record, failure } => (record, Some(failure)),
        }
    }
}

/// Records for every requested URL, in request order, plus the subset that failed.
#[derive(Debug, Clone, Default)]
pub struct ContentBatch {
    pub records: Vec<ContentRecord>,
    pub failures: Vec<FetchFailure>,
}

impl ContentBatch {
    pub fn push(&mut self, outcome: ContentOutcome) {
        let (record, failure) = outcome.into_parts();
        self.records.push(record);
        if let Some(failure) = failure {
            self.failures.push(failure);
        }
    }
}

impl FromIterator<ContentOutcome> for ContentBatch {
    fn from_iter<I: IntoIterator<Item = ContentOutcome>>(iter: I) -> Self {
        let mut batch = ContentBatch::default();
        for outcome in iter {
            batch.push(outcome);
        }
        batch
    }
}
