// CSV tables written to and read back from the data directory

use crate::dataset::{FEATURE_COLUMNS, FeatureRow};
use crate::error::{PipelineError, Result};
use crate::registration::RegistrationRecord;
use serde::Serialize;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

pub const URL_FEATURES_FILE: &str = "url_features.csv";
pub const FAILED_URLS_FILE: &str = "failed_urls.csv";
pub const CONTENT_FEATURES_FILE: &str = "content_features.csv";
pub const REGISTRATION_FEATURES_FILE: &str = "registration_features.csv";

pub const CONTENT_COLUMNS: [&str; 4] = ["url", "title", "meta", "body_text"];
pub const FAILURE_COLUMNS: [&str; 2] = ["url", "error"];
pub const REGISTRATION_COLUMNS: [&str; 5] = [
    "domain",
    "domain_age_days",
    "registrar",
    "creation_date",
    "expiration_date",
];

/// A CSV file written one row at a time. Each row is flushed as soon as it
/// is written, so an interrupted run leaves every completed row on disk.
pub struct TableSink {
    path: PathBuf,
    writer: csv::Writer<File>,
    rows: usize,
}

impl TableSink {
    /// Creates (or truncates) `path` and writes the header row.
    pub fn create(path: &Path, columns: &[&str]) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(path)?;
        writer.write_record(columns)?;
        writer.flush()?;

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            rows: 0,
        })
    }

    pub fn append<T: Serialize>(&mut self, row: &T) -> Result<()> {
        self.writer.serialize(row)?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn write_table<T: Serialize>(path: &Path, columns: &[&str], rows: &[T]) -> Result<()> {
    let mut sink = TableSink::create(path, columns)?;
    for row in rows {
        sink.append(row)?;
    }
    Ok(())
}

pub fn write_feature_table(path: &Path, rows: &[FeatureRow]) -> Result<()> {
    write_table(path, &FEATURE_COLUMNS, rows)
}

/// Reads an assembled table back. Every feature column must be present;
/// extra columns are ignored.
pub fn read_feature_table(path: &Path) -> Result<Vec<FeatureRow>> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();

    if let Some(missing) = FEATURE_COLUMNS
        .iter()
        .find(|column| !headers.iter().any(|header| header == **column))
    {
        return Err(PipelineError::MissingColumn {
            column: missing.to_string(),
            source_name: path.display().to_string(),
        });
    }

    let rows = reader
        .deserialize()
        .collect::<std::result::Result<Vec<FeatureRow>, csv::Error>>()?;
    Ok(rows)
}

pub fn write_registration_table(path: &Path, records: &[RegistrationRecord]) -> Result<()> {
    write_table(path, &REGISTRATION_COLUMNS, records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use phishnet_scanner::FetchFailure;
    use tempfile::TempDir;

    #[test]
    fn test_sink_writes_header_for_empty_table() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(CONTENT_FEATURES_FILE);

        let sink = TableSink::create(&path, &CONTENT_COLUMNS).unwrap();
        assert_eq!(sink.rows(), 0);
        drop(sink);

        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written.trim_end(), "url,title,meta,body_text");
    }

    #[test]
    fn test_sink_flushes_each_row() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(FAILED_URLS_FILE);

        let mut sink = TableSink::create(&path, &FAILURE_COLUMNS).unwrap();
        sink.append(&FetchFailure::new(
            "http://a.com".to_string(),
            "status: HTTP status 404".to_string(),
        ))
        .unwrap();

        // Still open, but the row is already on disk.
        let written = fs::read_to_string(sink.path()).unwrap();
        assert_eq!(written.lines().count(), 2);
        assert!(written.contains("http://a.com"));
    }

    #[test]
    fn test_registration_table_sentinels() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(REGISTRATION_FEATURES_FILE);

        write_registration_table(&path, &[RegistrationRecord::unknown("bad.tk")]).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines[0], "domain,domain_age_days,registrar,creation_date,expiration_date");
        assert_eq!(lines[1], "bad.tk,-1,,,");
    }
}
