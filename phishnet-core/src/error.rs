use phishnet_scanner::ScanError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Registration cache error: {0}")]
    Cache(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    #[error("Missing required column '{column}' in {source_name}")]
    MissingColumn { column: String, source_name: String },

    #[error("Label source {0} contains no URLs")]
    EmptySource(String),

    #[error("Training table needs at least two label classes, found {0}")]
    TooFewClasses(usize),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Interrupted after {0} of {1} items; completed work was flushed")]
    Interrupted(usize, usize),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
