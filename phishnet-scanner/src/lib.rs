pub mod content;
pub mod error;
pub mod fetch;
pub mod rdap;
pub mod result;

pub use content::{ContentFetcher, ProgressCallback};
pub use error::ScanError;
pub use fetch::{FetchProvider, FetchResponse, HttpFetcher};
pub use result::{ContentBatch, ContentOutcome, ContentRecord, FetchFailure};
