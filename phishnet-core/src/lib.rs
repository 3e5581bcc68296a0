pub mod config;
pub mod data;
pub mod dataset;
pub mod error;
pub mod lexical;
pub mod pipeline;
pub mod registration;
pub mod report;
pub mod sources;

pub use config::PipelineConfig;
pub use data::{CacheStats, RegistrationCache};
pub use dataset::{FeatureRecord, FeatureRow, Label, LabeledSource, UrlRecord};
pub use error::{PipelineError, Result};
pub use lexical::{LexicalAnalyzer, LexicalFeatures};
pub use pipeline::{BuildSummary, Pipeline};
pub use registration::{LookupOutcome, RegistrationRecord, RegistrationResolver};
pub use sources::{LabelSource, SourceFormat};
