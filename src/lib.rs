//! Persian/English news ingestion and analysis pipeline: configuration-driven
//! field extraction, timestamp normalization, TF-IDF story grouping with
//! duplicate flagging, and per-group publication-speed metrics.

pub mod analyzer;
pub mod config;
pub mod dates;
pub mod extractor;
pub mod fetcher;
pub mod grouping;
pub mod ingest;
pub mod repo;
pub mod sentiment;
pub mod similarity;
pub mod speed;
pub mod text;
pub mod types;

pub use analyzer::NewsAnalyzer;
pub use config::{AnalysisConfig, FetchConfig, SourceConfig};
pub use dates::TimestampNormalizer;
pub use fetcher::Fetcher;
pub use repo::{ArticleRepository, MemoryRepository, PgRepository};
pub use similarity::{SimilarityEngine, SimilarityOutcome};
pub use text::TextPreprocessor;
pub use types::{AnalyzerError, Result};
