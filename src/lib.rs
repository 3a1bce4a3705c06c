// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod article;
pub mod assemble;
pub mod category;
pub mod config;
pub mod digest;
pub mod enrich;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod notify;
pub mod pipeline;
pub mod render;
pub mod report;

// ---- Re-exports for stable public API ----
pub use article::{EnrichedArticle, EnrichmentStatus, RawArticle};
pub use assemble::CategoryBucket;
pub use category::Category;
pub use config::DigestConfig;
pub use digest::Digest;
pub use error::{AiCallFailed, DigestError, SourceError};
pub use pipeline::{Pipeline, PipelineContext, RunOutcome};
pub use report::{Issue, IssueKind, ReportSink, RunReport};
