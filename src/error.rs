// src/error.rs
use std::time::Duration;

use crate::category::Category;
use crate::report::RunReport;

/// Failure of one feed query. Never fatal for the category.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("source unavailable for {category}: {reason}")]
    SourceUnavailable { category: Category, reason: String },

    #[error("empty query for {0}")]
    EmptyQuery(Category),

    #[error("source timed out after {0:?}")]
    Timeout(Duration),
}

/// Failure of one AI completion call.
#[derive(Debug, thiserror::Error)]
pub enum AiCallFailed {
    #[error("AI transport error: {0}")]
    Transport(String),

    #[error("AI provider returned HTTP {0}")]
    Status(u16),

    #[error("AI provider returned an empty completion")]
    EmptyResponse,

    #[error("AI call timed out after {0:?}")]
    Timeout(Duration),

    #[error("AI capability disabled")]
    Disabled,
}

#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    /// Nothing survived selection in any category.
    #[error("no articles selected in any category ({} issues recorded)", report.issues.len())]
    NoArticles { report: Box<RunReport> },

    #[error("run cancelled")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    Config(String),
}
