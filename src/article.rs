// src/article.rs
//! Article records as they flow through one run: raw candidates from feeds,
//! then the single enriched form produced by the relevance enricher.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::category::Category;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawArticle {
    pub category: Category,
    pub title: String,
    pub url: String,
    pub image_url: Option<String>,
    pub source: String,
    /// `None` when the feed omitted the date or it could not be parsed.
    pub published_at: Option<DateTime<Utc>>,
    /// Publisher homepage from the feed's `<source url>`; aggregator links
    /// hide the real host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

impl RawArticle {
    pub fn has_image(&self) -> bool {
        self.image_url
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentStatus {
    Ok,
    Failed,
    /// AI capability disabled for this run; nothing was attempted.
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnrichedArticle {
    #[serde(flatten)]
    pub article: RawArticle,
    pub summary: String,
    /// Always within 0..=100.
    pub relevance_score: u8,
    pub relevance_explanation: String,
    pub enrichment_status: EnrichmentStatus,
}

impl EnrichedArticle {
    /// Deterministic fallback for an article whose enrichment could not be used.
    pub fn failed(article: RawArticle) -> Self {
        Self {
            article,
            summary: String::new(),
            relevance_score: 0,
            relevance_explanation: String::new(),
            enrichment_status: EnrichmentStatus::Failed,
        }
    }

    pub fn skipped(article: RawArticle) -> Self {
        Self {
            enrichment_status: EnrichmentStatus::Skipped,
            ..Self::failed(article)
        }
    }

    pub fn url(&self) -> &str {
        &self.article.url
    }

    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.article.published_at
    }

    pub fn is_failed(&self) -> bool {
        self.enrichment_status == EnrichmentStatus::Failed
    }
}
