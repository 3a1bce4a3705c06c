// src/report.rs
//! Structured failure accounting for a run.
//!
//! Every dropped article, failed source, failed enrichment and underfilled
//! section lands here so callers can assert on counts instead of scraping logs.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::category::Category;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// One feed was down or timed out; other sources continued.
    SourceUnavailable,
    /// Missing title/url, unparsable url or date. Filtered, counted.
    MalformedArticle,
    /// The AI call errored, timed out or returned an unusable payload.
    AiCallFailed,
    /// Fewer qualifying articles than `min_count`. Reportable, not an error.
    UnderfilledCategory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub category: Category,
    pub kind: IssueKind,
    pub detail: String,
}

/// Append-only, thread-safe issue accumulator shared by the per-category tasks.
#[derive(Debug, Clone, Default)]
pub struct ReportSink {
    inner: Arc<Mutex<Vec<Issue>>>,
}

impl ReportSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, category: Category, kind: IssueKind, detail: impl Into<String>) {
        self.inner.lock().push(Issue {
            category,
            kind,
            detail: detail.into(),
        });
    }

    pub fn snapshot(&self) -> Vec<Issue> {
        self.inner.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-section counters gathered while the category pipeline runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryStats {
    pub sources_ok: usize,
    pub sources_failed: usize,
    pub fetched: usize,
    pub excluded_domain: usize,
    pub malformed: usize,
    pub stale: usize,
    pub duplicates: usize,
    pub enriched_ok: usize,
    pub enrich_failed: usize,
    pub enrich_skipped: usize,
    pub selected: usize,
    pub underfilled: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub issues: Vec<Issue>,
    pub categories: BTreeMap<Category, CategoryStats>,
}

impl RunReport {
    pub fn count(&self, kind: IssueKind) -> usize {
        self.issues.iter().filter(|i| i.kind == kind).count()
    }

    pub fn count_for(&self, category: Category, kind: IssueKind) -> usize {
        self.issues
            .iter()
            .filter(|i| i.category == category && i.kind == kind)
            .count()
    }

    pub fn total_selected(&self) -> usize {
        self.categories.values().map(|s| s.selected).sum()
    }

    pub fn stats(&self, category: Category) -> Option<&CategoryStats> {
        self.categories.get(&category)
    }
}
