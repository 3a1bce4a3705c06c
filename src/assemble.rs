// src/assemble.rs
//! Per-category selection: acceptance filter, ranking, quota.
//!
//! Ranking key (all descending except url):
//! 1. non-failed before failed,
//! 2. relevance_score,
//! 3. published_at (newer first),
//! 4. url ascending.
//!
//! The bucket never exceeds `max_count`; when fewer than `min_count` articles
//! qualify it returns what there is and flags `underfilled`.

use serde::Serialize;
use std::cmp::Ordering;

use crate::article::EnrichedArticle;
use crate::category::Category;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CategoryBucket {
    pub category: Category,
    pub articles: Vec<EnrichedArticle>,
    pub underfilled: bool,
}

impl CategoryBucket {
    pub fn empty(category: Category) -> Self {
        Self {
            category,
            articles: Vec::new(),
            underfilled: true,
        }
    }

    pub fn len(&self) -> usize {
        self.articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }
}

/// Failed articles qualify only through a salvaged score at or above the threshold.
pub fn qualifies(article: &EnrichedArticle, acceptance_threshold: u8) -> bool {
    !(article.is_failed() && article.relevance_score < acceptance_threshold)
}

pub fn rank_order(a: &EnrichedArticle, b: &EnrichedArticle) -> Ordering {
    a.is_failed()
        .cmp(&b.is_failed())
        .then_with(|| b.relevance_score.cmp(&a.relevance_score))
        .then_with(|| b.published_at().cmp(&a.published_at()))
        .then_with(|| a.url().cmp(b.url()))
}

pub fn assemble(
    category: Category,
    enriched: impl IntoIterator<Item = EnrichedArticle>,
    min_count: usize,
    max_count: usize,
    acceptance_threshold: u8,
) -> CategoryBucket {
    let mut articles: Vec<EnrichedArticle> = enriched
        .into_iter()
        .filter(|a| a.article.category == category)
        .filter(|a| qualifies(a, acceptance_threshold))
        .collect();
    articles.sort_by(rank_order);
    articles.truncate(max_count);

    let underfilled = articles.len() < min_count;
    if underfilled {
        tracing::info!(
            target: "pipeline",
            %category,
            selected = articles.len(),
            min_count,
            "category underfilled"
        );
    }

    CategoryBucket {
        category,
        articles,
        underfilled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::{EnrichmentStatus, RawArticle};
    use chrono::{Duration, TimeZone, Utc};

    fn enriched(url: &str, score: u8, status: EnrichmentStatus) -> EnrichedArticle {
        EnrichedArticle {
            article: RawArticle {
                category: Category::Industry,
                title: url.to_string(),
                url: url.to_string(),
                image_url: None,
                source: "Test".into(),
                published_at: Some(Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap()),
                source_url: None,
            },
            summary: "s".into(),
            relevance_score: score,
            relevance_explanation: "e".into(),
            enrichment_status: status,
        }
    }

    #[test]
    fn failed_zero_score_is_excluded_but_salvaged_ranks_last() {
        let items = vec![
            enriched("https://a/1", 0, EnrichmentStatus::Failed),
            enriched("https://a/2", 90, EnrichmentStatus::Failed),
            enriched("https://a/3", 10, EnrichmentStatus::Ok),
        ];
        let b = assemble(Category::Industry, items, 1, 5, 1);
        let urls: Vec<_> = b.articles.iter().map(|a| a.url()).collect();
        assert_eq!(urls, vec!["https://a/3", "https://a/2"]);
        assert!(!b.underfilled);
    }

    #[test]
    fn quota_caps_and_flags() {
        let items: Vec<_> = (0..8)
            .map(|i| enriched(&format!("https://a/{i}"), 50, EnrichmentStatus::Ok))
            .collect();
        let b = assemble(Category::Industry, items.clone(), 3, 5, 1);
        assert_eq!(b.len(), 5);
        assert!(!b.underfilled);

        let b = assemble(Category::Industry, items.into_iter().take(2), 3, 5, 1);
        assert_eq!(b.len(), 2);
        assert!(b.underfilled);
    }

    #[test]
    fn url_breaks_full_ties() {
        let items = vec![
            enriched("https://b/x", 70, EnrichmentStatus::Ok),
            enriched("https://a/x", 70, EnrichmentStatus::Ok),
        ];
        let b = assemble(Category::Industry, items, 0, 5, 1);
        assert_eq!(b.articles[0].url(), "https://a/x");
    }

    #[test]
    fn skipped_articles_rank_by_recency() {
        let mut older = enriched("https://a/old", 0, EnrichmentStatus::Skipped);
        older.article.published_at = older.article.published_at.map(|t| t - Duration::hours(3));
        let newer = enriched("https://a/new", 0, EnrichmentStatus::Skipped);
        let b = assemble(Category::Industry, vec![older, newer], 1, 5, 1);
        assert_eq!(b.articles[0].url(), "https://a/new");
        assert_eq!(b.len(), 2);
    }

    #[test]
    fn other_categories_are_ignored() {
        let mut foreign = enriched("https://a/1", 99, EnrichmentStatus::Ok);
        foreign.article.category = Category::StateFederal;
        let b = assemble(Category::Industry, vec![foreign], 1, 5, 1);
        assert!(b.is_empty());
        assert!(b.underfilled);
    }
}
