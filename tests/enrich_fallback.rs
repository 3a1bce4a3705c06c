// tests/enrich_fallback.rs
use chrono::Utc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dandenong_digest::enrich::ai_adapter::{
    AiCapability, ArticleContext, CompletionFuture, DisabledCapability, MockCapability,
};
use dandenong_digest::enrich::RelevanceEnricher;
use dandenong_digest::{AiCallFailed, Category, EnrichmentStatus, RawArticle};

fn article(i: usize) -> RawArticle {
    RawArticle {
        category: Category::StateFederal,
        title: format!("Budget item {i}"),
        url: format!("https://gov.example/{i}"),
        image_url: None,
        source: "Gov".into(),
        published_at: Some(Utc::now()),
        source_url: None,
    }
}

/// Third call fails; every other call succeeds.
struct ThirdCallFails(AtomicUsize);

impl AiCapability for ThirdCallFails {
    fn complete<'a>(&'a self, _prompt: &'a str, _ctx: &'a ArticleContext) -> CompletionFuture<'a> {
        let n = self.0.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            if n == 2 {
                Err(AiCallFailed::Transport("connection reset".into()))
            } else {
                Ok(r#"{"summary":"Funding announced. Works start soon.","relevance_score":77,"relevance":"State money for the area.","main_image_url":"https://img.example/x.png"}"#.to_string())
            }
        })
    }

    fn provider_name(&self) -> &'static str {
        "third-call-fails"
    }
}

#[tokio::test]
async fn one_failure_in_five_keeps_all_five() {
    let enricher = RelevanceEnricher::new(
        Arc::new(ThirdCallFails(AtomicUsize::new(0))),
        "Greater Dandenong",
        Duration::from_secs(5),
    );
    let mut outs = Vec::new();
    for i in 0..5 {
        outs.push(enricher.enrich(article(i)).await);
    }

    assert_eq!(outs.len(), 5);
    let failed: Vec<_> = outs
        .iter()
        .filter(|o| o.article.enrichment_status == EnrichmentStatus::Failed)
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].article.relevance_score, 0);
    assert!(failed[0].article.summary.is_empty());
    assert!(failed[0].failure.as_deref().unwrap().contains("connection reset"));

    let ok = &outs[0].article;
    assert_eq!(ok.relevance_score, 77);
    // a missing image is filled from the AI payload
    assert_eq!(ok.article.image_url.as_deref(), Some("https://img.example/x.png"));
}

#[tokio::test]
async fn schema_mismatch_is_a_failure_not_a_guess() {
    let cap = MockCapability {
        fixed: r#"{"summary":"Fine.","relevance_score":"very high","relevance":"x"}"#.into(),
    };
    let enricher = RelevanceEnricher::new(Arc::new(cap), "Greater Dandenong", Duration::from_secs(5));
    let out = enricher.enrich(article(1)).await;
    assert_eq!(out.article.enrichment_status, EnrichmentStatus::Failed);
    assert_eq!(out.article.relevance_score, 0);
}

#[tokio::test]
async fn almost_json_is_salvaged_as_failed_with_score() {
    let cap = MockCapability {
        fixed: "\"summary\": \"Road upgrade.\",\n\"relevance_score\": 55,\n\"relevance\": \"Local road.\"".into(),
    };
    let enricher = RelevanceEnricher::new(Arc::new(cap), "Greater Dandenong", Duration::from_secs(5));
    let out = enricher.enrich(article(1)).await;
    assert_eq!(out.article.enrichment_status, EnrichmentStatus::Failed);
    assert_eq!(out.article.relevance_score, 55);
    assert!(out.failure.is_some());
}

#[tokio::test]
async fn disabled_capability_skips_without_failure() {
    let enricher = RelevanceEnricher::new(Arc::new(DisabledCapability), "Greater Dandenong", Duration::from_secs(5));
    assert!(!enricher.is_enabled());
    let out = enricher.enrich(article(1)).await;
    assert_eq!(out.article.enrichment_status, EnrichmentStatus::Skipped);
    assert!(out.failure.is_none());
}

#[tokio::test]
async fn chatty_reply_with_fenced_json_is_ok() {
    let cap = MockCapability {
        fixed: "Here is the analysis:\n```json\n{\"summary\": \"Noble Park pool reopens. Entry is free in March.\", \"relevance_score\": 80, \"relevance\": \"Council facility.\"}\n```".into(),
    };
    let enricher = RelevanceEnricher::new(Arc::new(cap), "Greater Dandenong", Duration::from_secs(5));
    let out = enricher.enrich(article(1)).await;
    assert_eq!(out.article.enrichment_status, EnrichmentStatus::Ok);
    assert_eq!(out.article.relevance_score, 80);
    assert!(out.failure.is_none());
}
