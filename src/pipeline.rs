// src/pipeline.rs
//! Run orchestration: one independent task per category
//! (fetch → normalize → enrich → assemble), merged into a `Digest` at the end.
//!
//! Nothing but the append-only `ReportSink` is shared between category tasks.
//! A failing source or article never aborts the run; only a run with no
//! selected article anywhere is an error, and cancellation stops everything.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use metrics::{counter, gauge};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::article::{EnrichedArticle, EnrichmentStatus, RawArticle};
use crate::assemble::{assemble, CategoryBucket};
use crate::category::Category;
use crate::config::DigestConfig;
use crate::digest::Digest;
use crate::enrich::ai_adapter::DynAiCapability;
use crate::enrich::{EnrichOutcome, RelevanceEnricher};
use crate::error::{DigestError, SourceError};
use crate::ingest::types::{ArticleSource, DynTransport, QuerySpec};
use crate::ingest::{normalize, DropReason};
use crate::metrics::ensure_metrics_described;
use crate::report::{CategoryStats, IssueKind, ReportSink, RunReport};

/// Explicit per-run context handed to every stage.
#[derive(Clone)]
pub struct PipelineContext {
    pub config: Arc<DigestConfig>,
    pub report: ReportSink,
    pub cancel: CancellationToken,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub digest: Digest,
    pub report: RunReport,
}

pub struct Pipeline {
    config: Arc<DigestConfig>,
    transport: DynTransport,
    enricher: Arc<RelevanceEnricher>,
    cancel: CancellationToken,
}

impl Pipeline {
    pub fn new(config: DigestConfig, transport: DynTransport, capability: DynAiCapability) -> Self {
        let enricher = RelevanceEnricher::new(capability, config.locality.clone(), config.call_timeout());
        Self {
            config: Arc::new(config),
            transport,
            enricher: Arc::new(enricher),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that aborts the run when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &DigestConfig {
        &self.config
    }

    pub async fn run(&self) -> Result<RunOutcome, DigestError> {
        self.run_at(Utc::now()).await
    }

    /// Same as `run` with an explicit clock for the recency window.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<RunOutcome, DigestError> {
        ensure_metrics_described();

        let ctx = PipelineContext {
            config: self.config.clone(),
            report: ReportSink::new(),
            cancel: self.cancel.clone(),
        };

        let mut tasks = JoinSet::new();
        for category in Category::ALL {
            let ctx = ctx.clone();
            let transport = self.transport.clone();
            let enricher = self.enricher.clone();
            tasks.spawn(async move { run_category(ctx, category, transport, enricher, now).await });
        }

        let mut buckets = Vec::with_capacity(Category::ALL.len());
        let mut stats = BTreeMap::new();
        let mut cancelled = false;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok((bucket, s))) => {
                    stats.insert(bucket.category, s);
                    buckets.push(bucket);
                }
                Ok(Err(DigestError::Cancelled)) => {
                    cancelled = true;
                    tasks.abort_all();
                }
                Ok(Err(e)) => error!(target: "pipeline", error = %e, "category pipeline failed"),
                Err(e) if e.is_cancelled() => cancelled = true,
                Err(e) => error!(target: "pipeline", error = %e, "category task panicked"),
            }
        }
        if cancelled || self.cancel.is_cancelled() {
            warn!(target: "pipeline", "run cancelled");
            return Err(DigestError::Cancelled);
        }

        // A category whose task died still shows up, empty and underfilled.
        for category in Category::ALL {
            if !stats.contains_key(&category) {
                ctx.report
                    .record(category, IssueKind::UnderfilledCategory, "no bucket produced");
                stats.insert(
                    category,
                    CategoryStats {
                        underfilled: true,
                        ..CategoryStats::default()
                    },
                );
            }
        }
        let digest = Digest::from_buckets(buckets);
        for (category, s) in &stats {
            info!(
                target: "pipeline",
                %category,
                fetched = s.fetched,
                kept = s.enriched_ok + s.enrich_failed + s.enrich_skipped,
                selected = s.selected,
                "category distribution"
            );
        }

        let report = RunReport {
            issues: ctx.report.snapshot(),
            categories: stats,
        };
        gauge!("digest_last_run_ts").set(now.timestamp() as f64);

        if digest.total_articles() == 0 {
            error!(
                target: "pipeline",
                issues = report.issues.len(),
                "no articles selected in any category"
            );
            return Err(DigestError::NoArticles {
                report: Box::new(report),
            });
        }

        info!(
            target: "pipeline",
            selected = digest.total_articles(),
            underfilled = ?digest.underfilled(),
            issues = report.issues.len(),
            "digest assembled"
        );
        Ok(RunOutcome { digest, report })
    }
}

/// Fetch every configured query for `category`. Failed sources are recorded
/// and skipped.
async fn collect(
    ctx: &PipelineContext,
    category: Category,
    transport: &DynTransport,
    stats: &mut CategoryStats,
) -> Result<Vec<RawArticle>, DigestError> {
    let cfg = ctx.config.category(category);
    let timeout = ctx.config.call_timeout();
    let mut raw = Vec::new();

    if cfg.queries.is_empty() {
        ctx.report
            .record(category, IssueKind::SourceUnavailable, "no sources configured");
    }

    for query in cfg.queries {
        let spec = QuerySpec::new(query, ctx.config.max_items_per_source);
        let fetched = match ArticleSource::new(transport.clone(), category, spec) {
            Ok(source) => {
                tokio::select! {
                    _ = ctx.cancel.cancelled() => return Err(DigestError::Cancelled),
                    r = tokio::time::timeout(timeout, source.fetch()) => {
                        r.unwrap_or(Err(SourceError::Timeout(timeout)))
                    }
                }
            }
            Err(e) => Err(e),
        };
        match fetched {
            Ok(items) => {
                stats.sources_ok += 1;
                raw.extend(items);
            }
            Err(e) => {
                warn!(target: "ingest", %category, error = %e, "source skipped");
                counter!("digest_source_errors_total").increment(1);
                stats.sources_failed += 1;
                ctx.report
                    .record(category, IssueKind::SourceUnavailable, e.to_string());
            }
        }
    }

    stats.fetched = raw.len();
    counter!("digest_articles_fetched_total").increment(raw.len() as u64);
    info!(target: "ingest", %category, fetched = raw.len(), "collected");
    Ok(raw)
}

/// Enrich with at most `enrich_concurrency` calls in flight; output order
/// matches input order. A cancelled call yields nothing.
async fn enrich_all(
    ctx: &PipelineContext,
    category: Category,
    enricher: &Arc<RelevanceEnricher>,
    articles: Vec<RawArticle>,
    stats: &mut CategoryStats,
) -> Result<Vec<EnrichedArticle>, DigestError> {
    let shared = enricher.clone();
    let token = ctx.cancel.clone();
    let outcomes: Vec<Option<EnrichOutcome>> = stream::iter(articles.into_iter().map(move |a| {
        let enricher = shared.clone();
        let cancel = token.clone();
        async move {
            tokio::select! {
                _ = cancel.cancelled() => None,
                o = enricher.enrich(a) => Some(o),
            }
        }
    }))
    .buffered(ctx.config.enrich_concurrency)
    .collect()
    .await;

    if ctx.cancel.is_cancelled() {
        return Err(DigestError::Cancelled);
    }

    let mut enriched = Vec::with_capacity(outcomes.len());
    for outcome in outcomes.into_iter().flatten() {
        match outcome.article.enrichment_status {
            EnrichmentStatus::Ok => stats.enriched_ok += 1,
            EnrichmentStatus::Skipped => stats.enrich_skipped += 1,
            EnrichmentStatus::Failed => {
                stats.enrich_failed += 1;
                counter!("digest_enrich_failed_total").increment(1);
            }
        }
        if let Some(reason) = &outcome.failure {
            ctx.report.record(
                category,
                IssueKind::AiCallFailed,
                format!("{}: {reason}", outcome.article.url()),
            );
        }
        enriched.push(outcome.article);
    }
    Ok(enriched)
}

/// Independent pipeline for one category.
pub async fn run_category(
    ctx: PipelineContext,
    category: Category,
    transport: DynTransport,
    enricher: Arc<RelevanceEnricher>,
    now: DateTime<Utc>,
) -> Result<(CategoryBucket, CategoryStats), DigestError> {
    let mut stats = CategoryStats::default();
    let cat_cfg = ctx.config.category(category);

    // 1) Fetch
    let raw = collect(&ctx, category, &transport, &mut stats).await?;

    // 2) Normalize + dedup
    let excluded = ctx.config.excluded_for(category);
    let normalized = normalize(now, raw, &excluded, ctx.config.recency_window());
    stats.excluded_domain = normalized.excluded_domain();
    stats.malformed = normalized.malformed();
    stats.stale = normalized.stale();
    stats.duplicates = normalized.duplicates();
    for (label, reason) in &normalized.dropped {
        let reason_label = match reason {
            DropReason::ExcludedDomain => "excluded_domain",
            DropReason::Malformed(why) => {
                ctx.report
                    .record(category, IssueKind::MalformedArticle, format!("{label}: {why}"));
                "malformed"
            }
            DropReason::Stale => "stale",
            DropReason::Duplicate => "duplicate",
        };
        counter!("digest_articles_dropped_total", "reason" => reason_label).increment(1);
    }

    // 3) Enrich
    let enriched = enrich_all(&ctx, category, &enricher, normalized.kept, &mut stats).await?;

    // 4) Assemble
    let bucket = assemble(
        category,
        enriched,
        cat_cfg.min_count,
        cat_cfg.max_count,
        ctx.config.acceptance_threshold,
    );
    stats.selected = bucket.len();
    stats.underfilled = bucket.underfilled;
    counter!("digest_articles_selected_total").increment(bucket.len() as u64);
    if bucket.underfilled {
        ctx.report.record(
            category,
            IssueKind::UnderfilledCategory,
            format!("{} of {} articles", bucket.len(), cat_cfg.min_count),
        );
    }

    Ok((bucket, stats))
}
