// src/metrics.rs
//! Run counters. A one-shot job has no scrape endpoint, so the binary can
//! dump the Prometheus exposition to a file for a textfile collector.

use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::path::Path;

pub const ENV_METRICS_PATH: &str = "DIGEST_METRICS_PATH";

/// One-time metrics registration (so series show up in the exposition).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "digest_articles_fetched_total",
            "Raw candidates returned by feed sources."
        );
        describe_counter!(
            "digest_articles_dropped_total",
            "Candidates removed during normalization, labelled by reason."
        );
        describe_counter!(
            "digest_source_errors_total",
            "Feed queries that failed or timed out."
        );
        describe_counter!(
            "digest_enrich_failed_total",
            "Articles whose AI enrichment failed."
        );
        describe_counter!(
            "digest_articles_selected_total",
            "Articles placed in category buckets."
        );
        describe_gauge!("digest_last_run_ts", "Unix ts when the pipeline last ran.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder.
    pub fn init() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        ensure_metrics_described();
        Ok(Self { handle })
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.handle.render())
            .with_context(|| format!("writing metrics to {}", path.display()))
    }
}
