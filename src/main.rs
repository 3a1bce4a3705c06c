//! Digest job: binary entrypoint.
//! Collects, enriches and ranks the week's news, renders the newsletter and
//! hands it to SMTP delivery (or to a file with `--dry-run`).

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dandenong_digest::config::ai::{AiConfig, DEFAULT_AI_CONFIG_PATH};
use dandenong_digest::enrich::ai_adapter::build_capability;
use dandenong_digest::ingest::providers::google_news::GoogleNewsTransport;
use dandenong_digest::metrics::{Metrics, ENV_METRICS_PATH};
use dandenong_digest::notify::email::{EmailDelivery, SmtpSettings};
use dandenong_digest::notify::Delivery;
use dandenong_digest::render::{HtmlRenderer, Renderer, DEFAULT_TITLE};
use dandenong_digest::{DigestConfig, DigestError, Pipeline};

#[derive(Debug, Parser)]
#[command(name = "dandenong-digest", about = "Build and send the Greater Dandenong news digest")]
struct Args {
    /// Digest TOML config (otherwise $DIGEST_CONFIG_PATH or config/digest.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// AI provider JSON config
    #[arg(long, default_value = DEFAULT_AI_CONFIG_PATH)]
    ai_config: PathBuf,

    /// Render only; never send email
    #[arg(long)]
    dry_run: bool,

    /// Write the rendered HTML here
    #[arg(long)]
    out: Option<PathBuf>,
}

/// `DIGEST_LOG_JSON=1` switches to JSON lines (for log shippers).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("dandenong_digest=info,warn"));

    let json = std::env::var("DIGEST_LOG_JSON")
        .ok()
        .is_some_and(|v| v == "1");

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();
    let args = Args::parse();

    let metrics_path = std::env::var(ENV_METRICS_PATH).ok().map(PathBuf::from);
    let metrics = match &metrics_path {
        Some(_) => Some(Metrics::init()?),
        None => None,
    };

    let mut config = match &args.config {
        Some(p) => DigestConfig::load_from(p)?,
        None => DigestConfig::load_default()?,
    };
    if args.config.is_some() {
        config.apply_env_overrides();
    }

    let ai_cfg = AiConfig::load_or_disabled(&args.ai_config)
        .with_context(|| format!("loading AI config from {}", args.ai_config.display()))?;
    info!(
        enabled = ai_cfg.enabled,
        provider = %ai_cfg.provider,
        key_len = ai_cfg.api_key.len(),
        "AI config loaded"
    );
    let capability = build_capability(&ai_cfg)?;
    if !capability.is_enabled() {
        warn!("AI enrichment disabled; articles ranked by recency only");
    }

    let transport = Arc::new(GoogleNewsTransport::new(config.call_timeout())?);
    let pipeline = Pipeline::new(config, transport, capability);

    let cancel = pipeline.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("ctrl-c received, cancelling run");
            cancel.cancel();
        }
    });

    let outcome = pipeline.run().await;

    if let (Some(m), Some(p)) = (&metrics, &metrics_path) {
        if let Err(e) = m.write_to(p) {
            warn!(error = %format!("{e:#}"), "metrics export failed");
        }
    }

    let outcome = match outcome {
        Ok(o) => o,
        Err(DigestError::NoArticles { report }) => {
            error!(issues = ?report.issues, "nothing to send");
            return Err(anyhow::anyhow!("no articles selected in any category"));
        }
        Err(e) => return Err(e.into()),
    };

    for issue in &outcome.report.issues {
        info!(category = %issue.category, kind = ?issue.kind, detail = %issue.detail, "run issue");
    }

    let smtp = if args.dry_run { None } else { Some(SmtpSettings::from_env()?) };
    let subject = smtp
        .as_ref()
        .map(|s| s.subject.clone())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());
    let rendered = HtmlRenderer::new(subject).render(&outcome.digest);

    if let Some(out) = &args.out {
        std::fs::write(out, &rendered.html)
            .with_context(|| format!("writing HTML to {}", out.display()))?;
        info!(path = %out.display(), "rendered digest written");
    }

    let Some(smtp) = smtp else {
        info!(articles = outcome.digest.total_articles(), "dry run, not sending");
        if args.out.is_none() {
            println!("{}", rendered.html);
        }
        return Ok(());
    };

    if smtp.recipients.is_empty() {
        warn!("RECIPIENTS is empty; nothing delivered");
        return Ok(());
    }
    let delivery = EmailDelivery::new(&smtp)?;
    let outcomes = delivery.deliver(&rendered, &smtp.recipients).await;
    let failed = outcomes.iter().filter(|o| !o.delivered).count();
    info!(
        channel = delivery.name(),
        sent = outcomes.len() - failed,
        failed,
        "delivery finished"
    );
    if failed == outcomes.len() {
        anyhow::bail!("delivery failed for every recipient");
    }
    Ok(())
}
