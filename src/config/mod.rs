// src/config/mod.rs
//! Run configuration: excluded domains, recency window, quotas, timeouts.
//!
//! Resolution order for the TOML file:
//! 1) $DIGEST_CONFIG_PATH (must exist)
//! 2) config/digest.toml
//! 3) built-in defaults
//!
//! `DIGEST_RECENCY_DAYS` and `DIGEST_ACCEPTANCE_THRESHOLD` override the file.

pub mod ai;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::category::Category;

pub const ENV_CONFIG_PATH: &str = "DIGEST_CONFIG_PATH";
pub const ENV_RECENCY_DAYS: &str = "DIGEST_RECENCY_DAYS";
pub const ENV_ACCEPTANCE_THRESHOLD: &str = "DIGEST_ACCEPTANCE_THRESHOLD";
pub const DEFAULT_CONFIG_PATH: &str = "config/digest.toml";

pub const DEFAULT_RECENCY_DAYS: i64 = 7;
/// Upper bound for `recency_days`; larger values are capped.
pub const MAX_RECENCY_DAYS: i64 = 3650;
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_ACCEPTANCE_THRESHOLD: u8 = 1;
pub const DEFAULT_ENRICH_CONCURRENCY: usize = 3;
pub const DEFAULT_MAX_ITEMS_PER_SOURCE: usize = 10;
pub const DEFAULT_MIN_COUNT: usize = 3;
pub const DEFAULT_MAX_COUNT: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryConfig {
    pub min_count: usize,
    pub max_count: usize,
    pub queries: Vec<String>,
    /// Extra exclusions for this section only; the global list always applies.
    pub excluded_domains: Vec<String>,
}

impl CategoryConfig {
    pub fn defaults_for(category: Category) -> Self {
        Self {
            min_count: DEFAULT_MIN_COUNT,
            max_count: DEFAULT_MAX_COUNT,
            queries: category.default_queries(),
            excluded_domains: category.default_excluded_domains(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestConfig {
    /// Place the AI judges relevance against.
    pub locality: String,
    pub excluded_domains: Vec<String>,
    pub recency_days: i64,
    pub call_timeout_secs: u64,
    pub acceptance_threshold: u8,
    pub enrich_concurrency: usize,
    pub max_items_per_source: usize,
    pub categories: BTreeMap<Category, CategoryConfig>,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            locality: "Greater Dandenong".to_string(),
            excluded_domains: vec!["greaterdandenong.vic.gov.au".to_string()],
            recency_days: DEFAULT_RECENCY_DAYS,
            call_timeout_secs: DEFAULT_CALL_TIMEOUT_SECS,
            acceptance_threshold: DEFAULT_ACCEPTANCE_THRESHOLD,
            enrich_concurrency: DEFAULT_ENRICH_CONCURRENCY,
            max_items_per_source: DEFAULT_MAX_ITEMS_PER_SOURCE,
            categories: Category::ALL
                .into_iter()
                .map(|c| (c, CategoryConfig::defaults_for(c)))
                .collect(),
        }
    }
}

// On-disk shape; every field optional so a file only states what it changes.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    locality: Option<String>,
    excluded_domains: Option<Vec<String>>,
    recency_days: Option<i64>,
    call_timeout_secs: Option<u64>,
    acceptance_threshold: Option<i64>,
    enrich_concurrency: Option<usize>,
    max_items_per_source: Option<usize>,
    #[serde(default)]
    categories: BTreeMap<String, FileCategory>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileCategory {
    min_count: Option<usize>,
    max_count: Option<usize>,
    queries: Option<Vec<String>>,
    excluded_domains: Option<Vec<String>>,
}

impl DigestConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let file: FileConfig = toml::from_str(s).context("parsing digest config TOML")?;
        let mut cfg = Self::default();

        if let Some(v) = file.locality {
            cfg.locality = v;
        }
        if let Some(v) = file.excluded_domains {
            cfg.excluded_domains = v;
        }
        if let Some(v) = file.recency_days {
            cfg.recency_days = v;
        }
        if let Some(v) = file.call_timeout_secs {
            cfg.call_timeout_secs = v;
        }
        if let Some(v) = file.acceptance_threshold {
            cfg.acceptance_threshold = clamp_score(v);
        }
        if let Some(v) = file.enrich_concurrency {
            cfg.enrich_concurrency = v;
        }
        if let Some(v) = file.max_items_per_source {
            cfg.max_items_per_source = v;
        }

        for (key, over) in file.categories {
            let category = Category::from_key(&key)
                .ok_or_else(|| anyhow!("unknown category `{key}` in digest config"))?;
            let entry = cfg
                .categories
                .entry(category)
                .or_insert_with(|| CategoryConfig::defaults_for(category));
            if let Some(v) = over.min_count {
                entry.min_count = v;
            }
            if let Some(v) = over.max_count {
                entry.max_count = v;
            }
            if let Some(v) = over.queries {
                entry.queries = v;
            }
            if let Some(v) = over.excluded_domains {
                entry.excluded_domains = v;
            }
        }

        cfg.sanitize();
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading digest config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Env path, then `config/digest.toml`, then defaults; env overrides on top.
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let p = PathBuf::from(DEFAULT_CONFIG_PATH);
            if p.exists() {
                Self::load_from(&p)?
            } else {
                Self::default()
            }
        };
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(days) = parse_env::<i64>(ENV_RECENCY_DAYS) {
            self.recency_days = days;
        }
        if let Some(t) = parse_env::<i64>(ENV_ACCEPTANCE_THRESHOLD) {
            self.acceptance_threshold = clamp_score(t);
        }
        self.sanitize();
    }

    /// Repair values that would make the pipeline misbehave.
    fn sanitize(&mut self) {
        if self.recency_days < 0 {
            self.recency_days = DEFAULT_RECENCY_DAYS;
        } else if self.recency_days > MAX_RECENCY_DAYS {
            tracing::warn!(
                recency_days = self.recency_days,
                cap = MAX_RECENCY_DAYS,
                "recency_days too large, capped"
            );
            self.recency_days = MAX_RECENCY_DAYS;
        }
        if self.call_timeout_secs == 0 {
            self.call_timeout_secs = DEFAULT_CALL_TIMEOUT_SECS;
        }
        self.enrich_concurrency = self.enrich_concurrency.max(1);
        self.excluded_domains = clean_domains(std::mem::take(&mut self.excluded_domains));
        for cat in self.categories.values_mut() {
            if cat.min_count > cat.max_count {
                // swap to keep a valid interval
                std::mem::swap(&mut cat.min_count, &mut cat.max_count);
            }
            cat.max_count = cat.max_count.max(1);
            cat.queries.retain(|q| !q.trim().is_empty());
            cat.excluded_domains = clean_domains(std::mem::take(&mut cat.excluded_domains));
        }
    }

    pub fn recency_window(&self) -> chrono::Duration {
        chrono::Duration::try_days(self.recency_days.clamp(0, MAX_RECENCY_DAYS))
            .unwrap_or_else(|| chrono::Duration::days(DEFAULT_RECENCY_DAYS))
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn category(&self, category: Category) -> CategoryConfig {
        self.categories
            .get(&category)
            .cloned()
            .unwrap_or_else(|| CategoryConfig::defaults_for(category))
    }

    /// Global exclusions plus the section's own.
    pub fn excluded_for(&self, category: Category) -> BTreeSet<String> {
        self.excluded_domains
            .iter()
            .cloned()
            .chain(self.category(category).excluded_domains)
            .collect()
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

fn clamp_score(v: i64) -> u8 {
    v.clamp(0, 100) as u8
}

fn clean_domains(items: Vec<String>) -> Vec<String> {
    let mut set = BTreeSet::new();
    for it in items {
        let t = it.trim().trim_start_matches('.').to_ascii_lowercase();
        if !t.is_empty() {
            set.insert(t);
        }
    }
    set.into_iter().collect()
}
