// src/ingest/mod.rs
//! Candidate collection and cleanup: title normalization, url canonicalization,
//! domain exclusion, recency window and cross-feed deduplication.

pub mod providers;
pub mod types;

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use url::Url;

use crate::article::RawArticle;

/// Query parameters that only identify a campaign or click, never the story.
const TRACKING_PARAMS: &[&str] = &[
    "fbclid", "gclid", "dclid", "msclkid", "igshid", "mc_cid", "mc_eid", "oc", "ref", "ref_src",
    "cmpid", "_ga", "_hsenc", "_hsmi",
];

fn is_tracking_param(key: &str) -> bool {
    let k = key.to_ascii_lowercase();
    k.starts_with("utm_") || TRACKING_PARAMS.contains(&k.as_str())
}

/// Clean a headline: decode entities, strip tags, fold quotes and whitespace.
/// Unlike body text, trailing punctuation is meaningful in headlines and kept.
pub fn normalize_title(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 5) Length cap: 300 chars
    if out.chars().count() > 300 {
        out = out.chars().take(300).collect();
    }
    out
}

/// Google News appends " - <Source>" to every headline; drop it when it
/// repeats the article's source.
pub fn strip_source_suffix(title: &str, source: &str) -> String {
    let source = source.trim();
    if source.is_empty() {
        return title.to_string();
    }
    match title.rsplit_once(" - ") {
        Some((head, tail)) if tail.trim().eq_ignore_ascii_case(source) && !head.trim().is_empty() => {
            head.trim().to_string()
        }
        _ => title.to_string(),
    }
}

/// Canonical dedup key: http(s) only, lowercase scheme/host, no fragment,
/// no tracking parameters, remaining parameters sorted.
pub fn canonical_url(raw: &str) -> Option<String> {
    let mut u = Url::parse(raw.trim()).ok()?;
    if !matches!(u.scheme(), "http" | "https") {
        return None;
    }
    u.host_str()?;
    u.set_fragment(None);

    let mut kept: Vec<(String, String)> = u
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        u.set_query(None);
    } else {
        kept.sort();
        u.query_pairs_mut().clear().extend_pairs(kept);
    }
    Some(u.to_string())
}

pub fn host_of(url: &str) -> Option<String> {
    let u = Url::parse(url.trim()).ok()?;
    u.host_str()
        .map(|h| h.trim_end_matches('.').to_ascii_lowercase())
}

/// Exact host match or any subdomain of an excluded domain.
pub fn is_excluded_domain(url: &str, excluded: &BTreeSet<String>) -> bool {
    let Some(host) = host_of(url) else {
        return false;
    };
    excluded.iter().any(|d| {
        let d = d.trim().trim_start_matches('.').to_ascii_lowercase();
        !d.is_empty() && (host == d || host.ends_with(&format!(".{d}")))
    })
}

/// Why an article did not survive normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    ExcludedDomain,
    Malformed(String),
    Stale,
    Duplicate,
}

#[derive(Debug, Clone, Default)]
pub struct NormalizeOutcome {
    pub kept: Vec<RawArticle>,
    pub dropped: Vec<(String, DropReason)>,
}

impl NormalizeOutcome {
    pub fn count(&self, pred: impl Fn(&DropReason) -> bool) -> usize {
        self.dropped.iter().filter(|(_, r)| pred(r)).count()
    }

    pub fn excluded_domain(&self) -> usize {
        self.count(|r| *r == DropReason::ExcludedDomain)
    }

    pub fn malformed(&self) -> usize {
        self.count(|r| matches!(r, DropReason::Malformed(_)))
    }

    pub fn stale(&self) -> usize {
        self.count(|r| *r == DropReason::Stale)
    }

    pub fn duplicates(&self) -> usize {
        self.count(|r| *r == DropReason::Duplicate)
    }
}

/// `candidate` replaces `current`: newer wins, ties go to the one with an image.
fn wins_collision(candidate: &RawArticle, current: &RawArticle) -> bool {
    match candidate.published_at.cmp(&current.published_at) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => candidate.has_image() && !current.has_image(),
    }
}

/// Filter and deduplicate raw candidates. Output order follows the first
/// occurrence of each canonical url; no two outputs share one.
pub fn normalize(
    now: DateTime<Utc>,
    raw: impl IntoIterator<Item = RawArticle>,
    excluded_domains: &BTreeSet<String>,
    recency_window: chrono::Duration,
) -> NormalizeOutcome {
    let mut out = NormalizeOutcome::default();
    let mut slots: HashMap<String, usize> = HashMap::new();

    for mut a in raw {
        let label = if a.url.trim().is_empty() {
            a.title.clone()
        } else {
            a.url.clone()
        };

        // 1) Excluded domains, by link host or publisher host
        let by_publisher = a
            .source_url
            .as_deref()
            .is_some_and(|u| is_excluded_domain(u, excluded_domains));
        if by_publisher || is_excluded_domain(&a.url, excluded_domains) {
            out.dropped.push((label, DropReason::ExcludedDomain));
            continue;
        }

        // 2) Missing title / url
        a.source = normalize_title(&a.source);
        a.title = strip_source_suffix(&normalize_title(&a.title), &a.source);
        if a.title.is_empty() {
            out.dropped
                .push((label, DropReason::Malformed("missing title".into())));
            continue;
        }
        let Some(canon) = canonical_url(&a.url) else {
            let why = if a.url.trim().is_empty() {
                "missing url"
            } else {
                "unparsable url"
            };
            out.dropped.push((label, DropReason::Malformed(why.into())));
            continue;
        };
        a.url = canon;
        a.image_url = a
            .image_url
            .take()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        // 3) Recency window (inclusive boundary)
        let Some(published) = a.published_at else {
            out.dropped
                .push((label, DropReason::Malformed("missing or unparsable date".into())));
            continue;
        };
        if now.signed_duration_since(published) > recency_window {
            out.dropped.push((label, DropReason::Stale));
            continue;
        }

        // 4) Dedup by canonical url
        match slots.get(&a.url) {
            Some(&idx) => {
                if wins_collision(&a, &out.kept[idx]) {
                    let loser = std::mem::replace(&mut out.kept[idx], a);
                    out.dropped.push((loser.url, DropReason::Duplicate));
                } else {
                    out.dropped.push((a.url, DropReason::Duplicate));
                }
            }
            None => {
                slots.insert(a.url.clone(), out.kept.len());
                out.kept.push(a);
            }
        }
    }

    out
}
