// src/enrich/mod.rs
//! Relevance enrichment: one AI call per article, validated against a strict
//! schema before anything is attached to the article.
//!
//! - Valid payload → `Ok` with summary, score and explanation.
//! - Call error / timeout / schema mismatch → `Failed`, empty fields, score 0.
//! - Non-JSON payload whose fields can still be read line by line → `Failed`
//!   carrying the salvaged score (the fallback scoring path).
//! - Disabled capability → `Skipped`, no call made.

pub mod ai_adapter;

use once_cell::sync::OnceCell;
use regex::Regex;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::article::{EnrichedArticle, EnrichmentStatus, RawArticle};
use crate::enrich::ai_adapter::{ArticleContext, DynAiCapability};
use crate::error::AiCallFailed;

/// Two sentences are requested; anything past this bound is rejected.
pub const MAX_SUMMARY_SENTENCES: usize = 4;

/// Validated AI output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiVerdict {
    pub summary: String,
    pub relevance_score: u8,
    pub relevance_explanation: String,
    pub main_image_url: Option<String>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("payload is not JSON: {0}")]
    NotJson(String),
    #[error("payload is not a JSON object")]
    NotObject,
    #[error("missing or non-string field `{0}`")]
    MissingField(&'static str),
    #[error("relevance_score is not an integer: {0}")]
    BadScore(String),
    #[error("summary is empty")]
    EmptySummary,
    #[error("summary has {0} sentences")]
    TooManySentences(usize),
}

/// Result of one enrichment attempt; `failure` is set whenever status is `Failed`.
#[derive(Debug, Clone)]
pub struct EnrichOutcome {
    pub article: EnrichedArticle,
    pub failure: Option<String>,
}

pub fn build_prompt(locality: &str, article: &RawArticle) -> String {
    let prompt = serde_json::json!({
        "article_title": article.title,
        "article_url": article.url,
        "article_source": article.source,
        "instruction": format!(
            "Generate a concise two-sentence summary of this article, then evaluate its relevance to {locality}. \
             Provide a numerical relevance score between 0 and 100 and a brief explanation of the relevance. \
             If you can find the url of the main image in the article, return it as the key \"main_image_url\". \
             Return your response as a JSON object with the keys \"summary\", \"relevance_score\", and \"relevance\"."
        ),
    });
    prompt.to_string()
}

/// Cut the payload out of a reply: the ```json (or bare ```) block wherever
/// it sits, up to the last fence; otherwise the whole trimmed text.
pub fn strip_fences(raw: &str) -> &str {
    let s = raw.trim();
    let (start, tag) = match s.find("```json") {
        Some(i) => (i, "```json".len()),
        None => match s.find("```") {
            Some(i) => (i, 3),
            None => return s.strip_prefix("json").map_or(s, str::trim),
        },
    };
    let body = &s[start + tag..];
    let body = match body.rfind("```") {
        Some(end) => &body[..end],
        None => body,
    };
    body.trim()
}

pub fn count_sentences(text: &str) -> usize {
    static RE_END: OnceCell<Regex> = OnceCell::new();
    let re = RE_END.get_or_init(|| Regex::new(r"[.!?]+(\s+|$)").unwrap());
    re.split(text.trim())
        .filter(|part| !part.trim().is_empty())
        .count()
}

fn parse_score(v: &Value) -> Result<u8, PayloadError> {
    let as_int = match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    as_int
        .map(|i| i.clamp(0, 100) as u8)
        .ok_or_else(|| PayloadError::BadScore(v.to_string()))
}

fn string_field<'a>(obj: &'a serde_json::Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str))
        .map(str::trim)
}

fn http_url(s: &str) -> Option<String> {
    let u = url::Url::parse(s.trim()).ok()?;
    matches!(u.scheme(), "http" | "https").then(|| u.to_string())
}

/// Validate an untrusted completion against the expected schema.
pub fn validate_payload(raw: &str) -> Result<AiVerdict, PayloadError> {
    let value: Value =
        serde_json::from_str(strip_fences(raw)).map_err(|e| PayloadError::NotJson(e.to_string()))?;
    let obj = value.as_object().ok_or(PayloadError::NotObject)?;

    let summary = string_field(obj, &["summary"]).ok_or(PayloadError::MissingField("summary"))?;
    if summary.is_empty() {
        return Err(PayloadError::EmptySummary);
    }
    let sentences = count_sentences(summary);
    if sentences > MAX_SUMMARY_SENTENCES {
        return Err(PayloadError::TooManySentences(sentences));
    }

    let score = obj
        .get("relevance_score")
        .ok_or(PayloadError::MissingField("relevance_score"))
        .and_then(parse_score)?;

    let explanation = string_field(obj, &["relevance_explanation", "relevance"])
        .ok_or(PayloadError::MissingField("relevance"))?;

    Ok(AiVerdict {
        summary: summary.to_string(),
        relevance_score: score,
        relevance_explanation: explanation.to_string(),
        main_image_url: string_field(obj, &["main_image_url"]).and_then(http_url),
    })
}

/// Key-by-key extraction for payloads that are almost-JSON (truncated,
/// trailing commas, no braces). Returns `None` unless a score could be read.
pub fn salvage_payload(raw: &str) -> Option<AiVerdict> {
    static RE_FIELD: OnceCell<Regex> = OnceCell::new();
    let re = RE_FIELD.get_or_init(|| {
        Regex::new(
            r#""(summary|relevance_score|relevance_explanation|relevance)"\s*:\s*("(?:[^"\\]|\\.)*"|-?\d+)"#,
        )
        .unwrap()
    });

    let mut summary = String::new();
    let mut explanation = String::new();
    let mut score = None;
    for caps in re.captures_iter(strip_fences(raw)) {
        let value = &caps[2];
        let text = || {
            serde_json::from_str::<String>(value)
                .unwrap_or_else(|_| value.trim_matches('"').to_string())
                .trim()
                .to_string()
        };
        match &caps[1] {
            "summary" => summary = text(),
            "relevance_score" => {
                score = text().parse::<i64>().ok().map(|i| i.clamp(0, 100) as u8);
            }
            _ => explanation = text(),
        }
    }
    score.map(|relevance_score| AiVerdict {
        summary,
        relevance_score,
        relevance_explanation: explanation,
        main_image_url: None,
    })
}

pub struct RelevanceEnricher {
    capability: DynAiCapability,
    locality: String,
    timeout: Duration,
}

impl RelevanceEnricher {
    pub fn new(capability: DynAiCapability, locality: impl Into<String>, timeout: Duration) -> Self {
        Self {
            capability,
            locality: locality.into(),
            timeout,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.capability.is_enabled()
    }

    /// Exactly one capability call. Never drops the article.
    pub async fn enrich(&self, article: RawArticle) -> EnrichOutcome {
        if !self.capability.is_enabled() {
            return EnrichOutcome {
                article: EnrichedArticle::skipped(article),
                failure: None,
            };
        }

        let prompt = build_prompt(&self.locality, &article);
        let context = ArticleContext {
            category: article.category,
            title: article.title.clone(),
            url: article.url.clone(),
            source: article.source.clone(),
        };

        let call = tokio::time::timeout(self.timeout, self.capability.complete(&prompt, &context)).await;
        let raw = match call {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => return Self::failed(article, e.to_string()),
            Err(_) => return Self::failed(article, AiCallFailed::Timeout(self.timeout).to_string()),
        };

        match validate_payload(&raw) {
            Ok(verdict) => {
                debug!(target: "enrich", url = %article.url, score = verdict.relevance_score, "enriched");
                EnrichOutcome {
                    article: Self::apply(article, verdict, EnrichmentStatus::Ok),
                    failure: None,
                }
            }
            Err(err @ PayloadError::NotJson(_)) => match salvage_payload(&raw) {
                Some(verdict) => {
                    warn!(target: "enrich", url = %article.url, score = verdict.relevance_score, "salvaged non-JSON AI payload");
                    EnrichOutcome {
                        article: Self::apply(article, verdict, EnrichmentStatus::Failed),
                        failure: Some(format!("{err} (salvaged)")),
                    }
                }
                None => Self::failed(article, err.to_string()),
            },
            Err(err) => Self::failed(article, err.to_string()),
        }
    }

    fn apply(mut article: RawArticle, v: AiVerdict, status: EnrichmentStatus) -> EnrichedArticle {
        if !article.has_image() {
            if let Some(img) = v.main_image_url {
                article.image_url = Some(img);
            }
        }
        EnrichedArticle {
            article,
            summary: v.summary,
            relevance_score: v.relevance_score,
            relevance_explanation: v.relevance_explanation,
            enrichment_status: status,
        }
    }

    fn failed(article: RawArticle, reason: String) -> EnrichOutcome {
        warn!(target: "enrich", url = %article.url, %reason, "enrichment failed");
        EnrichOutcome {
            article: EnrichedArticle::failed(article),
            failure: Some(reason),
        }
    }
}
