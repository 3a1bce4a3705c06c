// src/notify/mod.rs
//! Delivery of a rendered digest to a recipient list.

pub mod email;

use serde::Serialize;

use crate::render::RenderedDigest;

/// What happened for one recipient. A failed address never blocks the others.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryOutcome {
    pub recipient: String,
    pub delivered: bool,
    pub error: Option<String>,
}

impl DeliveryOutcome {
    pub fn ok(recipient: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            delivered: true,
            error: None,
        }
    }

    pub fn failed(recipient: impl Into<String>, error: impl ToString) -> Self {
        Self {
            recipient: recipient.into(),
            delivered: false,
            error: Some(error.to_string()),
        }
    }
}

#[async_trait::async_trait]
pub trait Delivery: Send + Sync {
    async fn deliver(&self, doc: &RenderedDigest, recipients: &[String]) -> Vec<DeliveryOutcome>;

    fn name(&self) -> &'static str;
}

/// Comma separated list → trimmed, de-duplicated addresses (order kept).
pub fn parse_recipients(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for addr in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !out.iter().any(|a| a.eq_ignore_ascii_case(addr)) {
            out.push(addr.to_string());
        }
    }
    out
}
