//! AI adapter: capability abstraction over chat-completion providers.
//! Providers return the raw completion text; validation happens in the enricher.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::config::ai::AiConfig;
use crate::error::AiCallFailed;

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

/// What the capability is told about the article besides the prompt.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ArticleContext {
    pub category: Category,
    pub title: String,
    pub url: String,
    pub source: String,
}

pub type CompletionFuture<'a> =
    Pin<Box<dyn Future<Output = Result<String, AiCallFailed>> + Send + 'a>>;

/// Trait object used by the enricher (and tests).
pub trait AiCapability: Send + Sync {
    /// Run one completion and return the raw, untrusted text.
    fn complete<'a>(&'a self, prompt: &'a str, context: &'a ArticleContext) -> CompletionFuture<'a>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
    /// `false` means no call should be attempted at all.
    fn is_enabled(&self) -> bool {
        true
    }
}

pub type DynAiCapability = Arc<dyn AiCapability>;

/// Factory: build a capability according to config and environment variables.
///
/// * If `AI_TEST_MODE=mock`, returns a deterministic mock capability.
/// * Else if `config.enabled==false` or the key is empty, returns a disabled capability.
/// * Else builds the chat-completions provider for `config.provider`.
pub fn build_capability(config: &AiConfig) -> anyhow::Result<DynAiCapability> {
    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Ok(Arc::new(MockCapability::neutral()));
    }

    if !config.enabled || config.api_key.trim().is_empty() {
        return Ok(Arc::new(DisabledCapability));
    }

    match config.provider.as_str() {
        "openrouter" => Ok(Arc::new(ChatCompletionsProvider::openrouter(config)?)),
        "openai" => Ok(Arc::new(ChatCompletionsProvider::openai(config)?)),
        other => anyhow::bail!("Unsupported AI provider: {other}"),
    }
}

// ------------------------------------------------------------
// Concrete providers
// ------------------------------------------------------------

pub const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI-compatible Chat Completions client (OpenRouter speaks the same API).
pub struct ChatCompletionsProvider {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    name: &'static str,
}

impl ChatCompletionsProvider {
    pub fn openrouter(cfg: &AiConfig) -> anyhow::Result<Self> {
        Self::build(
            cfg,
            OPENROUTER_API_URL,
            "perplexity/llama-3.1-sonar-huge-128k-online",
            "openrouter",
        )
    }

    pub fn openai(cfg: &AiConfig) -> anyhow::Result<Self> {
        Self::build(cfg, OPENAI_API_URL, "gpt-4o-mini", "openai")
    }

    fn build(
        cfg: &AiConfig,
        endpoint: &str,
        default_model: &str,
        name: &'static str,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("dandenong-digest/0.1")
            .connect_timeout(Duration::from_secs(4))
            .build()
            .context("building AI http client")?;
        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone().unwrap_or_else(|| default_model.to_string()),
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature,
            name,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn complete_impl(&self, prompt: &str) -> Result<String, AiCallFailed> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct ResponseFormat {
            #[serde(rename = "type")]
            kind: &'static str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            max_tokens: u32,
            response_format: ResponseFormat,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: Option<String>,
        }

        let req = Req {
            model: &self.model,
            messages: vec![Msg {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| AiCallFailed::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AiCallFailed::Status(status.as_u16()));
        }
        let body: Resp = resp
            .json()
            .await
            .map_err(|e| AiCallFailed::Transport(format!("decoding completion: {e}")))?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(AiCallFailed::EmptyResponse)
    }
}

impl AiCapability for ChatCompletionsProvider {
    fn complete<'a>(&'a self, prompt: &'a str, _context: &'a ArticleContext) -> CompletionFuture<'a> {
        Box::pin(self.complete_impl(prompt))
    }
    fn provider_name(&self) -> &'static str {
        self.name
    }
}

/// Never called; articles are marked skipped instead.
pub struct DisabledCapability;

impl AiCapability for DisabledCapability {
    fn complete<'a>(&'a self, _prompt: &'a str, _context: &'a ArticleContext) -> CompletionFuture<'a> {
        Box::pin(async { Err(AiCallFailed::Disabled) })
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
    fn is_enabled(&self) -> bool {
        false
    }
}

/// Simple mock capability for tests/local runs: always returns `fixed`.
#[derive(Clone)]
pub struct MockCapability {
    pub fixed: String,
}

impl MockCapability {
    pub fn neutral() -> Self {
        Self {
            fixed: serde_json::json!({
                "summary": "Local news item (mock). No AI call was made.",
                "relevance_score": 50,
                "relevance": "Mock relevance explanation."
            })
            .to_string(),
        }
    }
}

impl AiCapability for MockCapability {
    fn complete<'a>(&'a self, _prompt: &'a str, _context: &'a ArticleContext) -> CompletionFuture<'a> {
        let out = self.fixed.clone();
        Box::pin(async move { Ok(out) })
    }
    fn provider_name(&self) -> &'static str {
        "mock"
    }
}
