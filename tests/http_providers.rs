// tests/http_providers.rs
// HTTP providers against a local mock server.
use std::time::Duration;

use dandenong_digest::config::ai::AiConfig;
use dandenong_digest::enrich::ai_adapter::{AiCapability, ArticleContext, ChatCompletionsProvider};
use dandenong_digest::ingest::providers::google_news::GoogleNewsTransport;
use dandenong_digest::ingest::types::{FeedTransport, QuerySpec};
use dandenong_digest::{AiCallFailed, Category, SourceError};

fn ai_config() -> AiConfig {
    AiConfig {
        enabled: true,
        provider: "openai".into(),
        api_key: "test-key".into(),
        ..AiConfig::default()
    }
}

fn ctx() -> ArticleContext {
    ArticleContext {
        category: Category::GreaterDandenong,
        title: "Council budget adopted".into(),
        url: "https://news.example/budget".into(),
        source: "Star Journal".into(),
    }
}

#[tokio::test]
async fn chat_completion_content_is_returned_raw() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .match_header("authorization", "Bearer test-key")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "model": "gpt-4o-mini",
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": "  {\"summary\": \"Budget adopted. Rates rise.\", \"relevance_score\": 90, \"relevance\": \"Council decision.\"}  "
                    },
                    "finish_reason": "stop"
                }]
            }"#,
        )
        .create_async()
        .await;

    let provider = ChatCompletionsProvider::openai(&ai_config())
        .unwrap()
        .with_endpoint(server.url());
    assert_eq!(provider.provider_name(), "openai");

    let out = provider.complete("prompt", &ctx()).await.unwrap();
    assert!(out.starts_with('{'));
    assert!(out.contains("\"relevance_score\": 90"));
    mock.assert_async().await;
}

#[tokio::test]
async fn chat_completion_errors_are_typed() {
    let mut server = mockito::Server::new_async().await;
    let _limited = server
        .mock("POST", "/")
        .with_status(429)
        .create_async()
        .await;

    let provider = ChatCompletionsProvider::openai(&ai_config())
        .unwrap()
        .with_endpoint(server.url());
    let err = provider.complete("prompt", &ctx()).await.unwrap_err();
    assert!(matches!(err, AiCallFailed::Status(429)));
}

#[tokio::test]
async fn chat_completion_without_content_is_empty() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("POST", "/")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"choices": [{"message": {"role": "assistant", "content": null}}]}"#)
        .create_async()
        .await;

    let provider = ChatCompletionsProvider::openai(&ai_config())
        .unwrap()
        .with_endpoint(server.url());
    let err = provider.complete("prompt", &ctx()).await.unwrap_err();
    assert!(matches!(err, AiCallFailed::EmptyResponse));
}

const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <item>
      <title>Springvale night market returns - Dandenong Star Journal</title>
      <link>https://news.google.com/rss/articles/CBMi1?oc=5</link>
      <pubDate>Mon, 10 Mar 2025 04:00:00 GMT</pubDate>
      <source url="https://dandenong.starcommunity.com.au">Dandenong Star Journal</source>
    </item>
    <item>
      <title>Noble Park station works finish early - The Age</title>
      <link>https://news.google.com/rss/articles/CBMi2?oc=5</link>
      <pubDate>Mon, 10 Mar 2025 03:00:00 GMT</pubDate>
      <source url="https://www.theage.com.au">The Age</source>
    </item>
    <item>
      <title>Keysborough school expansion - Herald Sun</title>
      <link>https://news.google.com/rss/articles/CBMi3?oc=5</link>
      <pubDate>Mon, 10 Mar 2025 02:00:00 GMT</pubDate>
      <source url="https://www.heraldsun.com.au">Herald Sun</source>
    </item>
  </channel>
</rss>"#;

#[tokio::test]
async fn google_news_feed_is_fetched_and_truncated() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/rss/search")
        .match_query(mockito::Matcher::AllOf(vec![
            mockito::Matcher::UrlEncoded("q".into(), "Greater Dandenong".into()),
            mockito::Matcher::UrlEncoded("ceid".into(), "AU:en".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/rss+xml")
        .with_body(FEED)
        .create_async()
        .await;

    let transport = GoogleNewsTransport::new(Duration::from_secs(5))
        .unwrap()
        .with_base_url(format!("{}/rss/search", server.url()));
    let items = transport
        .query(Category::SurroundingCouncils, &QuerySpec::new("Greater Dandenong", 2))
        .await
        .unwrap();

    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|a| a.category == Category::SurroundingCouncils));
    assert_eq!(items[1].source, "The Age");
    assert_eq!(items[1].source_url.as_deref(), Some("https://www.theage.com.au"));
    mock.assert_async().await;
}

#[tokio::test]
async fn google_news_http_error_is_source_unavailable() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("GET", "/rss/search")
        .match_query(mockito::Matcher::Any)
        .with_status(503)
        .create_async()
        .await;

    let transport = GoogleNewsTransport::new(Duration::from_secs(5))
        .unwrap()
        .with_base_url(format!("{}/rss/search", server.url()));
    let err = transport
        .query(Category::Industry, &QuerySpec::new("council innovation", 10))
        .await
        .unwrap_err();
    match err {
        SourceError::SourceUnavailable { category, reason } => {
            assert_eq!(category, Category::Industry);
            assert!(reason.contains("503"), "{reason}");
        }
        other => panic!("unexpected error: {other}"),
    }
}
