// src/ingest/providers/google_news.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::time::Duration;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};
use url::Url;

use crate::article::RawArticle;
use crate::category::Category;
use crate::error::SourceError;
use crate::ingest::types::{FeedTransport, QuerySpec};

pub const GOOGLE_NEWS_SEARCH_URL: &str = "https://news.google.com/rss/search";
const DEFAULT_SOURCE: &str = "Google News";

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    source: Option<ItemSource>,
    // quick-xml matches on the local name, so this is `<media:content>`.
    #[serde(rename = "content", default)]
    media: Vec<Media>,
    #[serde(rename = "enclosure", default)]
    enclosure: Vec<Media>,
}

#[derive(Debug, Deserialize)]
struct ItemSource {
    #[serde(rename = "@url")]
    url: Option<String>,
    #[serde(rename = "$text")]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Media {
    #[serde(rename = "@url")]
    url: Option<String>,
    #[serde(rename = "@type")]
    kind: Option<String>,
    #[serde(rename = "@medium")]
    medium: Option<String>,
}

impl Media {
    fn image_url(&self) -> Option<&str> {
        let is_image = self
            .kind
            .as_deref()
            .is_some_and(|t| t.starts_with("image/"))
            || self.medium.as_deref() == Some("image");
        if is_image {
            self.url.as_deref().filter(|u| !u.trim().is_empty())
        } else {
            None
        }
    }
}

/// RFC 2822 first (RSS), then RFC 3339 (Atom-style dates some feeds emit).
pub fn parse_pub_date(ts: &str) -> Option<DateTime<Utc>> {
    let ts = ts.trim();
    if let Ok(dt) = DateTime::parse_from_rfc2822(ts) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Some(dt) = OffsetDateTime::parse(ts, &Rfc2822)
        .ok()
        .and_then(|dt| Utc.timestamp_opt(dt.unix_timestamp(), 0).single())
    {
        return Some(dt);
    }
    DateTime::parse_from_rfc3339(ts)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse a Google News RSS document into raw candidates for `category`.
pub fn parse_feed(xml: &str, category: Category) -> Result<Vec<RawArticle>> {
    let rss: Rss = from_str(xml).context("parsing google news rss xml")?;
    let out = rss
        .channel
        .item
        .into_iter()
        .map(|it| {
            let image_url = it
                .media
                .iter()
                .chain(it.enclosure.iter())
                .find_map(Media::image_url)
                .map(str::to_string);
            let (source_name, source_url) = match it.source {
                Some(s) => (s.name, s.url),
                None => (None, None),
            };
            RawArticle {
                category,
                title: it.title.unwrap_or_default(),
                url: it.link.unwrap_or_default(),
                image_url,
                source: source_name
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
                published_at: it.pub_date.as_deref().and_then(parse_pub_date),
                source_url: source_url
                    .map(|u| u.trim().to_string())
                    .filter(|u| !u.is_empty()),
            }
        })
        .collect();
    Ok(out)
}

/// Google News search feed over HTTP.
pub struct GoogleNewsTransport {
    client: reqwest::Client,
    base_url: String,
}

impl GoogleNewsTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("dandenong-digest/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()
            .context("building google news http client")?;
        Ok(Self {
            client,
            base_url: GOOGLE_NEWS_SEARCH_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn search_url(&self, query: &str) -> Result<Url> {
        Url::parse_with_params(
            &self.base_url,
            &[
                ("q", query),
                ("hl", "en-AU"),
                ("gl", "AU"),
                ("ceid", "AU:en"),
                ("output", "rss"),
                ("sort", "date"),
            ],
        )
        .with_context(|| format!("invalid feed base url {}", self.base_url))
    }
}

#[async_trait]
impl FeedTransport for GoogleNewsTransport {
    async fn query(
        &self,
        category: Category,
        spec: &QuerySpec,
    ) -> Result<Vec<RawArticle>, SourceError> {
        let unavailable = |reason: String| SourceError::SourceUnavailable { category, reason };

        let url = self
            .search_url(&spec.query)
            .map_err(|e| unavailable(format!("{e:#}")))?;
        let resp = self.client.get(url).send().await.map_err(|e| {
            tracing::warn!(target: "ingest", error = ?e, %category, "feed http error");
            unavailable(e.to_string())
        })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(unavailable(format!("HTTP {status}")));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| unavailable(format!("reading body: {e}")))?;

        let mut items = parse_feed(&body, category).map_err(|e| unavailable(format!("{e:#}")))?;
        items.truncate(spec.max_items);
        tracing::debug!(target: "ingest", %category, items = items.len(), "feed parsed");
        Ok(items)
    }

    fn name(&self) -> &'static str {
        "google-news"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>"Greater Dandenong" - Google News</title>
    <item>
      <title>Soil mound clean-up goes to VCAT - Dandenong Star Journal</title>
      <link>https://news.google.com/rss/articles/CBMi1?oc=5</link>
      <pubDate>Mon, 10 Mar 2025 04:00:00 GMT</pubDate>
      <source url="https://dandenong.starcommunity.com.au">Dandenong Star Journal</source>
      <media:content url="https://img.example/mound.jpg" type="image/jpeg" />
    </item>
    <item>
      <title>Council budget consultation opens</title>
      <link>https://example.com/budget</link>
      <pubDate>not a date</pubDate>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_items_source_and_image() {
        let items = parse_feed(FEED, Category::GreaterDandenong).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].source, "Dandenong Star Journal");
        assert_eq!(items[0].image_url.as_deref(), Some("https://img.example/mound.jpg"));
        assert_eq!(
            items[0].published_at,
            Some(Utc.with_ymd_and_hms(2025, 3, 10, 4, 0, 0).unwrap())
        );
        assert_eq!(
            items[0].source_url.as_deref(),
            Some("https://dandenong.starcommunity.com.au")
        );
        assert_eq!(items[1].source, "Google News");
        assert_eq!(items[1].source_url, None);
        assert_eq!(items[1].published_at, None);
    }

    #[test]
    fn search_url_encodes_query() {
        let t = GoogleNewsTransport::new(Duration::from_secs(5)).unwrap();
        let u = t.search_url(r#""Greater Dandenong" when:3d"#).unwrap();
        assert!(u.as_str().starts_with(GOOGLE_NEWS_SEARCH_URL));
        assert!(u.as_str().contains("ceid=AU%3Aen"));
        assert_eq!(
            u.query_pairs().find(|(k, _)| k == "q").map(|(_, v)| v.into_owned()),
            Some(r#""Greater Dandenong" when:3d"#.to_string())
        );
    }

    #[test]
    fn parses_both_date_styles() {
        assert!(parse_pub_date("Tue, 11 Mar 2025 09:30:00 +1100").is_some());
        assert!(parse_pub_date("2025-03-11T09:30:00Z").is_some());
        assert!(parse_pub_date("yesterday").is_none());
    }
}
