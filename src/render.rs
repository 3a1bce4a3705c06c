// src/render.rs
//! Digest → distributable document. Everything taken from articles is
//! escaped; feed titles and AI output are untrusted.

use chrono::{Datelike, Utc};
use html_escape::{encode_double_quoted_attribute, encode_text};
use std::fmt::Write as _;

use crate::article::{EnrichedArticle, EnrichmentStatus};
use crate::digest::Digest;

pub const PLACEHOLDER_IMAGE: &str = "https://via.placeholder.com/300x200";
pub const DEFAULT_TITLE: &str = "Greater Dandenong Council Newsletter";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDigest {
    pub subject: String,
    pub html: String,
    pub text: String,
}

pub trait Renderer: Send + Sync {
    fn render(&self, digest: &Digest) -> RenderedDigest;
}

const STYLE: &str = "\
      body { font-family: Arial, sans-serif; margin:0; padding:0; }
      .container { width: 100%; max-width: 600px; margin: auto; }
      .header { background-color: #0c5390; color: white; padding:20px; text-align: center; }
      .section h2 { color: #0c5390; border-bottom: 2px solid #0c5390; padding-bottom: 4px; }
      .article { border-bottom: 1px solid #ccc; padding: 10px 0; }
      .article img { max-width: 100%; height: auto; }
      .footer { background-color: #f2f2f2; color: #888; padding: 10px; text-align: center; font-size:12px; }
";

pub struct HtmlRenderer {
    title: String,
    subject: String,
    year: Option<i32>,
}

impl Default for HtmlRenderer {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            subject: DEFAULT_TITLE.to_string(),
            year: None,
        }
    }
}

impl HtmlRenderer {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            ..Self::default()
        }
    }

    /// Pin the footer year (tests).
    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    fn year(&self) -> i32 {
        self.year.unwrap_or_else(|| Utc::now().year())
    }

    fn article_html(out: &mut String, a: &EnrichedArticle) {
        let image = a.article.image_url.as_deref().unwrap_or(PLACEHOLDER_IMAGE);
        let _ = write!(
            out,
            r#"
        <div class="article">
          <h3>{title}</h3>
          <p><em>{source}</em></p>
          <img src="{image}" alt="Article Image">
"#,
            title = encode_text(&a.article.title),
            source = encode_text(&a.article.source),
            image = encode_double_quoted_attribute(image),
        );
        if a.enrichment_status == EnrichmentStatus::Ok || !a.summary.is_empty() {
            let _ = write!(
                out,
                r#"          <p>{summary}</p>
          <p><strong>Relevance Score:</strong> {score}</p>
          <p>{explanation}</p>
"#,
                summary = encode_text(&a.summary),
                score = a.relevance_score,
                explanation = encode_text(&a.relevance_explanation),
            );
        }
        let _ = write!(
            out,
            r#"          <p><a href="{url}">Read More</a></p>
        </div>
"#,
            url = encode_double_quoted_attribute(a.url()),
        );
    }

    fn html(&self, digest: &Digest) -> String {
        let mut out = String::with_capacity(8 * 1024);
        let _ = write!(
            out,
            r#"<html>
  <head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <style>
{STYLE}    </style>
  </head>
  <body>
    <div class="container">
      <div class="header">
        <h1>{title}</h1>
      </div>
"#,
            title = encode_text(&self.title),
        );

        for bucket in digest.buckets().filter(|b| !b.is_empty()) {
            let _ = write!(
                out,
                "      <div class=\"section\">\n        <h2>{}</h2>\n",
                encode_text(bucket.category.label())
            );
            for a in &bucket.articles {
                Self::article_html(&mut out, a);
            }
            out.push_str("      </div>\n");
        }

        let _ = write!(
            out,
            r#"      <div class="footer">
        <p>&copy; {year} Greater Dandenong Council. All rights reserved.</p>
      </div>
    </div>
  </body>
</html>
"#,
            year = self.year(),
        );
        out
    }

    fn text(&self, digest: &Digest) -> String {
        let mut out = format!("{}\n\n", self.title);
        for bucket in digest.buckets().filter(|b| !b.is_empty()) {
            let _ = writeln!(out, "== {} ==", bucket.category.label());
            for a in &bucket.articles {
                let _ = writeln!(out, "* {} ({})", a.article.title, a.article.source);
                if !a.summary.is_empty() {
                    let _ = writeln!(out, "  {}", a.summary);
                }
                let _ = writeln!(out, "  {}", a.url());
            }
            out.push('\n');
        }
        let _ = writeln!(out, "(c) {} Greater Dandenong Council", self.year());
        out
    }
}

impl Renderer for HtmlRenderer {
    fn render(&self, digest: &Digest) -> RenderedDigest {
        RenderedDigest {
            subject: self.subject.clone(),
            html: self.html(digest),
            text: self.text(digest),
        }
    }
}
