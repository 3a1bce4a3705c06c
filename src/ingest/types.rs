// src/ingest/types.rs
use std::sync::Arc;

use crate::article::RawArticle;
use crate::category::Category;
use crate::error::SourceError;

/// Search parameters for one feed query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    pub query: String,
    /// Upper bound on entries taken from the feed.
    pub max_items: usize,
}

impl QuerySpec {
    pub fn new(query: impl Into<String>, max_items: usize) -> Self {
        Self {
            query: query.into(),
            max_items,
        }
    }
}

/// Network side of a feed query. Implementations own the HTTP/XML details.
#[async_trait::async_trait]
pub trait FeedTransport: Send + Sync {
    async fn query(&self, category: Category, spec: &QuerySpec)
        -> Result<Vec<RawArticle>, SourceError>;
    fn name(&self) -> &'static str;
}

pub type DynTransport = Arc<dyn FeedTransport>;

/// One feed query bound to its category. Consumed by `fetch`: a source is
/// read exactly once per run.
pub struct ArticleSource {
    transport: DynTransport,
    category: Category,
    spec: QuerySpec,
}

impl std::fmt::Debug for ArticleSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArticleSource")
            .field("transport", &self.transport.name())
            .field("category", &self.category)
            .field("spec", &self.spec)
            .finish()
    }
}

impl ArticleSource {
    pub fn new(
        transport: DynTransport,
        category: Category,
        spec: QuerySpec,
    ) -> Result<Self, SourceError> {
        if spec.query.trim().is_empty() {
            return Err(SourceError::EmptyQuery(category));
        }
        Ok(Self {
            transport,
            category,
            spec,
        })
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn query(&self) -> &str {
        &self.spec.query
    }

    /// Run the query and hand back its articles as a single-pass iterator.
    pub async fn fetch(self) -> Result<impl Iterator<Item = RawArticle>, SourceError> {
        let mut items = self.transport.query(self.category, &self.spec).await?;
        items.truncate(self.spec.max_items);
        let category = self.category;
        Ok(items.into_iter().map(move |mut a| {
            // a transport cannot reassign an article to another section
            a.category = category;
            a
        }))
    }
}
