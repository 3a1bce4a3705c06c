// src/digest.rs
use serde::Serialize;
use std::collections::BTreeMap;

use crate::assemble::CategoryBucket;
use crate::category::Category;

/// Final artifact of a run: one bucket per category, in category order.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Digest {
    buckets: BTreeMap<Category, CategoryBucket>,
}

impl Digest {
    /// Missing categories get an empty, underfilled bucket so the digest
    /// always covers all four.
    pub fn from_buckets(buckets: impl IntoIterator<Item = CategoryBucket>) -> Self {
        let mut map: BTreeMap<Category, CategoryBucket> =
            buckets.into_iter().map(|b| (b.category, b)).collect();
        for c in Category::ALL {
            map.entry(c).or_insert_with(|| CategoryBucket::empty(c));
        }
        Self { buckets: map }
    }

    pub fn bucket(&self, category: Category) -> &CategoryBucket {
        // every category is present by construction
        &self.buckets[&category]
    }

    pub fn buckets(&self) -> impl Iterator<Item = &CategoryBucket> {
        self.buckets.values()
    }

    pub fn total_articles(&self) -> usize {
        self.buckets.values().map(CategoryBucket::len).sum()
    }

    pub fn underfilled(&self) -> Vec<Category> {
        self.buckets
            .values()
            .filter(|b| b.underfilled)
            .map(|b| b.category)
            .collect()
    }
}
