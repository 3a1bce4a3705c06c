// src/category.rs
//! The four fixed newsletter sections and their default Google News queries.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the fixed news-topic buckets. Declaration order is digest order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    GreaterDandenong,
    SurroundingCouncils,
    StateFederal,
    Industry,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::GreaterDandenong,
        Category::SurroundingCouncils,
        Category::StateFederal,
        Category::Industry,
    ];

    /// Section heading used in logs and rendered output.
    pub fn label(self) -> &'static str {
        match self {
            Category::GreaterDandenong => "Greater Dandenong News",
            Category::SurroundingCouncils => "Surrounding Councils",
            Category::StateFederal => "State & Federal Announcements",
            Category::Industry => "Industry News",
        }
    }

    /// Stable key used in config files (`[categories.<key>]`).
    pub fn key(self) -> &'static str {
        match self {
            Category::GreaterDandenong => "greater_dandenong",
            Category::SurroundingCouncils => "surrounding_councils",
            Category::StateFederal => "state_federal",
            Category::Industry => "industry",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.key().eq_ignore_ascii_case(key.trim()))
    }

    /// Search expressions used when the config does not override them.
    pub fn default_queries(self) -> Vec<String> {
        let q = match self {
            Category::GreaterDandenong => {
                r#""Greater Dandenong" OR "City of Greater Dandenong" -weather -forecast -temperature when:3d"#
            }
            Category::SurroundingCouncils => {
                "(casey OR kingston OR monash OR frankston) -weather -forecast when:3d"
            }
            Category::StateFederal => {
                r#""Victorian Government" "local council" OR "Victorian Premier" "Greater Dandenong" -weather -temperature when:3d"#
            }
            Category::Industry => {
                r#""local government" "Victoria" OR "council innovation" OR "municipal development" -weather -forecast when:3d"#
            }
        };
        vec![q.to_string()]
    }

    /// Domains never accepted for this section on top of the global list.
    pub fn default_excluded_domains(self) -> Vec<String> {
        match self {
            // The council's own site is already known to readers.
            Category::GreaterDandenong => vec!["greaterdandenong.vic.gov.au".to_string()],
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_round_trip_and_order_is_fixed() {
        for c in Category::ALL {
            assert_eq!(Category::from_key(c.key()), Some(c));
        }
        assert_eq!(Category::from_key(" INDUSTRY "), Some(Category::Industry));
        assert_eq!(Category::from_key("sports"), None);
        assert!(Category::GreaterDandenong < Category::Industry);
    }

    #[test]
    fn every_category_has_a_query() {
        for c in Category::ALL {
            assert!(!c.default_queries()[0].trim().is_empty());
        }
    }
}
