//! JSON output format for unsupported-call reports
//!
//! `--format json` implementation

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::classify::Category;
use crate::pipeline::RunStats;
use crate::results::Results;

/// Counters from all processed inputs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonStats {
    pub records: u64,
    pub classified: u64,
    pub skipped: u64,
    pub dumped: u64,
}

impl JsonStats {
    pub fn accumulate(&mut self, stats: &RunStats) {
        self.records += stats.records;
        self.classified += stats.classified;
        self.skipped += stats.skipped;
        self.dumped += stats.dumped;
    }
}

/// Complete report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonReport {
    pub has_unsupported: bool,
    /// Sorted subcategories per category, canonical category order
    pub unsupported: BTreeMap<Category, Vec<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<JsonStats>,
}

impl JsonReport {
    pub fn from_results(results: &Results) -> Self {
        let unsupported = Category::ALL
            .into_iter()
            .map(|category| (category, results.unsupported(category)))
            .filter(|(_, subs)| !subs.is_empty())
            .collect();
        Self {
            has_unsupported: results.has_unsupported(),
            unsupported,
            stats: None,
        }
    }

    pub fn with_stats(mut self, stats: JsonStats) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
