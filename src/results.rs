//! Aggregated unsupported-call statistics
//!
//! Values are kept with duplicates; sorting happens on merge and on
//! display so the rendered report does not depend on insertion order.

use std::collections::BTreeMap;
use std::fmt::Write;

use crate::classify::{Category, Classification};

/// Unsupported subcategories seen, grouped by category
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Results {
    unsupported: BTreeMap<Category, Vec<u32>>,
}

impl Results {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one unsupported call
    pub fn add(&mut self, c: &Classification) {
        self.unsupported
            .entry(c.category)
            .or_default()
            .push(c.subcategory);
    }

    /// Fold another aggregate into this one; `None` is a no-op
    pub fn merge<'a>(&mut self, other: impl Into<Option<&'a Results>>) {
        let Some(other) = other.into() else {
            return;
        };
        for (category, subs) in &other.unsupported {
            if subs.is_empty() {
                continue;
            }
            let dest = self.unsupported.entry(*category).or_default();
            dest.extend_from_slice(subs);
            dest.sort_unstable();
        }
    }

    pub fn has_unsupported(&self) -> bool {
        self.unsupported.values().any(|subs| !subs.is_empty())
    }

    /// Unsupported subcategories for one category, sorted
    pub fn unsupported(&self, category: Category) -> Vec<u32> {
        let mut subs = self
            .unsupported
            .get(&category)
            .cloned()
            .unwrap_or_default();
        subs.sort_unstable();
        subs
    }

    /// Number of unsupported calls recorded
    pub fn total(&self) -> usize {
        self.unsupported.values().map(Vec::len).sum()
    }

    /// Text report: category name, then one indented hex value per line
    pub fn render(&self) -> String {
        let mut out = String::new();
        for category in Category::ALL {
            let subs = self.unsupported(category);
            if subs.is_empty() {
                continue;
            }
            let _ = writeln!(out, "{}:", category);
            for sub in subs {
                let _ = writeln!(out, "\t{:#x}", sub);
            }
        }
        out
    }
}
