//! Which classified calls the compatibility layer accepts
//!
//! The accepted `(category, subcategory)` pairs come from outside (a TOML
//! file, or nothing at all). A few control and alloc cases are decided
//! without consulting that table.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::classify::{Category, Classification};
use crate::nvgpu::{NV2081_BINAPI, NV_ERR_INVALID_CLASS, RM_GSS_LEGACY_MASK};

/// Accepted subcategories per category
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupportedSet {
    sets: HashMap<Category, HashSet<u32>>,
}

/// On-disk form, e.g.
///
/// ```toml
/// frontend = [0x27, 0x2a]
/// control = [0x20800101]
/// alloc = [0x0041, 0xc86f]
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SupportedFile {
    #[serde(default)]
    frontend: Vec<u32>,
    #[serde(default)]
    uvm: Vec<u32>,
    #[serde(default)]
    control: Vec<u32>,
    #[serde(default)]
    alloc: Vec<u32>,
    #[serde(default)]
    unknown: Vec<u32>,
}

impl SupportedSet {
    /// Nothing supported; only the hard-coded exceptions pass
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, category: Category, subcategory: u32) -> bool {
        self.sets.entry(category).or_default().insert(subcategory)
    }

    pub fn contains(&self, category: Category, subcategory: u32) -> bool {
        self.sets
            .get(&category)
            .is_some_and(|set| set.contains(&subcategory))
    }

    /// Total number of accepted pairs
    pub fn len(&self) -> usize {
        self.sets.values().map(HashSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let file: SupportedFile = toml::from_str(text).context("Invalid supported-set TOML")?;
        let mut set = Self::empty();
        for (category, values) in [
            (Category::Frontend, file.frontend),
            (Category::Uvm, file.uvm),
            (Category::Control, file.control),
            (Category::Alloc, file.alloc),
            (Category::Unknown, file.unknown),
        ] {
            for value in values {
                set.insert(category, value);
            }
        }
        Ok(set)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read supported set {}", path.display()))?;
        Self::from_toml_str(&text)
            .with_context(|| format!("Failed to parse supported set {}", path.display()))
    }
}

/// Decide whether a classified call is supported.
///
/// First matching rule wins:
/// 1. legacy control commands pass through
/// 2. `NV2081_BINAPI` control commands pass through
/// 3. allocs the driver rejected with `NV_ERR_INVALID_CLASS` are unsupported
/// 4. otherwise look the pair up in `supported`
pub fn is_supported(c: &Classification, supported: &SupportedSet) -> bool {
    match c.category {
        Category::Control if c.subcategory & RM_GSS_LEGACY_MASK != 0 => true,
        Category::Control if (c.subcategory >> 16) & 0xffff == NV2081_BINAPI => true,
        Category::Alloc if c.status == NV_ERR_INVALID_CLASS => false,
        category => supported.contains(category, c.subcategory),
    }
}
