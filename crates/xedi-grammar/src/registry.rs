//! Grammar cache and the version table that picks a grammar for a GS version

use crate::model::{Direction, Grammar};
use dashmap::DashMap;
use std::sync::Arc;

/// Name of the grammar used when no version key matches
pub const BASELINE_GRAMMAR: &str = "baseline";

/// Thread-safe cache of resolved grammars keyed by name
#[derive(Debug, Default)]
pub struct GrammarCache {
    entries: DashMap<String, Arc<Grammar>>,
}

impl GrammarCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<Grammar>> {
        self.entries.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn insert(&self, name: impl Into<String>, grammar: Arc<Grammar>) {
        self.entries.insert(name.into(), grammar);
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

/// Maps version substrings to grammar families
///
/// Keys are checked in order and the first key contained in the GS version
/// string wins, so `004010X098A1` resolves through `4010`.
#[derive(Debug, Clone)]
pub struct VersionTable {
    entries: Vec<(String, String)>,
}

impl Default for VersionTable {
    fn default() -> Self {
        Self::new()
            .with_entry("4010", "x12-004010")
            .with_entry("4020", "x12-004010")
            .with_entry("4030", "x12-004010")
            .with_entry("4050", "x12-004010")
            .with_entry("3070", "x12-003070")
            .with_entry("3072", "x12-003070")
    }
}

impl VersionTable {
    /// Empty table; everything resolves to the baseline grammar
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_entry(mut self, key: impl Into<String>, family: impl Into<String>) -> Self {
        self.entries.push((key.into(), family.into()));
        self
    }

    /// Version keys in lookup order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    /// Key and family matched by `version`, if any
    #[must_use]
    pub fn lookup(&self, version: &str) -> Option<(&str, &str)> {
        self.entries
            .iter()
            .find(|(key, _)| version.contains(key.as_str()))
            .map(|(key, family)| (key.as_str(), family.as_str()))
    }

    /// Grammar family for `version`, falling back to the baseline
    #[must_use]
    pub fn family_for(&self, version: &str) -> &str {
        self.lookup(version)
            .map_or(BASELINE_GRAMMAR, |(_, family)| family)
    }

    /// Name of the direction-specific grammar for `version`
    #[must_use]
    pub fn grammar_name(&self, version: &str, direction: Direction) -> String {
        match self.lookup(version) {
            Some((_, family)) => direction_variant(family, direction),
            None => BASELINE_GRAMMAR.to_string(),
        }
    }
}

/// `family-request` / `family-response`
#[must_use]
pub fn direction_variant(family: &str, direction: Direction) -> String {
    format!("{family}-{direction}")
}
