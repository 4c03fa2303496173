use std::collections::BTreeMap;

use serde::Serialize;

/// One role rating for a hero. `score` is the width of the star indicator in
/// the header that preceded the hero link, not a number printed on the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RatingEntry {
    pub category: String,
    pub score: i32,
}

impl RatingEntry {
    pub fn new(category: impl Into<String>, score: i32) -> Self {
        Self {
            category: category.into(),
            score,
        }
    }
}

/// Hero name → ratings in table-scan order. Keys iterate lexicographically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RatingTable {
    heroes: BTreeMap<String, Vec<RatingEntry>>,
}

impl RatingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry for `name`, creating the hero on first sight.
    /// Blank names are ignored.
    pub fn record(&mut self, name: &str, entry: RatingEntry) {
        if name.is_empty() {
            return;
        }
        self.heroes.entry(name.to_string()).or_default().push(entry);
    }

    /// Register a hero with no ratings (only reachable when reading a saved
    /// document with an empty `<Roles/>`).
    pub fn insert_empty(&mut self, name: &str) {
        if !name.is_empty() {
            self.heroes.entry(name.to_string()).or_default();
        }
    }

    pub fn get(&self, name: &str) -> Option<&[RatingEntry]> {
        self.heroes.get(name).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.heroes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heroes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[RatingEntry])> {
        self.heroes.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Stable sort of every hero's entries by descending score. Ties keep
    /// scan order.
    pub fn sort_by_score(&mut self) {
        for entries in self.heroes.values_mut() {
            entries.sort_by(|a, b| b.score.cmp(&a.score));
        }
    }

    pub fn entry_count(&self) -> usize {
        self.heroes.values().map(Vec::len).sum()
    }
}
