use std::collections::HashMap;

use crate::{QualifiedUrl, ResourceUrl};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestEntry {
    /// 1-based discovery position.
    pub position: usize,
    pub url: ResourceUrl,
    pub label: Option<String>,
}

/// Finalized, ordered harvest output. No two entries share an equivalence key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HarvestResult {
    entries: Vec<HarvestEntry>,
}

impl HarvestResult {
    pub fn entries(&self) -> &[HarvestEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<HarvestEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fetch URLs in discovery order.
    pub fn urls(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.url.raw()).collect()
    }
}

/// Merges per-step URL sets by equivalence key, keeping first-seen order and
/// the highest-precedence format of each resource.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DedupAccumulator {
    entries: Vec<HarvestEntry>,
    by_key: HashMap<String, usize>,
    limit: Option<usize>,
}

impl DedupAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    /// Caps the number of distinct entries. Entries past the cap are dropped,
    /// latest discovered first.
    pub fn set_limit(&mut self, limit: Option<usize>) {
        self.limit = limit;
        if let Some(limit) = limit {
            self.truncate(limit);
        }
    }

    /// Keeps the first `len` entries in discovery order.
    pub fn truncate(&mut self, len: usize) {
        if self.entries.len() <= len {
            return;
        }
        for dropped in self.entries.drain(len..) {
            self.by_key.remove(dropped.url.key());
        }
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Merges `items`; returns how many new equivalence keys were added.
    pub fn add<I>(&mut self, items: I) -> usize
    where
        I: IntoIterator<Item = QualifiedUrl>,
    {
        let mut added = 0;
        for QualifiedUrl { url, label } in items {
            if let Some(&idx) = self.by_key.get(url.key()) {
                let entry = &mut self.entries[idx];
                if url.format().outranks(entry.url.format()) {
                    entry.url = url;
                }
                if entry.label.is_none() {
                    entry.label = label;
                }
                continue;
            }
            if self.is_full() {
                continue;
            }
            self.by_key.insert(url.key().to_string(), self.entries.len());
            self.entries.push(HarvestEntry {
                position: self.entries.len() + 1,
                url,
                label,
            });
            added += 1;
        }
        added
    }

    pub fn is_full(&self) -> bool {
        self.limit.is_some_and(|limit| self.entries.len() >= limit)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.url.key())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn finish(self) -> HarvestResult {
        HarvestResult {
            entries: self.entries,
        }
    }
}
