//! The accumulated item history.
//!
//! Items from every feed funnel into one [`ItemHistory`], deduplicated on
//! `(feed_url, guid)` and kept sorted newest-first. The collection is
//! append-only: an admitted item is immutable and never removed, so the
//! renderer can treat any prefix it has already archived as stable.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;

/// A single feed entry.
///
/// Identity is `(feed_url, guid)`; the parser guarantees a non-empty guid
/// (falling back to the entry link, then a content hash).
#[derive(Debug, Clone, Serialize)]
pub struct Item {
    pub feed_url: String,
    pub guid: String,
    pub title: String,
    pub link: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub summary: Option<String>,
}

/// Ordered, deduplicated sequence of items across all feeds.
///
/// Ordering: `published_at` descending, items without a timestamp last,
/// ties resolved by insertion order (the sort is stable and new items are
/// appended before sorting).
#[derive(Default)]
pub struct ItemHistory {
    items: Vec<Item>,
    seen: HashSet<(String, String)>,
}

impl ItemHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges a batch of fetched items, returning how many were actually new.
    ///
    /// Re-merging a previously seen `(feed_url, guid)` is a no-op, so
    /// re-fetching an unchanged feed leaves the history untouched.
    pub fn merge(&mut self, batch: Vec<Item>) -> usize {
        let mut inserted = 0;
        for item in batch {
            let key = (item.feed_url.clone(), item.guid.clone());
            if self.seen.insert(key) {
                self.items.push(item);
                inserted += 1;
            }
        }
        if inserted > 0 {
            // Stable: ties and undated items keep insertion order.
            self.items
                .sort_by(|a, b| b.published_at.cmp(&a.published_at));
        }
        inserted
    }

    /// All items, newest first.
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
