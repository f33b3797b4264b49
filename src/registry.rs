//! The set of subscribed feed sources.
//!
//! Sources are keyed by normalized URL and kept in insertion order. The
//! registry owns all `FeedSource` state: subscription (manual add or OPML
//! import) and the per-cycle bookkeeping of last-fetch timestamps and error
//! strings. Sources are never removed automatically.

use crate::feed::{parse_opml, ImportError};
use crate::util::{normalize_feed_url, FeedUrlError};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// One subscribed feed.
#[derive(Debug, Clone)]
pub struct FeedSource {
    /// Normalized URL, the source's identity.
    pub url: String,
    pub title: String,
    /// When the feed was last fetched successfully.
    pub last_fetched_at: Option<DateTime<Utc>>,
    /// Error from the most recent cycle, cleared on success.
    pub last_error: Option<String>,
}

#[derive(Default)]
pub struct FeedRegistry {
    sources: Vec<FeedSource>,
    by_url: HashMap<String, usize>,
}

impl FeedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to a feed, returning whether it was newly added.
    ///
    /// The URL is normalized first, so spelling variants of a known feed
    /// never create a duplicate entry. Re-adding an existing URL overwrites
    /// the stored title only; fetch state is untouched.
    pub fn add(&mut self, url: &str, title: &str) -> Result<bool, FeedUrlError> {
        let url = normalize_feed_url(url)?;
        match self.by_url.get(&url) {
            Some(&idx) => {
                self.sources[idx].title = title.to_string();
                Ok(false)
            }
            None => {
                self.by_url.insert(url.clone(), self.sources.len());
                self.sources.push(FeedSource {
                    url,
                    title: title.to_string(),
                    last_fetched_at: None,
                    last_error: None,
                });
                Ok(true)
            }
        }
    }

    /// Bulk-imports subscriptions from an OPML document.
    ///
    /// Returns the count of genuinely new feeds; pre-existing subscriptions
    /// get their title refreshed but are neither duplicated nor counted.
    /// Malformed XML fails the whole import with no registry mutation
    /// (parsing completes before the first `add`).
    pub fn import(&mut self, opml: &str) -> Result<usize, ImportError> {
        let outlines = parse_opml(opml)?;
        let mut added = 0;
        for outline in outlines {
            // Outline URLs were already normalized and screened by the parser.
            match self.add(&outline.xml_url, &outline.title) {
                Ok(true) => added += 1,
                Ok(false) => {
                    tracing::debug!(url = %outline.xml_url, "feed already subscribed, title refreshed");
                }
                Err(e) => {
                    tracing::warn!(url = %outline.xml_url, error = %e, "skipping unusable OPML entry");
                }
            }
        }
        Ok(added)
    }

    /// Snapshot of all sources in insertion order, for the update cycle.
    pub fn list(&self) -> Vec<FeedSource> {
        self.sources.clone()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Marks a successful fetch: timestamp updated, error cleared.
    pub fn record_success(&mut self, url: &str, at: DateTime<Utc>) {
        if let Some(&idx) = self.by_url.get(url) {
            self.sources[idx].last_fetched_at = Some(at);
            self.sources[idx].last_error = None;
        }
    }

    /// Records a failed fetch; the source stays subscribed and is retried
    /// on the next cycle.
    pub fn record_failure(&mut self, url: &str, error: &str) {
        if let Some(&idx) = self.by_url.get(url) {
            self.sources[idx].last_error = Some(error.to_string());
        }
    }
}
