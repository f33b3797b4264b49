//! The update cycle.
//!
//! [`Aggregator`] owns the registry, the item history, the fetcher, and the
//! renderer, and drives one full refresh pass per [`Aggregator::run_cycle`]
//! call. Fetches run concurrently across feeds (same-host ordering is the
//! throttle's job); every result is then funneled through a single
//! serializing merge step so the dedup invariant never depends on
//! fine-grained locking. One feed's failure never aborts the cycle; a
//! failure to persist rendered output does.

use crate::config::{Config, ConfigError};
use crate::feed::{FetchError, ImportError, SourceFetcher};
use crate::history::{Item, ItemHistory};
use crate::registry::{FeedRegistry, FeedSource};
use crate::render::{HtmlTemplate, PageRenderer, PageTemplate, RenderError};
use crate::throttle::DomainThrottle;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::sync::Arc;

/// Max feeds fetched simultaneously within one cycle.
const MAX_CONCURRENT_FETCHES: usize = 10;

/// Outcome of one update cycle.
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Feeds fetched successfully.
    pub fetched: usize,
    /// New items admitted to the history this cycle.
    pub merged: usize,
    /// Feeds that failed, with the error recorded on each.
    pub failed: Vec<FeedFailure>,
}

#[derive(Debug)]
pub struct FeedFailure {
    pub url: String,
    pub error: String,
}

/// The feed aggregation engine.
pub struct Aggregator {
    registry: FeedRegistry,
    history: ItemHistory,
    fetcher: SourceFetcher,
    renderer: PageRenderer,
}

impl Aggregator {
    /// Builds the engine from an already-clamped [`Config`], using the
    /// built-in page template or the configured custom template file.
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let template: Box<dyn PageTemplate> = match &config.template_file {
            Some(path) => {
                let source = std::fs::read_to_string(path).map_err(|e| {
                    ConfigError::Template(format!("{}: {}", path.display(), e))
                })?;
                Box::new(
                    HtmlTemplate::from_source(&source)
                        .map_err(|e| ConfigError::Template(e.to_string()))?,
                )
            }
            None => Box::new(
                HtmlTemplate::built_in().map_err(|e| ConfigError::Template(e.to_string()))?,
            ),
        };
        Self::with_template(config, template)
    }

    /// Builds the engine with an explicit template capability.
    pub fn with_template(
        config: &Config,
        template: Box<dyn PageTemplate>,
    ) -> Result<Self, ConfigError> {
        std::fs::create_dir_all(&config.output_dir)
            .map_err(|e| ConfigError::OutputDir(config.output_dir.clone(), e))?;

        let throttle = Arc::new(DomainThrottle::new(config.min_domain_interval()));
        let fetcher = SourceFetcher::new(reqwest::Client::new(), throttle, config.fetch_timeout());
        let renderer = PageRenderer::new(&config.output_dir, config.items_per_page, template);

        Ok(Self {
            registry: FeedRegistry::new(),
            history: ItemHistory::new(),
            fetcher,
            renderer,
        })
    }

    /// Subscribes a feed directly.
    pub fn add_feed(&mut self, url: &str, title: &str) -> Result<bool, crate::util::FeedUrlError> {
        self.registry.add(url, title)
    }

    /// Bulk-imports subscriptions from an OPML document, returning the
    /// count of newly added feeds.
    pub fn import_opml(&mut self, content: &str) -> Result<usize, ImportError> {
        self.registry.import(content)
    }

    /// Snapshot of the subscribed sources.
    pub fn sources(&self) -> Vec<FeedSource> {
        self.registry.list()
    }

    pub fn feed_count(&self) -> usize {
        self.registry.len()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Runs one full refresh pass and renders the result.
    ///
    /// Per-feed fetch errors are recorded on the source, reported in the
    /// returned [`CycleReport`], and retried implicitly on the next cycle.
    /// Only a render failure propagates; the history is untouched by it, so
    /// the next cycle retries from the same state.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, RenderError> {
        let sources = self.registry.list();

        let results: Vec<(String, DateTime<Utc>, Result<Vec<Item>, FetchError>)> = {
            let fetcher = &self.fetcher;
            stream::iter(sources)
                .map(|source| async move {
                    let result = fetcher.fetch(&source).await;
                    // Timestamped as each fetch completes, not at cycle end.
                    (source.url, Utc::now(), result)
                })
                .buffer_unordered(MAX_CONCURRENT_FETCHES)
                .collect()
                .await
        };

        // Single merge point: all fetch results pass through here serially,
        // so no two merges can interleave.
        let mut report = CycleReport::default();
        for (url, fetched_at, result) in results {
            match result {
                Ok(items) => {
                    let merged = self.history.merge(items);
                    self.registry.record_success(&url, fetched_at);
                    report.fetched += 1;
                    report.merged += merged;
                    if merged > 0 {
                        tracing::debug!(feed = %url, new_items = merged, "merged feed items");
                    }
                }
                Err(e) => {
                    tracing::warn!(feed = %url, error = %e, "feed fetch failed");
                    self.registry.record_failure(&url, &e.to_string());
                    report.failed.push(FeedFailure {
                        url,
                        error: e.to_string(),
                    });
                }
            }
        }

        self.renderer.render(&self.history)?;
        Ok(report)
    }
}
