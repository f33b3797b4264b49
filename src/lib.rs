//! gazette, a long-running feed aggregator.
//!
//! The engine polls a set of RSS/Atom feeds on a fixed interval, merges new
//! items into an append-only history deduplicated on `(feed_url, guid)`, and
//! renders the history into a directory of static HTML pages: `index.html`
//! is rewritten every cycle, while `page{n}.html` archives are written once
//! and never touched again.
//!
//! # Architecture
//!
//! - [`throttle`] - per-host minimum-interval gate for outbound requests
//! - [`feed`] - feed fetching, RSS/Atom decoding, OPML subscription import
//! - [`registry`] - the set of subscribed feed sources
//! - [`history`] - the ordered, deduplicated item collection
//! - [`render`] - paginated HTML output
//! - [`engine`] - one full update cycle tying the above together
//! - [`config`] - configuration loading and range clamping
//!
//! The binary shell (`main.rs`) owns flag parsing, logging setup, and the
//! scheduling loop; everything else lives here so the engine can be driven
//! directly from integration tests.

pub mod config;
pub mod engine;
pub mod feed;
pub mod history;
pub mod registry;
pub mod render;
pub mod throttle;
pub mod util;
