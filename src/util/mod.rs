//! Shared utilities.
//!
//! Currently just feed URL normalization, which doubles as the registry's
//! identity function: two subscription URLs that normalize to the same
//! string are the same feed.

mod url;

pub use url::{normalize_feed_url, validate_public_url, FeedUrlError};
