//! Feed retrieval and decoding.
//!
//! - [`fetcher`] - single-feed HTTP retrieval, throttled and timeout-bounded
//! - [`parser`] - RSS/Atom payload decoding via `feed-rs`
//! - [`opml`] - OPML subscription-list decoding for bulk import

mod fetcher;
mod opml;
mod parser;

pub use fetcher::{FetchError, SourceFetcher};
pub use opml::{parse_opml, ImportError, OpmlOutline};
pub use parser::parse_items;
