use crate::history::Item;
use feed_rs::model::{Link, Text};
use feed_rs::parser;
use sha2::{Digest, Sha256};

/// Decodes a fetched feed payload into items stamped with the source URL.
///
/// Works for both RSS and Atom via `feed-rs`. The default `feed-rs` id
/// generator synthesizes a random UUID per parse for entries without a guid,
/// which would admit a duplicate on every refetch; a deterministic generator
/// is plugged in instead, falling back to the entry link, then to a content
/// hash, so dedup stays stable across refetches.
pub fn parse_items(bytes: &[u8], feed_url: &str) -> Result<Vec<Item>, parser::ParseFeedError> {
    let feed = parser::Builder::new()
        .id_generator(|links: &[Link], title: &Option<Text>, _uri: Option<&str>| {
            fallback_guid(
                links.first().map(|l| l.href.as_str()),
                title.as_ref().map(|t| t.content.as_str()),
            )
        })
        .build()
        .parse(bytes)?;

    let items: Vec<Item> = feed
        .entries
        .into_iter()
        .map(|entry| {
            let link = entry.links.first().map(|l| l.href.clone());
            let published_at = entry.published.or(entry.updated);
            let summary = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body));
            let title = entry
                .title
                .map(|t| t.content)
                .unwrap_or_else(|| "Untitled".to_string());

            // A feed can still supply a present-but-blank guid.
            let guid = if entry.id.trim().is_empty() {
                fallback_guid(link.as_deref(), Some(&title))
            } else {
                entry.id.trim().to_string()
            };

            Item {
                feed_url: feed_url.to_string(),
                guid,
                title,
                link,
                published_at,
                summary,
            }
        })
        .collect();

    Ok(items)
}

/// Deterministic identity for entries the feed did not assign a guid.
fn fallback_guid(link: Option<&str>, title: Option<&str>) -> String {
    if let Some(link) = link {
        let trimmed = link.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let hash = Sha256::digest(title.unwrap_or_default().trim().as_bytes());
    format!("{:x}", hash)
}
