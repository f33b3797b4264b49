use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

use crate::util::{normalize_feed_url, validate_public_url};

/// Maximum allowed nesting depth for OPML outline elements.
/// Prevents stack-blowing input from maliciously nested subscription lists.
const MAX_OPML_DEPTH: usize = 50;

/// Errors that fail a bulk import as a whole.
///
/// A document that is not well-formed XML imports nothing; individual
/// outlines with invalid feed URLs are skipped instead (see [`parse_opml`]),
/// so one bad entry never poisons the rest.
#[derive(Debug, Error)]
pub enum ImportError {
    /// OPML nesting depth exceeds the safety limit.
    #[error("OPML nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),

    /// XML parsing failed.
    #[error("XML parse error: {0}")]
    XmlParse(String),

    /// Attribute value could not be decoded.
    #[error("XML attribute error: {0}")]
    Attribute(String),
}

/// A feed subscription extracted from an OPML document.
#[derive(Debug, Clone)]
pub struct OpmlOutline {
    /// Display title, sourced from the `title` attribute, falling back to
    /// `text`, then to the feed URL itself.
    pub title: String,
    /// Normalized URL of the feed XML.
    pub xml_url: String,
}

/// Parses OPML content and extracts feed subscriptions.
///
/// Handles both nested and flat structures: any `<outline>` element with an
/// `xmlUrl` attribute is a subscription regardless of depth; category
/// outlines without one are traversed but not returned. Outlines whose URL
/// fails validation (bad scheme, localhost, private IP) are skipped with a
/// warning and the rest of the document still imports.
///
/// XXE is structurally mitigated: quick-xml (0.37) never parses `<!ENTITY>`
/// declarations, so custom entity references error instead of expanding.
pub fn parse_opml(content: &str) -> Result<Vec<OpmlOutline>, ImportError> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut outlines = Vec::new();
    let mut buf = Vec::new();
    let mut depth: usize = 0;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"outline" => {
                depth += 1;
                if depth > MAX_OPML_DEPTH {
                    return Err(ImportError::MaxDepthExceeded(MAX_OPML_DEPTH));
                }
                if let Some(outline) = parse_outline_attributes(&e, &reader)? {
                    outlines.push(outline);
                }
            }
            Ok(Event::Empty(e)) if e.name().as_ref() == b"outline" => {
                // Self-closing outline doesn't affect depth
                if let Some(outline) = parse_outline_attributes(&e, &reader)? {
                    outlines.push(outline);
                }
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"outline" => {
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ImportError::XmlParse(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(outlines)
}

/// Extracts subscription attributes from one outline element.
///
/// Returns `None` for category/folder outlines and for outlines whose
/// `xmlUrl` fails validation.
fn parse_outline_attributes(
    e: &quick_xml::events::BytesStart<'_>,
    reader: &Reader<&[u8]>,
) -> Result<Option<OpmlOutline>, ImportError> {
    let mut xml_url = None;
    let mut title = None;
    let mut text = None;

    let decoder = reader.decoder();
    for attr_result in e.attributes() {
        let attr = match attr_result {
            Ok(attr) => attr,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed OPML attribute");
                continue;
            }
        };
        let value = attr
            .decode_and_unescape_value(decoder)
            .map_err(|e| ImportError::Attribute(e.to_string()));
        match attr.key.as_ref() {
            b"xmlUrl" => xml_url = Some(value?.to_string()),
            b"title" => title = Some(value?.to_string()),
            b"text" => text = Some(value?.to_string()),
            _ => {}
        }
    }

    let Some(raw_url) = xml_url else {
        return Ok(None);
    };

    match normalize_feed_url(&raw_url).and_then(|url| {
        validate_public_url(&url)?;
        Ok(url)
    }) {
        Ok(url) => Ok(Some(OpmlOutline {
            title: title.or(text).unwrap_or_else(|| url.clone()),
            xml_url: url,
        })),
        Err(e) => {
            tracing::warn!(url = %raw_url, error = %e, "Skipping invalid feed URL in OPML");
            Ok(None)
        }
    }
}
