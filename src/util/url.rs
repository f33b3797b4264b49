use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Errors that can occur while normalizing or screening a feed URL.
///
/// Beyond plain parse failures these cover the policy applied to bulk
/// imports: an aggregator should never be talked into fetching from
/// localhost or a private network by a hostile subscription list (SSRF).
#[derive(Error, Debug)]
pub enum FeedUrlError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    Invalid(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host component.
    #[error("URL has no host")]
    MissingHost,
    /// The URL points to a private/internal IP address.
    #[error("Private IP address not allowed: {0}")]
    PrivateIp(String),
    /// The URL points to localhost.
    #[error("Localhost not allowed")]
    Localhost,
}

/// Normalizes a URL string for use as a feed source identity.
///
/// Parsing through [`Url`] canonicalizes the representation (lowercased
/// host, resolved default port, percent-encoding), so trivially different
/// spellings of the same feed URL dedup to one registry entry. Only the
/// scheme and host presence are enforced here; the public-host screen for
/// untrusted input lives in [`validate_public_url`].
///
/// # Examples
///
/// ```
/// use gazette::util::normalize_feed_url;
///
/// let url = normalize_feed_url("HTTPS://Example.COM/feed.xml").unwrap();
/// assert_eq!(url, "https://example.com/feed.xml");
///
/// assert!(normalize_feed_url("file:///etc/passwd").is_err());
/// ```
pub fn normalize_feed_url(raw: &str) -> Result<String, FeedUrlError> {
    let url = Url::parse(raw.trim())?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(FeedUrlError::UnsupportedScheme(scheme.to_owned())),
    }
    if url.host_str().is_none() {
        return Err(FeedUrlError::MissingHost);
    }

    Ok(url.to_string())
}

/// Rejects URLs pointing at localhost or private address ranges.
///
/// Applied to URLs arriving from untrusted OPML documents; feeds added
/// directly by the operator are taken at face value.
///
/// ```
/// use gazette::util::validate_public_url;
///
/// assert!(validate_public_url("https://example.com/feed.xml").is_ok());
/// assert!(validate_public_url("http://localhost/feed").is_err());
/// assert!(validate_public_url("http://192.168.1.1/feed").is_err());
/// ```
pub fn validate_public_url(raw: &str) -> Result<(), FeedUrlError> {
    let url = Url::parse(raw.trim())?;
    let Some(host) = url.host_str() else {
        return Err(FeedUrlError::MissingHost);
    };

    if host == "localhost" {
        return Err(FeedUrlError::Localhost);
    }

    // Strip brackets from IPv6 addresses for parsing
    let host_for_parse = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);

    if let Ok(ip) = host_for_parse.parse::<IpAddr>() {
        if ip.is_loopback() {
            return Err(FeedUrlError::Localhost);
        }
        if is_private_ip(&ip) {
            return Err(FeedUrlError::PrivateIp(ip.to_string()));
        }
    }

    Ok(())
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            ipv4.is_private() || ipv4.is_loopback() || ipv4.is_link_local() || ipv4.is_unspecified()
        }
        IpAddr::V6(ipv6) => {
            if ipv6.is_loopback() || ipv6.is_unspecified() {
                return true;
            }
            let segments = ipv6.segments();
            // Unique Local (fc00::/7)
            let is_unique_local = (segments[0] & 0xfe00) == 0xfc00;
            // Link-Local (fe80::/10)
            let is_link_local = (segments[0] & 0xffc0) == 0xfe80;
            is_unique_local || is_link_local
        }
    }
}
