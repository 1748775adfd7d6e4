//! URL normalization used to key pages and scope the crawl to one domain.

use thiserror::Error;
use url::Url;

/// Raised when a URL cannot be normalized.
#[derive(Debug, Error)]
pub enum UrlNormError {
    /// The input was empty or whitespace.
    #[error("URL must be a non-empty string")]
    Empty,
    /// The input did not parse as a URL even with an assumed scheme.
    #[error("failed to parse URL '{url}': {source}")]
    Parse {
        /// Offending input.
        url: String,
        /// Parser error.
        source: url::ParseError,
    },
}

/// Normalizes a URL for consistent comparison and storage.
///
/// Lowercases scheme and host (the parser already does), assumes `http` when
/// no scheme is present, strips the fragment, and trims trailing slashes from
/// the path so `/docs/` and `/docs` collapse to one key.
pub fn normalize_url(raw: &str) -> Result<Url, UrlNormError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(UrlNormError::Empty);
    }

    let mut url = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(&format!("http://{trimmed}"))
            .map_err(|source| UrlNormError::Parse {
                url: trimmed.to_string(),
                source,
            })?,
        Err(source) => {
            return Err(UrlNormError::Parse {
                url: trimmed.to_string(),
                source,
            })
        }
    };

    url.set_fragment(None);

    let path = url.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed_path = path.trim_end_matches('/').to_string();
        if trimmed_path.is_empty() {
            url.set_path("/");
        } else {
            url.set_path(&trimmed_path);
        }
    }

    Ok(url)
}

/// True for `http` / `https` URLs with a host, the only ones worth crawling.
pub fn is_crawlable(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https") && url.host_str().is_some()
}

/// True when both URLs share a host.
pub fn same_domain(a: &Url, b: &Url) -> bool {
    match (a.host_str(), b.host_str()) {
        (Some(left), Some(right)) => left == right,
        _ => false,
    }
}
