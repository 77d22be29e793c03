//! Legacy Backend URI Parser
//!
//! Parses the deprecated single-string backend format:
//!
//! ```text
//! scheme://host[/path][?key=value[&key=value...]]
//! ```
//!
//! The grammar is looser than RFC 3986: the host part is taken verbatim (no
//! percent-decoding), and only the query component goes through standard
//! `application/x-www-form-urlencoded` decoding.

use std::collections::BTreeMap;

use crate::error::{CacheError, Result};

/// Separator that marks an identifier as a legacy URI
pub const URI_SEPARATOR: &str = "://";

/// A parsed legacy backend URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUri {
    /// Scheme, either a registered short name or a backend path
    pub scheme: String,
    /// Host (or path) with a single trailing `/` removed
    pub host: String,
    /// Decoded query parameters; later duplicates replace earlier ones
    pub params: BTreeMap<String, String>,
}

/// Whether `identifier` uses the legacy URI notation
#[must_use]
pub fn is_backend_uri(identifier: &str) -> bool {
    identifier.contains(URI_SEPARATOR)
}

/// Parse a legacy backend URI into scheme, host and params
///
/// # Examples
///
/// ```
/// use cache_resolver::uri::parse_backend_uri;
///
/// let parsed = parse_backend_uri("file:///var/tmp/cache?timeout=30").unwrap();
/// assert_eq!(parsed.scheme, "file");
/// assert_eq!(parsed.host, "/var/tmp/cache");
/// assert_eq!(parsed.params.get("timeout").map(String::as_str), Some("30"));
/// ```
///
/// # Errors
///
/// Returns `CacheError::InvalidFormat` if the string has no `:`, the scheme
/// before it is empty, or the part after the first `:` does not start with `//`.
pub fn parse_backend_uri(uri: &str) -> Result<ParsedUri> {
    let invalid = || CacheError::InvalidFormat {
        uri: uri.to_string(),
    };

    let (scheme, rest) = uri
        .split_once(':')
        .filter(|(scheme, _)| !scheme.is_empty())
        .ok_or_else(invalid)?;
    let remainder = rest.strip_prefix("//").ok_or_else(invalid)?;

    let (host, params) = match remainder.split_once('?') {
        Some((host, query)) => (host, parse_query(query)),
        None => (remainder, BTreeMap::new()),
    };
    let host = host.strip_suffix('/').unwrap_or(host);

    Ok(ParsedUri {
        scheme: scheme.to_string(),
        host: host.to_string(),
        params,
    })
}

/// Decode a query string, dropping pairs with blank values
fn parse_query(query: &str) -> BTreeMap<String, String> {
    url::form_urlencoded::parse(query.as_bytes())
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect()
}
