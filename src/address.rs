//! Address-input resolution — URL vs. search-query disambiguation.
//!
//! Raw address-bar text is either something navigable (a full URL, a bare
//! domain, `localhost`, an IP) or a search query to hand to the configured
//! search engine. The classifier is a pure function of its input: no
//! network probing, identical input always yields the identical decision.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Dotted domain with an alphabetic TLD of at least two letters,
/// optionally followed by a path.
static DOMAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-zA-Z0-9-]+\.)+[a-zA-Z]{2,}(/.*)?$").expect("DOMAIN_RE should compile")
});

/// IPv4-literal prefix (`192.168.1.1`, `127.0.0.1:8080/page`, …).
static IPV4_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,3}\.){3}\d{1,3}").expect("IPV4_RE should compile"));

/// Outcome of classifying raw address-bar text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    /// Navigable as-is (modulo an `https://` prefix).
    Url,
    /// Free text to substitute into the search-engine template.
    Query,
}

/// Classifies raw address-bar text.
///
/// Navigable if the input already carries an `http(s)://` scheme, matches
/// a dotted-domain shape with a valid-looking TLD, or is `localhost` /
/// an IPv4 literal (optionally with port and path). Everything else is a
/// search query.
pub fn classify(input: &str) -> AddressKind {
    let input = input.trim();

    if input.starts_with("http://") || input.starts_with("https://") {
        return AddressKind::Url;
    }

    if DOMAIN_RE.is_match(input) {
        return AddressKind::Url;
    }

    if input.starts_with("localhost") || IPV4_RE.is_match(input) {
        return AddressKind::Url;
    }

    AddressKind::Query
}

/// Resolves raw address-bar text into the URL to dispatch.
///
/// URLs lacking a scheme get `https://` prefixed; queries are
/// percent-encoded into `search_template` (a prefix ending in `…?q=`).
/// Returns `None` for blank input.
pub fn resolve(input: &str, search_template: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    match classify(input) {
        AddressKind::Url => {
            if input.starts_with("http://") || input.starts_with("https://") {
                Some(input.to_string())
            } else {
                Some(format!("https://{input}"))
            }
        }
        AddressKind::Query => {
            let encoded: String = url::form_urlencoded::byte_serialize(input.as_bytes()).collect();
            Some(format!("{search_template}{encoded}"))
        }
    }
}

/// Returns `true` if `input` parses as a URL once resolved.
///
/// Used by callers that want to validate before dispatch without caring
/// about the query branch.
pub fn parses_as_url(input: &str) -> bool {
    match classify(input) {
        AddressKind::Url => {
            let candidate = if input.starts_with("http://") || input.starts_with("https://") {
                input.to_string()
            } else {
                format!("https://{}", input.trim())
            };
            Url::parse(&candidate).is_ok()
        }
        AddressKind::Query => false,
    }
}
