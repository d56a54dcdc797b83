//! Outbound request filtering (ad and tracker blocking).
//!
//! A stateless allow/block predicate consulted by the engine glue for
//! every outbound request URL. Blocking is a host-membership check against
//! a mutable blocked-host set plus a small fixed set of ad/tracker path
//! patterns. Malformed URLs are never blocked — the filter fails open so a
//! parsing gap can degrade privacy but never break a page.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;
use url::Url;

/// Stock ad and tracker hosts blocked out of the box.
const STOCK_BLOCKED_HOSTS: &[&str] = &[
    "doubleclick.net",
    "googlesyndication.com",
    "googleadservices.com",
    "google-analytics.com",
    "googletagmanager.com",
    "facebook.net",
    "connect.facebook.net",
    "ads.yahoo.com",
    "adserver.yahoo.com",
    "advertising.com",
    "analytics.twitter.com",
    "ads-twitter.com",
    "static.ads-twitter.com",
    "ads.linkedin.com",
    "adnxs.com",
    "adsrvr.org",
    "advertising.microsoft.com",
    "scorecardresearch.com",
    "outbrain.com",
    "taboola.com",
    "zedo.com",
    "serving-sys.com",
    "criteo.com",
    "rubiconproject.com",
    "pubmatic.com",
    "openx.net",
    "adk2x.com",
    "bidswitch.net",
    "adsafeprotected.com",
];

/// Ad/tracker URL path patterns, compiled once.
static PATH_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)/ads?/",
        r"(?i)/advert",
        r"(?i)/banner",
        r"(?i)/tracking",
        r"(?i)/analytics",
        r"(?i)/pixel",
        r"(?i)/impression",
        r"(?i)/click",
        r"(?i)/beacon",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("filter pattern should compile"))
    .collect()
});

/// Allow/block predicate over outbound request URLs.
///
/// Mutations take effect for subsequent `should_block` calls only; there
/// is no retroactive effect on requests already in flight.
pub struct RequestFilter {
    blocked_hosts: HashSet<String>,
    enabled: bool,
}

impl RequestFilter {
    /// Builds a filter seeded with the stock block list, enabled.
    pub fn new() -> Self {
        Self {
            blocked_hosts: STOCK_BLOCKED_HOSTS.iter().map(|h| h.to_string()).collect(),
            enabled: true,
        }
    }

    /// Returns `true` if the request should be blocked.
    ///
    /// A disabled filter allows everything. Unparseable URLs (data URIs,
    /// blobs, garbage) are allowed.
    pub fn should_block(&self, url: &str) -> bool {
        if !self.enabled {
            return false;
        }

        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            // Invalid URL — fail open.
            Err(_) => return false,
        };

        if let Some(host) = parsed.host_str() {
            for blocked in &self.blocked_hosts {
                if host.contains(blocked.as_str()) {
                    debug!(url, host = blocked.as_str(), "request blocked by host list");
                    return true;
                }
            }
        }

        for pattern in PATH_PATTERNS.iter() {
            if pattern.is_match(url) {
                debug!(url, pattern = pattern.as_str(), "request blocked by path pattern");
                return true;
            }
        }

        false
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Adds a host to the block set. Effective for subsequent requests.
    pub fn add_blocked_host(&mut self, host: &str) {
        self.blocked_hosts.insert(host.to_string());
    }

    /// Removes a host from the block set.
    pub fn remove_blocked_host(&mut self, host: &str) {
        self.blocked_hosts.remove(host);
    }

    pub fn blocked_hosts(&self) -> impl Iterator<Item = &str> {
        self.blocked_hosts.iter().map(|h| h.as_str())
    }
}

impl Default for RequestFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_stock_ad_host() {
        let filter = RequestFilter::new();
        assert!(filter.should_block("https://doubleclick.net/x"));
        assert!(filter.should_block("https://stats.google-analytics.com/collect"));
    }

    #[test]
    fn test_blocks_by_path_pattern() {
        let filter = RequestFilter::new();
        assert!(filter.should_block("https://example.com/ads/banner.js"));
        assert!(filter.should_block("https://example.com/TRACKING/pixel.gif"));
    }

    #[test]
    fn test_allows_ordinary_urls() {
        let filter = RequestFilter::new();
        assert!(!filter.should_block("https://example.com/article"));
        assert!(!filter.should_block("https://en.wikipedia.org/wiki/Rust"));
    }

    #[test]
    fn test_malformed_url_fails_open() {
        let filter = RequestFilter::new();
        assert!(!filter.should_block("not a url"));
        assert!(!filter.should_block(""));
    }

    #[test]
    fn test_disabled_filter_allows_everything() {
        let mut filter = RequestFilter::new();
        assert!(filter.should_block("https://doubleclick.net/x"));
        filter.set_enabled(false);
        assert!(!filter.should_block("https://doubleclick.net/x"));
        assert!(!filter.should_block("https://example.com/ads/banner.js"));
    }

    #[test]
    fn test_add_and_remove_host_take_effect_immediately() {
        let mut filter = RequestFilter::new();
        assert!(!filter.should_block("https://example.com/article"));

        filter.add_blocked_host("example.com");
        assert!(filter.should_block("https://example.com/article"));

        filter.remove_blocked_host("example.com");
        assert!(!filter.should_block("https://example.com/article"));
    }

    #[test]
    fn test_host_match_is_substring() {
        // Subdomain of a blocked host is blocked too.
        let filter = RequestFilter::new();
        assert!(filter.should_block("https://cdn.doubleclick.net/js/ad.js"));
    }
}
