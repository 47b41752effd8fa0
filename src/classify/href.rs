// src/classify/href.rs
// =============================================================================
// URL-level classification.
//
// Every check here is a cheap string/URL inspection:
// - should_skip_link: hrefs that can never be checked (#, javascript:, ...)
// - is_internal_link: same host as the page being scanned?
// - is_social_media_link / is_archive_link: fixed domain lists
// - check_http_to_https_redirect: the "http:// will bounce to https://"
//   shortcut that lets us call a link a redirect without a request
//
// Domain lists are matched against the URL's host (exact host or any
// subdomain of it), so "dropbox.com" never looks like "x.com".
// =============================================================================

use serde::Serialize;
use url::{Host, Url};

// Social networks. Their pages routinely answer HEAD requests with
// 4xx/999 for bots, so probing them produces noise rather than signal.
const SOCIAL_MEDIA_DOMAINS: &[&str] = &[
    "facebook.com",
    "twitter.com",
    "x.com",
    "instagram.com",
    "linkedin.com",
    "youtube.com",
    "tiktok.com",
    "pinterest.com",
    "reddit.com",
    "tumblr.com",
    "threads.net",
    "mastodon.social",
];

// Archive and cache mirrors. Links into these are counted as spam.
const ARCHIVE_DOMAINS: &[&str] = &[
    "web.archive.org",
    "archive.org",
    "archive.today",
    "archive.is",
    "archive.ph",
    "archive.li",
    "webcache.googleusercontent.com",
    "cachedview.nl",
];

// Schemes that are never worth a request
const UNCHECKABLE_SCHEMES: &[&str] = &["javascript:", "mailto:", "tel:", "data:"];

/// Result of the HTTP->HTTPS shortcut
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HttpsUpgrade {
    pub redirect_url: String,
    pub status_code: u16,
}

// Returns true for hrefs that should not be checked at all
//
// Examples:
//   ""                   -> true
//   "#" / "#section"     -> true
//   "javascript:void(0)" -> true
//   "mailto:a@b.c"       -> true
//   "/docs"              -> false
pub fn should_skip_link(href: &str) -> bool {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return true;
    }

    let lower = href.to_ascii_lowercase();
    UNCHECKABLE_SCHEMES
        .iter()
        .any(|scheme| lower.starts_with(scheme))
}

// Resolves a (possibly relative) href against the page URL
//
// Only http/https results are returned; anything else can't be probed.
pub fn resolve_href(base: &Url, href: &str) -> Option<Url> {
    let url = match Url::parse(href.trim()) {
        Ok(url) => url,
        Err(_) => base.join(href.trim()).ok()?,
    };

    match url.scheme() {
        "http" | "https" => Some(url),
        _ => None,
    }
}

// Decides whether a link points at the page's own host
//
// An unparsable URL counts as internal. That's the lenient default the
// scanner has always had; internal links get the stricter no-follow probe.
pub fn is_internal_link(url: &str, page: &Url) -> bool {
    match Url::parse(url) {
        Ok(parsed) => parsed.host_str() == page.host_str(),
        Err(_) => true,
    }
}

pub fn is_social_media_link(url: &str) -> bool {
    host_matches(url, SOCIAL_MEDIA_DOMAINS)
}

pub fn is_archive_link(url: &str) -> bool {
    host_matches(url, ARCHIVE_DOMAINS)
}

// http://host/... on anything but a loopback host will be bounced to https
// by virtually every server today. We call it a 307 without asking.
pub fn check_http_to_https_redirect(url: &str) -> Option<HttpsUpgrade> {
    let mut parsed = Url::parse(url).ok()?;

    if parsed.scheme() != "http" || is_loopback(&parsed) {
        return None;
    }

    parsed.set_scheme("https").ok()?;

    Some(HttpsUpgrade {
        redirect_url: parsed.to_string(),
        status_code: 307,
    })
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

// Host equals one of the domains, or is a subdomain of one
pub(crate) fn host_matches(url: &str, domains: &[&str]) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };
    let host = host.trim_start_matches("www.");

    domains.iter().any(|domain| {
        host == *domain
            || host
                .strip_suffix(domain)
                .is_some_and(|prefix| prefix.ends_with('.'))
    })
}
