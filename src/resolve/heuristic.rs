// src/resolve/heuristic.rs
// =============================================================================
// Last-resort guesses, used only when no probe channel can be reached.
//
// Short-link services exist to redirect, so a link to one of them is
// reported as a (low-confidence) redirect without any request.
// =============================================================================

use crate::classify::host_matches;

const SHORTENER_DOMAINS: &[&str] = &[
    "t.co",
    "bit.ly",
    "goo.gl",
    "tinyurl.com",
    "ow.ly",
    "amzn.to",
    "youtu.be",
    "fb.me",
    "wa.me",
    "rebrand.ly",
    "buff.ly",
    "cutt.ly",
    "shorturl.at",
    "ln.is",
    "cli.re",
    "is.gd",
    "lnkd.in",
    "tiny.cc",
    "rb.gy",
    "t.ly",
    "dlvr.it",
    "trib.al",
];

// Status reported for a guessed shortener redirect
pub const SHORTENER_STATUS: u16 = 301;

pub fn is_known_shortener(url: &str) -> bool {
    host_matches(url, SHORTENER_DOMAINS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shorteners() {
        assert!(is_known_shortener("https://bit.ly/3abc"));
        assert!(is_known_shortener("http://t.co/xyz"));
        assert!(is_known_shortener("https://youtu.be/dQw4w9WgXcQ"));
        assert!(!is_known_shortener("https://reddit.co/"));
        assert!(!is_known_shortener("https://example.com/bit.ly"));
    }
}
