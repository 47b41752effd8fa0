// src/classify/mod.rs
// =============================================================================
// The link classifier: pure decisions made from a URL or an anchor alone.
//
// Submodules:
// - href: skip / internal / social / archive / HTTP->HTTPS checks
// - rel: parsing of the rel="..." attribute
//
// Nothing in here touches the network or any shared state, so every
// function can be called from anywhere, in any order.
// =============================================================================

mod href;
mod rel;

pub use href::{
    check_http_to_https_redirect, is_archive_link, is_internal_link, is_social_media_link,
    resolve_href, should_skip_link, HttpsUpgrade,
};
pub use rel::{analyze_rel_attributes, RelFlags, RelTally};

pub(crate) use href::host_matches;
