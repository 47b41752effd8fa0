// src/observe/monitor.rs
// =============================================================================
// Passive network monitoring: the feed that fills the observation store.
//
// We never go looking for observations. Instead every HTTP client that
// follows redirects (the one fetching the page, for example) is built here
// with a redirect policy that reports each hop it follows, and every final
// response can be passed through observe_response() so error statuses are
// remembered too. Later scans get those facts for free.
// =============================================================================

use reqwest::redirect::Policy;
use reqwest::{Client, Response};
use std::time::Duration;

use super::handle::StoreHandle;
use crate::error::LinkError;

// Same ceiling browsers and most crawlers use before giving up
const MAX_FOLLOWED_REDIRECTS: usize = 10;

// Builds a redirect-following client that records every hop it takes
//
// For a chain  A --301--> B --302--> C  the store ends up with
//   A redirect(301) -> B
//   B redirect(302) -> C
pub fn monitored_client(store: StoreHandle, timeout: Duration) -> Result<Client, LinkError> {
    let policy = Policy::custom(move |attempt| {
        if attempt.previous().len() > MAX_FOLLOWED_REDIRECTS {
            return attempt.error("too many redirects");
        }

        if let Some(from) = attempt.previous().last() {
            store.record_redirect(from.as_str(), attempt.status().as_u16(), attempt.url().as_str());
        }

        attempt.follow()
    });

    Client::builder()
        .timeout(timeout)
        .redirect(policy)
        .build()
        .map_err(|e| LinkError::NetworkError {
            url: String::new(),
            reason: format!("could not build HTTP client: {}", e),
        })
}

// Records the final response of a request if it is an error status
pub fn observe_response(store: &StoreHandle, response: &Response) {
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        store.record_broken(response.url().as_str(), status.as_u16());
    }
}
