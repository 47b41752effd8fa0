// src/error.rs
// =============================================================================
// Error taxonomy for the link-resolution engine.
//
// Most of these never reach a caller. Probe failures are turned into a
// default classification inside the resolver, a running session is answered
// with its current aggregate, and a total mismatch is only logged. They still
// get names so logs and tests can talk about them precisely.
// =============================================================================

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// A probe did not answer within its deadline
    #[error("request to {0} timed out")]
    NetworkTimeout(String),

    /// Connection refused, DNS failure, TLS failure, blocked request...
    #[error("request to {url} failed: {reason}")]
    NetworkError { url: String, reason: String },

    #[error("malformed URL '{0}'")]
    MalformedUrl(String),

    /// Stored total disagreed with the recomputed sum of category counters
    #[error("stored total {stored} does not match recomputed total {recomputed}")]
    InvariantMismatch { stored: usize, recomputed: usize },

    /// Not a failure: a scan of this page is already in progress
    #[error("a scan of {0} is already running")]
    SessionAlreadyRunning(String),

    /// The active probe channel cannot be reached at all
    #[error("probe channel unavailable")]
    ProbeChannelUnavailable,

    /// The observation store task has shut down
    #[error("observation store unavailable")]
    StoreUnavailable,

    #[error("invalid selector '{0}'")]
    Selector(String),

    #[error("could not fetch page {url}: {reason}")]
    PageFetch { url: String, reason: String },
}

impl LinkError {
    // Maps a reqwest failure onto the taxonomy. Timeouts are kept apart from
    // every other transport failure because the resolver reports them
    // differently.
    pub fn from_reqwest(url: &str, error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            LinkError::NetworkTimeout(url.to_string())
        } else {
            LinkError::NetworkError {
                url: url.to_string(),
                reason: error.to_string(),
            }
        }
    }
}
