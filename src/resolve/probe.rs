// src/resolve/probe.rs
// =============================================================================
// Active probing: actually asking a server about a URL.
//
// ProbeChannel is the seam the resolver talks to. The real implementation,
// HttpProbe, sends a HEAD request (no body download) with redirects turned
// OFF, so a 3xx tells us the link redirects instead of being silently
// followed. The Location header gives us where it goes.
//
// HTTP status codes:
// - 200-299: reachable
// - 300-399: redirect
// - 400-599: broken
// =============================================================================

use async_trait::async_trait;
use reqwest::{Client, Response};
use std::time::Duration;
use url::Url;

use crate::error::LinkError;

/// What a single probe learned about a URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Reachable {
        status_code: u16,
    },
    Redirect {
        status_code: u16,
        /// Absolute Location target, if the server sent one
        location: Option<String>,
    },
    Broken {
        status_code: u16,
    },
}

#[async_trait]
pub trait ProbeChannel: Send + Sync {
    async fn probe(&self, url: &str) -> Result<ProbeOutcome, LinkError>;
}

pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    // The timeout aborts the whole request, connect included
    pub fn new(timeout: Duration) -> Result<Self, LinkError> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| LinkError::NetworkError {
                url: String::new(),
                reason: format!("could not build HTTP client: {}", e),
            })?;

        Ok(HttpProbe { client })
    }
}

#[async_trait]
impl ProbeChannel for HttpProbe {
    async fn probe(&self, url: &str) -> Result<ProbeOutcome, LinkError> {
        match self.client.head(url).send().await {
            Ok(response) => Ok(analyze_response(url, &response)),
            Err(e) => Err(LinkError::from_reqwest(url, &e)),
        }
    }
}

fn analyze_response(url: &str, response: &Response) -> ProbeOutcome {
    let status_code = response.status();

    if status_code.is_redirection() {
        // Location may be relative ("/new-home"), resolve it against the
        // URL we asked for
        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|loc| Url::parse(url).ok()?.join(loc).ok())
            .map(|target| target.to_string());

        ProbeOutcome::Redirect {
            status_code: status_code.as_u16(),
            location,
        }
    } else if status_code.as_u16() >= 400 {
        ProbeOutcome::Broken {
            status_code: status_code.as_u16(),
        }
    } else {
        ProbeOutcome::Reachable {
            status_code: status_code.as_u16(),
        }
    }
}
