// src/scan/page.rs
// =============================================================================
// The page being scanned, and the DOM query that finds its anchors.
//
// We use the `scraper` crate which:
// - Parses HTML into a DOM (Document Object Model)
// - Supports CSS selectors for finding elements
//
// A Page only keeps the raw HTML and its URL. The DOM is rebuilt when the
// anchors are queried and dropped right after, since scraper's Html can't
// be sent between threads.
// =============================================================================

use reqwest::Client;
use scraper::{Html, Selector};
use url::Url;

use crate::classify::{analyze_rel_attributes, RelFlags};
use crate::error::LinkError;
use crate::observe::{observe_response, StoreHandle};

const ANCHOR_SELECTOR: &str = "a[href]";

/// One <a href> found on the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    /// Position among the page's anchors, in document order
    pub index: usize,
    /// href exactly as written in the HTML
    pub href: String,
    pub text: String,
    pub rel: RelFlags,
}

#[derive(Debug, Clone)]
pub struct Page {
    url: Url,
    html: String,
}

impl Page {
    pub fn from_html(url: &str, html: impl Into<String>) -> Result<Self, LinkError> {
        let url = Url::parse(url).map_err(|_| LinkError::MalformedUrl(url.to_string()))?;
        Ok(Page {
            url,
            html: html.into(),
        })
    }

    // Downloads the page through a (monitored) client. If the page URL
    // redirects, the final URL becomes the page URL, which is what relative
    // links and the internal/external split are based on.
    pub async fn fetch(client: &Client, store: &StoreHandle, url: &str) -> Result<Self, LinkError> {
        let fetch_error = |reason: String| LinkError::PageFetch {
            url: url.to_string(),
            reason,
        };

        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        observe_response(store, &response);

        if !response.status().is_success() {
            return Err(fetch_error(format!("HTTP {}", response.status().as_u16())));
        }

        let final_url = response.url().to_string();
        let html = response.text().await.map_err(|e| fetch_error(e.to_string()))?;

        Page::from_html(&final_url, html)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn key(&self) -> String {
        page_key(self.url.as_str())
    }

    pub fn anchors(&self) -> Result<Vec<Anchor>, LinkError> {
        let selector = Selector::parse(ANCHOR_SELECTOR)
            .map_err(|_| LinkError::Selector(ANCHOR_SELECTOR.to_string()))?;
        let document = Html::parse_document(&self.html);

        let anchors = document
            .select(&selector)
            .enumerate()
            .filter_map(|(index, element)| {
                let href = element.value().attr("href")?;
                Some(Anchor {
                    index,
                    href: href.to_string(),
                    text: collapse_whitespace(&element.text().collect::<String>()),
                    rel: analyze_rel_attributes(&element),
                })
            })
            .collect();

        Ok(anchors)
    }
}

// Identifies a page for session bookkeeping. Fragments don't make a
// different page; a string that isn't a URL is its own key.
pub fn page_key(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut url) => {
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => url.to_string(),
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
