// src/observe/store.rs
// =============================================================================
// The observation store itself: what we have learned about URLs from real
// network traffic.
//
// Two maps live here:
// - observations: url -> the latest Redirect or Broken fact about it
// - chains: redirect destination -> every url seen redirecting to it
//
// Both maps are only ever mutated together (record, upsert, sweep), so a
// chain edge exists exactly as long as the Redirect observation behind it.
//
// This struct is plain single-owner data. The background task in handle.rs
// owns one instance and is the only thing that touches it.
// =============================================================================

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How long an observation stays trustworthy, in seconds
pub const OBSERVATION_TTL_SECS: i64 = 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationKind {
    Redirect,
    Broken,
}

/// One fact learned passively about a URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub url: String,
    pub kind: ObservationKind,
    pub status_code: u16,
    /// "permanent", "not-found", ... see classify_redirect / classify_error
    pub classified_type: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
}

impl Observation {
    pub fn is_redirect(&self) -> bool {
        self.kind == ObservationKind::Redirect
    }

    pub fn is_broken(&self) -> bool {
        self.kind == ObservationKind::Broken
    }
}

pub fn classify_redirect(status_code: u16) -> &'static str {
    match status_code {
        301 => "permanent",
        302 => "temporary",
        303 => "see-other",
        307 => "temporary-strict",
        308 => "permanent-strict",
        _ => "other",
    }
}

pub fn classify_error(status_code: u16) -> &'static str {
    match status_code {
        401 => "unauthorized",
        403 => "forbidden",
        404 => "not-found",
        429 => "rate-limited",
        400..=499 => "client-error",
        500..=599 => "server-error",
        _ => "unknown-error",
    }
}

/// Result of partitioning a set of URLs against the store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchLookup {
    pub known_redirects: Vec<Observation>,
    pub known_broken: Vec<Observation>,
    pub unknown_urls: Vec<String>,
}

/// The store contract handed to scanners: BatchLookup plus the URLs that
/// have no observation of their own but are known redirect destinations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchCheck {
    pub known_redirects: Vec<Observation>,
    pub known_broken: Vec<Observation>,
    pub known_valid: Vec<String>,
    pub unknown_urls: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TargetMembership {
    pub is_target: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

/// Everything the store knows about one URL, redirect-wise
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RedirectCheck {
    pub is_redirect: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_redirect_target: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

#[derive(Debug)]
pub struct ObservationStore {
    observations: HashMap<String, Observation>,
    // destination -> sources, in the order they were first seen
    chains: HashMap<String, Vec<String>>,
    ttl: ChronoDuration,
}

impl Default for ObservationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObservationStore {
    pub fn new() -> Self {
        Self::with_ttl(ChronoDuration::seconds(OBSERVATION_TTL_SECS))
    }

    pub fn with_ttl(ttl: ChronoDuration) -> Self {
        ObservationStore {
            observations: HashMap::new(),
            chains: HashMap::new(),
            ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn record_redirect(&mut self, source_url: &str, status_code: u16, redirect_url: &str) {
        self.record_redirect_at(source_url, status_code, redirect_url, Utc::now());
    }

    pub fn record_redirect_at(
        &mut self,
        source_url: &str,
        status_code: u16,
        redirect_url: &str,
        at: DateTime<Utc>,
    ) {
        self.upsert(Observation {
            url: source_url.to_string(),
            kind: ObservationKind::Redirect,
            status_code,
            classified_type: classify_redirect(status_code).to_string(),
            timestamp: at,
            redirect_url: Some(redirect_url.to_string()),
        });

        let sources = self.chains.entry(redirect_url.to_string()).or_default();
        if !sources.iter().any(|s| s == source_url) {
            sources.push(source_url.to_string());
        }
    }

    pub fn record_broken(&mut self, url: &str, status_code: u16) {
        self.record_broken_at(url, status_code, Utc::now());
    }

    pub fn record_broken_at(&mut self, url: &str, status_code: u16, at: DateTime<Utc>) {
        self.upsert(Observation {
            url: url.to_string(),
            kind: ObservationKind::Broken,
            status_code,
            classified_type: classify_error(status_code).to_string(),
            timestamp: at,
            redirect_url: None,
        });
    }

    pub fn lookup(&self, url: &str) -> Option<&Observation> {
        self.observations.get(url)
    }

    pub fn batch_lookup(&self, urls: &[String]) -> BatchLookup {
        let mut result = BatchLookup::default();

        for url in urls {
            match self.observations.get(url) {
                Some(obs) if obs.is_redirect() => result.known_redirects.push(obs.clone()),
                Some(obs) => result.known_broken.push(obs.clone()),
                None => result.unknown_urls.push(url.clone()),
            }
        }

        result
    }

    pub fn batch_check(&self, urls: &[String]) -> BatchCheck {
        let BatchLookup {
            known_redirects,
            known_broken,
            unknown_urls,
        } = self.batch_lookup(urls);

        let (known_valid, unknown_urls): (Vec<String>, Vec<String>) = unknown_urls
            .into_iter()
            .partition(|url| self.chains.contains_key(url));

        BatchCheck {
            known_redirects,
            known_broken,
            known_valid,
            unknown_urls,
        }
    }

    pub fn is_redirect_target(&self, url: &str) -> TargetMembership {
        match self.chains.get(url).and_then(|sources| sources.first()) {
            Some(source) => TargetMembership {
                is_target: true,
                source_url: Some(source.clone()),
            },
            None => TargetMembership::default(),
        }
    }

    pub fn check_redirect(&self, url: &str) -> RedirectCheck {
        if let Some(obs) = self.observations.get(url).filter(|o| o.is_redirect()) {
            return RedirectCheck {
                is_redirect: true,
                redirect_url: obs.redirect_url.clone(),
                status_code: Some(obs.status_code),
                ..RedirectCheck::default()
            };
        }

        let membership = self.is_redirect_target(url);
        if membership.is_target {
            return RedirectCheck {
                is_redirect_target: Some(true),
                source_url: membership.source_url,
                ..RedirectCheck::default()
            };
        }

        RedirectCheck::default()
    }

    pub fn sweep(&mut self) -> usize {
        self.sweep_at(Utc::now())
    }

    // Drops every observation older than the TTL, and the chain edges of
    // the redirects among them. Returns how many observations went away.
    pub fn sweep_at(&mut self, now: DateTime<Utc>) -> usize {
        let ttl = self.ttl;
        let expired: Vec<String> = self
            .observations
            .values()
            .filter(|obs| now - obs.timestamp > ttl)
            .map(|obs| obs.url.clone())
            .collect();

        for url in &expired {
            if let Some(obs) = self.observations.remove(url) {
                self.unlink(&obs);
            }
        }

        expired.len()
    }

    fn upsert(&mut self, observation: Observation) {
        if let Some(previous) = self.observations.insert(observation.url.clone(), observation) {
            self.unlink(&previous);
        }
    }

    // Removes the chain edge a Redirect observation contributed
    fn unlink(&mut self, observation: &Observation) {
        let Some(target) = observation.redirect_url.as_deref() else {
            return;
        };

        if let Some(sources) = self.chains.get_mut(target) {
            sources.retain(|s| s != &observation.url);
            if sources.is_empty() {
                self.chains.remove(target);
            }
        }
    }
}
