// src/resolve/resolver.rs
// =============================================================================
// Resolves one URL to a Resolution, trying the cheapest source first and
// stopping at the first definitive answer:
//
//   1. observation store      (a redirect or error we already saw)
//   2. chain index            (the URL is where some other URL redirects to)
//   3. http -> https          (no request needed)
//   4. internal or external?  (decides which probe channel to use)
//   5. active probe           (HEAD request)
//   6. shortener table        (only if no probe channel can be reached)
//
// resolve() never fails. Every probe problem turns into a default
// classification here, so every link the scanner hands us ends up with a
// terminal status.
// =============================================================================

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

use super::bridge::BridgeProbe;
use super::heuristic::{is_known_shortener, SHORTENER_STATUS};
use super::probe::{HttpProbe, ProbeChannel, ProbeOutcome};
use super::recording::RecordingProbe;
use crate::classify::{check_http_to_https_redirect, is_internal_link};
use crate::config::{ResolverConfig, ScanOptions};
use crate::error::LinkError;
use crate::observe::{Observation, StoreHandle};

/// Where a classification came from, i.e. how much to trust it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Observation,
    ActiveProbe,
    Heuristic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub is_redirect: bool,
    pub is_broken: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    pub source: Source,
    /// Set when this URL is itself a known redirect destination
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_source: Option<String>,
    /// Valid only because nothing said otherwise (timeout, failure, guess)
    pub inconclusive: bool,
}

impl Resolution {
    pub fn valid(status_code: Option<u16>, source: Source) -> Self {
        Resolution {
            is_redirect: false,
            is_broken: false,
            status_code,
            redirect_url: None,
            source,
            redirect_source: None,
            inconclusive: false,
        }
    }

    pub fn inconclusive(source: Source) -> Self {
        Resolution {
            inconclusive: true,
            ..Resolution::valid(None, source)
        }
    }

    pub fn redirect(status_code: u16, redirect_url: Option<String>, source: Source) -> Self {
        Resolution {
            is_redirect: true,
            redirect_url,
            ..Resolution::valid(Some(status_code), source)
        }
    }

    pub fn broken(status_code: u16, source: Source) -> Self {
        Resolution {
            is_broken: true,
            ..Resolution::valid(Some(status_code), source)
        }
    }

    pub fn from_observation(observation: &Observation) -> Self {
        if observation.is_redirect() {
            Resolution::redirect(
                observation.status_code,
                observation.redirect_url.clone(),
                Source::Observation,
            )
        } else {
            Resolution::broken(observation.status_code, Source::Observation)
        }
    }

    // Not a redirect itself: real traffic bounced *to* this URL
    pub fn redirect_target(source_url: Option<String>) -> Self {
        Resolution {
            redirect_source: source_url,
            ..Resolution::valid(None, Source::Observation)
        }
    }

    pub fn from_probe(outcome: ProbeOutcome) -> Self {
        match outcome {
            ProbeOutcome::Reachable { status_code } => {
                Resolution::valid(Some(status_code), Source::ActiveProbe)
            }
            ProbeOutcome::Redirect {
                status_code,
                location,
            } => Resolution::redirect(status_code, location, Source::ActiveProbe),
            ProbeOutcome::Broken { status_code } => {
                Resolution::broken(status_code, Source::ActiveProbe)
            }
        }
    }

    // With redirect detection off, a redirecting link is simply reachable
    pub fn without_redirects(self) -> Self {
        if !self.is_redirect {
            return self;
        }
        Resolution {
            is_redirect: false,
            redirect_url: None,
            ..self
        }
    }
}

/// The two active channels: same-host links are probed directly, other
/// hosts go through the bridged probe worker
#[derive(Clone)]
pub struct ProbeChannels {
    pub internal: Arc<dyn ProbeChannel>,
    pub external: Arc<dyn ProbeChannel>,
}

impl ProbeChannels {
    // Wires up the real HTTP channels. Needs a tokio runtime (the bridge
    // worker is spawned here). Both channels report what they learn to the
    // store: the direct one through RecordingProbe, the bridge in its worker.
    pub fn connect(store: &StoreHandle, config: &ResolverConfig) -> Result<Self, LinkError> {
        let direct = Arc::new(HttpProbe::new(config.probe_timeout)?);
        let internal = Arc::new(RecordingProbe::new(direct, store.clone()));
        let worker = Arc::new(HttpProbe::new(config.probe_timeout)?);
        let external = Arc::new(BridgeProbe::spawn(
            worker,
            store.clone(),
            config.resolution_timeout,
        ));

        Ok(ProbeChannels { internal, external })
    }
}

// One resolver lives for one scan session. Its memo is what makes
// resolve() idempotent within the session: whatever steps 3-6 decided for
// a URL the first time is the answer every following time.
pub struct Resolver {
    store: StoreHandle,
    probes: ProbeChannels,
    memo: Mutex<HashMap<String, Resolution>>,
}

impl Resolver {
    pub fn new(store: StoreHandle, probes: ProbeChannels) -> Self {
        Resolver {
            store,
            probes,
            memo: Mutex::new(HashMap::new()),
        }
    }

    pub async fn resolve(&self, url: &str, page: &Url, options: &ScanOptions) -> Resolution {
        let resolution = self.resolve_any(url, page, options).await;

        if options.detect_redirects {
            resolution
        } else {
            resolution.without_redirects()
        }
    }

    async fn resolve_any(&self, url: &str, page: &Url, options: &ScanOptions) -> Resolution {
        if let Some(known) = self.memo.lock().await.get(url) {
            return known.clone();
        }

        match self.store.lookup(url).await {
            Ok(Some(observation)) => return Resolution::from_observation(&observation),
            Ok(None) => {}
            Err(e) => warn!(%url, error = %e, "observation lookup failed"),
        }

        match self.store.is_redirect_target(url).await {
            Ok(membership) if membership.is_target => {
                return Resolution::redirect_target(membership.source_url);
            }
            Ok(_) => {}
            Err(e) => warn!(%url, error = %e, "chain lookup failed"),
        }

        let resolution = self.resolve_actively(url, page, options).await;
        debug!(%url, source = ?resolution.source, redirect = resolution.is_redirect,
               broken = resolution.is_broken, "resolved");

        self.memo
            .lock()
            .await
            .insert(url.to_string(), resolution.clone());
        resolution
    }

    async fn resolve_actively(&self, url: &str, page: &Url, options: &ScanOptions) -> Resolution {
        if options.detect_redirects {
            if let Some(upgrade) = check_http_to_https_redirect(url) {
                return Resolution::redirect(
                    upgrade.status_code,
                    Some(upgrade.redirect_url),
                    Source::Heuristic,
                );
            }
        }

        if Url::parse(url).is_err() {
            debug!(error = %LinkError::MalformedUrl(url.to_string()), "probing anyway");
        }

        let (channel, allowed) = if is_internal_link(url, page) {
            (&self.probes.internal, options.check_internal)
        } else {
            (&self.probes.external, options.check_external)
        };

        if !allowed {
            return heuristic_fallback(url);
        }

        match channel.probe(url).await {
            Ok(outcome) => Resolution::from_probe(outcome),
            Err(LinkError::ProbeChannelUnavailable) => {
                warn!(%url, "no probe channel reachable, falling back to heuristics");
                heuristic_fallback(url)
            }
            Err(e) => {
                // timeouts and transport failures count as valid
                debug!(%url, error = %e, "probe inconclusive");
                Resolution::inconclusive(Source::ActiveProbe)
            }
        }
    }
}

fn heuristic_fallback(url: &str) -> Resolution {
    if is_known_shortener(url) {
        Resolution {
            inconclusive: true,
            ..Resolution::redirect(SHORTENER_STATUS, None, Source::Heuristic)
        }
    } else {
        Resolution::inconclusive(Source::Heuristic)
    }
}
