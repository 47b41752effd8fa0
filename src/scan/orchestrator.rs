// src/scan/orchestrator.rs
// =============================================================================
// Drives one scan session per page from collection to a final aggregate.
//
// What happens on start():
// 1. Collecting: query the anchors, classify each one, and settle right
//    away everything that needs no network (skips, http->https, social,
//    archive, links whose kind of checking is switched off)
// 2. PreScanning: ask the observation store about every remaining URL in
//    one round trip; what it already knows is settled
// 3. Resolving: the rest goes through the resolver in batches of
//    `batch_size`, resolved concurrently, with a short pause between
//    batches so one big page can't hog the runtime
// 4. Finalizing: recompute the total, stamp timings, emit the result once
//
// A page that is already being scanned is not scanned twice: start()
// returns the running session's current aggregate instead.
//
// The page itself can be handed over ready (start) or fetched inside the
// session (fetch_and_scan). A page that can't be retrieved ends the session
// as Failed, with a result and a Finished event like any other scan.
// =============================================================================

use futures::stream::{self, StreamExt};
use reqwest::Client;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};
use url::Url;

use super::page::{page_key, Anchor, Page};
use super::progress::{resolving_progress, ProgressThrottle, ScanEvent};
use super::session::{LinkRecord, LinkStatus, ScanResult, ScanSession, ScanState};
use crate::classify::{
    check_http_to_https_redirect, is_archive_link, is_internal_link, is_social_media_link,
    resolve_href, should_skip_link,
};
use crate::config::{OrchestratorConfig, ScanOptions};
use crate::error::LinkError;
use crate::observe::StoreHandle;
use crate::resolve::{ProbeChannels, Resolution, Resolver, Source};

const EVENT_CAPACITY: usize = 64;

type SharedSession = Arc<Mutex<ScanSession>>;

enum Claim {
    Fresh(SharedSession),
    Running(ScanResult),
}

pub struct ScanOrchestrator {
    store: StoreHandle,
    probes: ProbeChannels,
    config: OrchestratorConfig,
    sessions: Mutex<HashMap<String, SharedSession>>,
    events: broadcast::Sender<ScanEvent>,
}

impl ScanOrchestrator {
    pub fn new(store: StoreHandle, probes: ProbeChannels) -> Self {
        Self::with_config(store, probes, OrchestratorConfig::default())
    }

    pub fn with_config(
        store: StoreHandle,
        probes: ProbeChannels,
        config: OrchestratorConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        ScanOrchestrator {
            store,
            probes,
            config,
            sessions: Mutex::new(HashMap::new()),
            events,
        }
    }

    // Progress and completion events for every page this orchestrator scans
    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.events.subscribe()
    }

    pub async fn scan_links(&self, page: &Page, options: ScanOptions) -> ScanResult {
        self.start(page, options).await
    }

    // Result of the latest scan of a page, finished or still running
    pub async fn existing_results(&self, page_url: &str) -> Option<ScanResult> {
        let session = self.sessions.lock().await.get(page_url).cloned()?;
        let snapshot = session.lock().await.snapshot();
        Some(snapshot)
    }

    // Retrieves the page through `client` as the first step of the session
    pub async fn fetch_and_scan(
        &self,
        client: &Client,
        page_url: &str,
        options: ScanOptions,
    ) -> ScanResult {
        let store = self.store.clone();
        let fetch = async move { Page::fetch(client, &store, page_url).await };
        self.start_with(page_url, options, fetch).await
    }

    pub async fn start(&self, page: &Page, options: ScanOptions) -> ScanResult {
        let ready = async { Ok::<_, LinkError>(page.clone()) };
        self.start_with(&page.key(), options, ready).await
    }

    // `page` is only awaited once the session is claimed, so a second start
    // for a running page never retrieves it again
    pub async fn start_with<F>(&self, page_url: &str, options: ScanOptions, page: F) -> ScanResult
    where
        F: Future<Output = Result<Page, LinkError>>,
    {
        let key = page_key(page_url);

        let session = match self.claim(&key, options).await {
            Claim::Fresh(session) => session,
            Claim::Running(current) => return current,
        };

        info!(page = %key, "scan started");
        let mut throttle = ProgressThrottle::new(self.config.progress_interval);
        let outcome = self.run(&session, &key, page, &mut throttle).await;

        let result = {
            let mut session = session.lock().await;
            match outcome {
                Ok(()) => {
                    if let Some(mismatch) = session.finalize() {
                        warn!(page = %key, error = %mismatch, "total recomputed");
                    }
                }
                Err(e) => {
                    error!(page = %key, error = %e, "scan failed");
                    session.fail(e.to_string());
                }
            }
            session.snapshot()
        };

        info!(
            page = %key,
            total = result.total,
            broken = result.counts.broken,
            redirect = result.counts.redirect,
            duration_ms = result.duration_ms.unwrap_or_default(),
            "scan finished"
        );
        self.emit(ScanEvent::Finished(result.clone()));
        result
    }

    async fn claim(&self, key: &str, options: ScanOptions) -> Claim {
        let mut sessions = self.sessions.lock().await;

        if let Some(existing) = sessions.get(key) {
            let current = existing.lock().await;
            if current.is_running() {
                debug!(error = %LinkError::SessionAlreadyRunning(key.to_string()),
                       "returning current aggregate");
                return Claim::Running(current.snapshot());
            }
        }

        let mut session = ScanSession::new(key, options);
        session.begin();
        let session = Arc::new(Mutex::new(session));
        sessions.insert(key.to_string(), Arc::clone(&session));
        Claim::Fresh(session)
    }

    async fn run<F>(
        &self,
        session: &SharedSession,
        key: &str,
        page: F,
        throttle: &mut ProgressThrottle,
    ) -> Result<(), LinkError>
    where
        F: Future<Output = Result<Page, LinkError>>,
    {
        let page = page.await?;
        let options = session.lock().await.options().clone();

        self.collect(session, &page, &options).await?;
        self.report(key, 25, throttle);

        self.prescan(session, &options).await;
        self.report(key, 50, throttle);

        self.resolve_pending(session, key, &page, &options, throttle).await;
        Ok(())
    }

    async fn collect(
        &self,
        session: &SharedSession,
        page: &Page,
        options: &ScanOptions,
    ) -> Result<(), LinkError> {
        let anchors = page.anchors()?;
        debug!(page = %page.url(), anchors = anchors.len(), "collected anchors");

        let mut session = session.lock().await;
        for anchor in &anchors {
            session.push(classify_anchor(anchor, page.url(), options));
        }
        session.seal_collection();
        session.set_progress(25);
        session.enter(ScanState::PreScanning);
        Ok(())
    }

    async fn prescan(&self, session: &SharedSession, options: &ScanOptions) {
        let urls = session.lock().await.pending_urls();
        if urls.is_empty() {
            session.lock().await.set_progress(50);
            return;
        }

        let batch = match self.store.batch_check_links(urls).await {
            Ok(batch) => batch,
            Err(e) => {
                warn!(error = %e, "pre-scan skipped, every link will be resolved");
                session.lock().await.set_progress(50);
                return;
            }
        };
        debug!(
            redirects = batch.known_redirects.len(),
            broken = batch.known_broken.len(),
            valid = batch.known_valid.len(),
            unknown = batch.unknown_urls.len(),
            "pre-scan"
        );

        let mut session = session.lock().await;
        for observation in batch.known_redirects.iter().chain(&batch.known_broken) {
            let mut resolution = Resolution::from_observation(observation);
            if !options.detect_redirects {
                resolution = resolution.without_redirects();
            }
            session.settle_url(&observation.url, &resolution);
        }
        for url in &batch.known_valid {
            // a destination real traffic reached, so it answers
            session.settle_url(url, &Resolution::redirect_target(None));
        }
        session.set_progress(50);
    }

    async fn resolve_pending(
        &self,
        session: &SharedSession,
        key: &str,
        page: &Page,
        options: &ScanOptions,
        throttle: &mut ProgressThrottle,
    ) {
        let urls = {
            let mut session = session.lock().await;
            session.enter(ScanState::Resolving);
            session.pending_urls()
        };
        if urls.is_empty() {
            return;
        }

        let page_url = page.url();
        let resolver = Resolver::new(self.store.clone(), self.probes.clone());
        let resolver = &resolver;
        let batch_size = options.batch_size();
        let mut done = 0;

        for (i, batch) in urls.chunks(batch_size).enumerate() {
            if i > 0 {
                // give everything else on the runtime a turn
                tokio::time::sleep(self.config.batch_pause).await;
            }

            let resolved: Vec<(&String, Resolution)> = stream::iter(batch)
                .map(move |url| async move { (url, resolver.resolve(url, page_url, options).await) })
                .buffer_unordered(batch_size)
                .collect()
                .await;
            done += resolved.len();

            let progress = {
                let mut session = session.lock().await;
                for (url, resolution) in &resolved {
                    session.settle_url(url, resolution);
                }
                let progress = resolving_progress(done, urls.len());
                session.set_progress(progress);
                progress
            };
            self.report(key, progress, throttle);
        }
    }

    fn report(&self, page_url: &str, progress: u8, throttle: &mut ProgressThrottle) {
        if throttle.ready() {
            self.emit(ScanEvent::Progress {
                page_url: page_url.to_string(),
                progress,
            });
        }
    }

    fn emit(&self, event: ScanEvent) {
        // nobody listening is fine
        let _ = self.events.send(event);
    }
}

// Builds the record for one anchor and settles it if no network is needed
fn classify_anchor(anchor: &Anchor, page: &Url, options: &ScanOptions) -> LinkRecord {
    if should_skip_link(&anchor.href) {
        let mut record = LinkRecord::new(anchor, anchor.href.clone(), true);
        record.settle(
            LinkStatus::Skipped,
            Source::Heuristic,
            Some("not a checkable link".to_string()),
        );
        return record;
    }

    let Some(url) = resolve_href(page, &anchor.href) else {
        let is_internal = is_internal_link(&anchor.href, page);
        let mut record = LinkRecord::new(anchor, anchor.href.clone(), is_internal);
        record.settle(
            LinkStatus::Skipped,
            Source::Heuristic,
            Some("not an http(s) link".to_string()),
        );
        return record;
    };

    let url = url.to_string();
    let is_internal = is_internal_link(&url, page);
    let mut record = LinkRecord::new(anchor, url.clone(), is_internal);

    if options.detect_redirects {
        if let Some(upgrade) = check_http_to_https_redirect(&url) {
            record.apply(&Resolution::redirect(
                upgrade.status_code,
                Some(upgrade.redirect_url),
                Source::Heuristic,
            ));
            return record;
        }
    }

    if is_social_media_link(&url) {
        record.settle(
            LinkStatus::Valid,
            Source::Heuristic,
            Some("social media, not probed".to_string()),
        );
    } else if is_archive_link(&url) {
        record.settle(
            LinkStatus::Spam,
            Source::Heuristic,
            Some("archive mirror".to_string()),
        );
    } else if (is_internal && !options.check_internal) || (!is_internal && !options.check_external) {
        record.settle(
            LinkStatus::Skipped,
            Source::Heuristic,
            Some("checking disabled for this kind of link".to_string()),
        );
    }

    record
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why Arc<Mutex<ScanSession>>?
//    - The sessions map and a running scan both need the same session
//    - Arc shares ownership, Mutex makes the sharing safe to mutate
//    - We use tokio's Mutex because the lock is taken inside async code
//
// 2. Why never hold a session lock across a network call?
//    - A second start() for the same page has to read the session to return
//      its current aggregate; it would wait for the whole scan otherwise
//
// 3. What does buffer_unordered(n) do?
//    - Runs up to n futures at once and yields results as they finish,
//      in whatever order they finish
//    - The session doesn't care about the order: each link settles once
// -----------------------------------------------------------------------------
