// tests/scan_scenario.rs
// =============================================================================
// End-to-end scans through the public API: a page with every kind of link,
// overlapping scans of the same page, the event stream, and scans over real
// HTTP against a mock server (including a page that can't be fetched).
// =============================================================================

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use link_health::observe::{monitored_client, ObservationStore, StoreHandle};
use link_health::resolve::{ProbeChannel, ProbeChannels, ProbeOutcome, Source};
use link_health::scan::{LinkStatus, Page, ScanEvent, ScanOrchestrator, ScanState};
use link_health::{LinkError, ResolverConfig, ScanOptions};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PAGE_URL: &str = "https://example.com/page";

// Answers from a fixed table (200 for anything not in it) and counts calls
struct TableProbe {
    answers: HashMap<String, ProbeOutcome>,
    delay: Duration,
    calls: AtomicUsize,
}

impl TableProbe {
    fn new(answers: &[(&str, ProbeOutcome)], delay: Duration) -> Arc<Self> {
        Arc::new(TableProbe {
            answers: answers
                .iter()
                .map(|(url, outcome)| (url.to_string(), outcome.clone()))
                .collect(),
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProbeChannel for TableProbe {
    async fn probe(&self, url: &str) -> Result<ProbeOutcome, LinkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self
            .answers
            .get(url)
            .cloned()
            .unwrap_or(ProbeOutcome::Reachable { status_code: 200 }))
    }
}

// Ten anchors: two uncheckable, three plain http, one observed redirect, two
// observed 404s and two links nobody has seen yet (one internal, one not)
fn scenario_page() -> Page {
    let html = r##"
        <html><body>
          <a href="#">top</a>
          <a href="javascript:void(0)">menu</a>
          <a href="http://other.org/insecure">insecure</a>
          <a href="http://example.com/plain">plain</a>
          <a href="http://blog.example.net/post">post</a>
          <a href="https://example.com/old">old</a>
          <a href="https://example.com/missing">missing</a>
          <a href="https://example.com/removed" rel="nofollow">removed</a>
          <a href="https://example.com/docs">docs</a>
          <a href="https://other.org/about">about</a>
        </body></html>
    "##;
    Page::from_html(PAGE_URL, html).unwrap()
}

struct Fixture {
    orchestrator: ScanOrchestrator,
    internal: Arc<TableProbe>,
    external: Arc<TableProbe>,
}

fn fixture(delay: Duration) -> Fixture {
    let store = StoreHandle::spawn(ObservationStore::new());
    store.record_redirect("https://example.com/old", 301, "https://example.com/new");
    store.record_broken("https://example.com/missing", 404);
    store.record_broken("https://example.com/removed", 404);

    // anything a channel is asked about answers 200
    let internal = TableProbe::new(&[], delay);
    let external = TableProbe::new(&[], delay);

    let probes = ProbeChannels {
        internal: internal.clone(),
        external: external.clone(),
    };

    Fixture {
        orchestrator: ScanOrchestrator::new(store, probes),
        internal,
        external,
    }
}

#[tokio::test]
async fn test_every_kind_of_link() {
    let fx = fixture(Duration::ZERO);

    let result = fx
        .orchestrator
        .scan_links(&scenario_page(), ScanOptions::default())
        .await;

    assert_eq!(result.state, ScanState::Completed);
    assert_eq!(result.total, 10);
    assert_eq!(result.counts.skipped, 2);
    assert_eq!(result.counts.redirect, 4);
    assert_eq!(result.counts.broken, 2);
    assert_eq!(result.counts.valid, 2);
    assert_eq!(result.counts.nofollow, 0);
    assert_eq!(result.counts.spam, 0);
    assert!(result.is_consistent());
    assert!(result.has_redirects);
    assert!(result.has_broken_links);
    assert!(!result.has_error);
    assert_eq!(result.progress, 100);
    assert_eq!(result.rel.nofollow, 1);

    // only the two links nobody knew anything about were probed
    assert_eq!(fx.internal.calls(), 1);
    assert_eq!(fx.external.calls(), 1);

    let by_url = |url: &str| {
        result
            .links
            .iter()
            .find(|l| l.url == url)
            .unwrap_or_else(|| panic!("no record for {}", url))
    };

    let old = by_url("https://example.com/old");
    assert_eq!(old.status, LinkStatus::Redirect);
    assert_eq!(old.source, Some(Source::Observation));
    assert_eq!(old.redirect_target.as_deref(), Some("https://example.com/new"));

    for url in [
        "http://other.org/insecure",
        "http://example.com/plain",
        "http://blog.example.net/post",
    ] {
        let upgraded = by_url(url);
        assert_eq!(upgraded.status, LinkStatus::Redirect);
        assert_eq!(upgraded.status_code, Some(307));
        assert_eq!(upgraded.source, Some(Source::Heuristic));
    }

    for url in ["https://example.com/missing", "https://example.com/removed"] {
        let broken = by_url(url);
        assert_eq!(broken.status, LinkStatus::Broken);
        assert_eq!(broken.status_code, Some(404));
        assert_eq!(broken.source, Some(Source::Observation));
    }
    assert!(by_url("https://example.com/removed").rel.nofollow);

    for url in ["https://example.com/docs", "https://other.org/about"] {
        let fresh = by_url(url);
        assert_eq!(fresh.status, LinkStatus::Valid);
        assert_eq!(fresh.source, Some(Source::ActiveProbe));
    }

    assert!(result.links.iter().all(|l| l.status.is_terminal()));
}

#[tokio::test]
async fn test_known_destination_is_valid_without_a_request() {
    let fx = fixture(Duration::ZERO);
    let page = Page::from_html(
        PAGE_URL,
        r#"<a href="/old">old</a> <a href="/new">new</a>"#,
    )
    .unwrap();

    let result = fx.orchestrator.scan_links(&page, ScanOptions::default()).await;

    assert_eq!(result.counts.redirect, 1);
    assert_eq!(result.counts.valid, 1);
    assert_eq!(fx.internal.calls() + fx.external.calls(), 0);

    let new = result
        .links
        .iter()
        .find(|l| l.url == "https://example.com/new")
        .unwrap();
    assert_eq!(new.status, LinkStatus::Valid);
    assert_eq!(new.source, Some(Source::Observation));
}

#[tokio::test]
async fn test_results_are_kept_per_page() {
    let fx = fixture(Duration::ZERO);
    assert!(fx.orchestrator.existing_results(PAGE_URL).await.is_none());

    let result = fx
        .orchestrator
        .scan_links(&scenario_page(), ScanOptions::default())
        .await;
    let kept = fx.orchestrator.existing_results(PAGE_URL).await.unwrap();

    assert_eq!(kept, result);
}

#[tokio::test]
async fn test_overlapping_starts_share_one_session() {
    let fx = fixture(Duration::from_millis(20));
    let page = scenario_page();

    let (first, second) = tokio::join!(
        fx.orchestrator.start(&page, ScanOptions::default()),
        fx.orchestrator.start(&page, ScanOptions::default()),
    );

    let results = [first, second];
    let completed = results
        .iter()
        .filter(|r| r.state == ScanState::Completed)
        .count();
    assert_eq!(completed, 1);
    assert!(results.iter().any(|r| r.state.is_running()));

    // same probes as a single scan
    assert_eq!(fx.internal.calls(), 1);
    assert_eq!(fx.external.calls(), 1);
}

#[tokio::test]
async fn test_finished_is_emitted_once() {
    let fx = fixture(Duration::ZERO);
    let mut events = fx.orchestrator.subscribe();

    fx.orchestrator
        .scan_links(&scenario_page(), ScanOptions::default())
        .await;

    let mut finished = 0;
    let mut last_progress = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            ScanEvent::Progress { progress, page_url } => {
                assert_eq!(page_url, PAGE_URL);
                assert!(progress >= last_progress);
                last_progress = progress;
            }
            ScanEvent::Finished(result) => {
                finished += 1;
                assert_eq!(result.state, ScanState::Completed);
            }
        }
    }
    assert_eq!(finished, 1);
}

#[tokio::test]
async fn test_disabled_checks_probe_nothing() {
    let fx = fixture(Duration::ZERO);
    let options = ScanOptions {
        check_external: false,
        check_internal: false,
        ..ScanOptions::default()
    };

    let result = fx.orchestrator.scan_links(&scenario_page(), options).await;

    assert_eq!(fx.internal.calls() + fx.external.calls(), 0);
    assert_eq!(result.total, 10);
    assert!(result.is_consistent());
    // the three http links still get the https shortcut; every other
    // checkable link is skipped, observed or not
    assert_eq!(result.counts.redirect, 3);
    assert_eq!(result.counts.valid, 0);
    assert_eq!(result.counts.broken, 0);
    assert_eq!(result.counts.skipped, 7);
}

#[tokio::test]
async fn test_scan_over_http() {
    let server = MockServer::start().await;
    let html = r#"
        <a href="/ok">ok</a>
        <a href="/gone">gone</a>
        <a href="/moved">moved</a>
        <a href="/ok">ok again</a>
    "#;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .mount(&server)
        .await;
    // /ok may be settled as the destination of /moved without a request
    Mock::given(method("HEAD"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200))
        .expect(..=1)
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/moved"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("Location", format!("{}/ok", server.uri())),
        )
        .mount(&server)
        .await;

    let store = StoreHandle::spawn(ObservationStore::new());
    let client = monitored_client(store.clone(), Duration::from_secs(5)).unwrap();
    let probes = ProbeChannels::connect(&store, &ResolverConfig::default()).unwrap();
    let orchestrator = ScanOrchestrator::new(store.clone(), probes);

    let page_url = format!("{}/page", server.uri());
    let result = orchestrator
        .fetch_and_scan(&client, &page_url, ScanOptions::default())
        .await;

    assert_eq!(result.state, ScanState::Completed);
    assert_eq!(result.total, 4);
    assert_eq!(result.counts.valid, 2);
    assert_eq!(result.counts.broken, 1);
    assert_eq!(result.counts.redirect, 1);

    let moved = result.links.iter().find(|l| l.url.ends_with("/moved")).unwrap();
    assert_eq!(moved.redirect_target, Some(format!("{}/ok", server.uri())));
}

#[tokio::test]
async fn test_same_host_answers_reach_the_store() {
    let server = MockServer::start().await;
    let html = r#"<a href="/gone">gone</a> <a href="/moved">moved</a>"#;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/moved"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("Location", format!("{}/here", server.uri())),
        )
        .mount(&server)
        .await;

    let store = StoreHandle::spawn(ObservationStore::new());
    let client = monitored_client(store.clone(), Duration::from_secs(5)).unwrap();
    let probes = ProbeChannels::connect(&store, &ResolverConfig::default()).unwrap();
    let orchestrator = ScanOrchestrator::new(store.clone(), probes);

    let result = orchestrator
        .fetch_and_scan(&client, &format!("{}/page", server.uri()), ScanOptions::default())
        .await;
    assert!(result.links.iter().all(|l| l.is_internal));

    let gone = store
        .lookup(&format!("{}/gone", server.uri()))
        .await
        .unwrap()
        .expect("404 was not recorded");
    assert!(gone.is_broken());
    assert_eq!(gone.status_code, 404);

    let moved = store
        .lookup(&format!("{}/moved", server.uri()))
        .await
        .unwrap()
        .expect("301 was not recorded");
    assert!(moved.is_redirect());
    assert_eq!(moved.status_code, 301);
    assert_eq!(moved.redirect_url, Some(format!("{}/here", server.uri())));
}

#[tokio::test]
async fn test_unreachable_page_fails_with_a_result() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let store = StoreHandle::spawn(ObservationStore::new());
    let client = monitored_client(store.clone(), Duration::from_secs(5)).unwrap();
    let internal = TableProbe::new(&[], Duration::ZERO);
    let external = TableProbe::new(&[], Duration::ZERO);
    let probes = ProbeChannels {
        internal: internal.clone(),
        external: external.clone(),
    };
    let orchestrator = ScanOrchestrator::new(store.clone(), probes);
    let mut events = orchestrator.subscribe();

    let page_url = format!("{}/page", server.uri());
    let result = orchestrator
        .fetch_and_scan(&client, &page_url, ScanOptions::default())
        .await;

    assert_eq!(result.state, ScanState::Failed);
    assert!(result.has_error);
    assert!(result.error_message.as_deref().unwrap().contains("500"));
    assert_eq!(result.total, 0);
    assert!(result.is_consistent());
    assert!(result.duration_ms.is_some());
    assert_eq!(internal.calls() + external.calls(), 0);

    let mut finished = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let ScanEvent::Finished(done) = event {
            finished.push(done);
        }
    }
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].state, ScanState::Failed);

    assert_eq!(orchestrator.existing_results(&page_url).await, Some(result));

    // the failed fetch is itself an observation
    let page = store.lookup(&page_url).await.unwrap().unwrap();
    assert!(page.is_broken());
    assert_eq!(page.status_code, 500);
}
