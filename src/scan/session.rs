// src/scan/session.rs
// =============================================================================
// One scan session: the links found on a page, their statuses, and the
// aggregate counters derived from them.
//
// Lifecycle:
//   Idle -> Collecting -> PreScanning -> Resolving -> Finalizing
//        -> Completed | Failed
//
// Invariants kept here:
// - a link moves from Unknown to a terminal status at most once
// - counters are bumped exactly when a link becomes terminal, so
//   the order links resolve in never matters
// - once Completed, total == valid + broken + redirect + nofollow
//   + skipped + spam
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tokio::time::Instant;

use super::page::Anchor;
use crate::classify::{RelFlags, RelTally};
use crate::config::ScanOptions;
use crate::error::LinkError;
use crate::resolve::{Resolution, Source};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Unknown,
    Valid,
    Broken,
    Redirect,
    Skipped,
    Spam,
}

impl LinkStatus {
    pub fn is_terminal(self) -> bool {
        self != LinkStatus::Unknown
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    Idle,
    Collecting,
    PreScanning,
    Resolving,
    Finalizing,
    Completed,
    Failed,
}

impl ScanState {
    // A second scan of the page is refused while this is true
    pub fn is_running(self) -> bool {
        matches!(
            self,
            ScanState::Collecting | ScanState::PreScanning | ScanState::Resolving
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkRecord {
    pub url: String,
    /// Index of the owning anchor on the page
    pub element: usize,
    pub text: String,
    pub is_internal: bool,
    pub rel: RelFlags,
    pub status: LinkStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl LinkRecord {
    pub fn new(anchor: &Anchor, url: String, is_internal: bool) -> Self {
        LinkRecord {
            url,
            element: anchor.index,
            text: anchor.text.clone(),
            is_internal,
            rel: anchor.rel,
            status: LinkStatus::Unknown,
            status_code: None,
            redirect_target: None,
            source: None,
            note: None,
        }
    }

    // Moves the record to a terminal status. Returns false (and changes
    // nothing) if it already had one.
    pub fn settle(&mut self, status: LinkStatus, source: Source, note: Option<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = status;
        self.source = Some(source);
        self.note = note;
        true
    }

    pub fn apply(&mut self, resolution: &Resolution) -> bool {
        let status = if resolution.is_broken {
            LinkStatus::Broken
        } else if resolution.is_redirect {
            LinkStatus::Redirect
        } else {
            LinkStatus::Valid
        };

        let note = match (&resolution.redirect_source, resolution.inconclusive) {
            (Some(from), _) => Some(format!("redirect destination of {}", from)),
            (None, true) if resolution.is_redirect => Some("guessed, not probed".to_string()),
            (None, true) => Some("no definitive answer, assumed valid".to_string()),
            (None, false) => None,
        };

        if !self.settle(status, resolution.source, note) {
            return false;
        }
        self.status_code = resolution.status_code;
        self.redirect_target = resolution.redirect_url.clone();
        true
    }
}

/// Category counters. Every terminal link lands in exactly one of them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    pub valid: usize,
    pub broken: usize,
    pub redirect: usize,
    pub nofollow: usize,
    pub skipped: usize,
    pub spam: usize,
}

impl Counters {
    pub fn count(&mut self, record: &LinkRecord) {
        match record.status {
            LinkStatus::Skipped => self.skipped += 1,
            LinkStatus::Spam => self.spam += 1,
            LinkStatus::Broken => self.broken += 1,
            LinkStatus::Redirect => self.redirect += 1,
            LinkStatus::Valid if record.rel.nofollow => self.nofollow += 1,
            LinkStatus::Valid => self.valid += 1,
            LinkStatus::Unknown => {}
        }
    }

    pub fn sum(&self) -> usize {
        self.valid + self.broken + self.redirect + self.nofollow + self.skipped + self.spam
    }
}

/// The aggregate handed back to callers, complete or not
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanResult {
    pub page_url: String,
    pub state: ScanState,
    pub total: usize,
    #[serde(flatten)]
    pub counts: Counters,
    pub rel: RelTally,
    pub has_redirects: bool,
    pub has_broken_links: bool,
    pub has_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    pub links: Vec<LinkRecord>,
}

impl ScanResult {
    pub fn is_consistent(&self) -> bool {
        self.total == self.counts.sum()
    }
}

#[derive(Debug)]
pub struct ScanSession {
    page_url: String,
    options: ScanOptions,
    state: ScanState,
    links: Vec<LinkRecord>,
    counters: Counters,
    rel: RelTally,
    // set when collection ends, checked again when finalizing
    total: usize,
    progress: u8,
    started: Option<Instant>,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    duration_ms: Option<u64>,
    error: Option<String>,
    warnings: Vec<String>,
}

impl ScanSession {
    pub fn new(page_url: &str, options: ScanOptions) -> Self {
        ScanSession {
            page_url: page_url.to_string(),
            options,
            state: ScanState::Idle,
            links: Vec::new(),
            counters: Counters::default(),
            rel: RelTally::default(),
            total: 0,
            progress: 0,
            started: None,
            start_time: None,
            end_time: None,
            duration_ms: None,
            error: None,
            warnings: Vec::new(),
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    pub fn begin(&mut self) {
        self.state = ScanState::Collecting;
        self.started = Some(Instant::now());
        self.start_time = Some(Utc::now());
    }

    pub fn enter(&mut self, state: ScanState) {
        self.state = state;
    }

    pub fn push(&mut self, record: LinkRecord) {
        self.rel.add(record.rel);
        self.counters.count(&record);
        self.links.push(record);
    }

    // Collection is over: remember how many links we expect to account for
    pub fn seal_collection(&mut self) {
        self.total = self.links.len();
    }

    // Applies a resolution to every still-unknown record with this URL.
    // Returns how many records changed.
    pub fn settle_url(&mut self, url: &str, resolution: &Resolution) -> usize {
        let mut settled = 0;
        for record in self.links.iter_mut().filter(|r| r.url == url) {
            if record.apply(resolution) {
                self.counters.count(record);
                settled += 1;
            }
        }
        settled
    }

    // Distinct URLs still waiting for a status, first occurrence first
    pub fn pending_urls(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.links
            .iter()
            .filter(|r| r.status == LinkStatus::Unknown)
            .filter(|r| seen.insert(r.url.as_str()))
            .map(|r| r.url.clone())
            .collect()
    }

    pub fn set_progress(&mut self, progress: u8) {
        self.progress = progress.min(100);
    }

    // Recomputes the total from the counters. A disagreement with the total
    // sealed after collection is returned (and kept as a warning), never
    // treated as fatal.
    pub fn finalize(&mut self) -> Option<LinkError> {
        self.state = ScanState::Finalizing;

        let recomputed = self.counters.sum();
        let mismatch = (recomputed != self.total).then(|| LinkError::InvariantMismatch {
            stored: self.total,
            recomputed,
        });
        if let Some(err) = &mismatch {
            self.warnings.push(err.to_string());
        }

        self.total = recomputed;
        self.progress = 100;
        self.stamp_end();
        self.state = ScanState::Completed;
        mismatch
    }

    pub fn fail(&mut self, message: String) {
        self.total = self.counters.sum();
        self.error = Some(message);
        self.stamp_end();
        self.state = ScanState::Failed;
    }

    pub fn snapshot(&self) -> ScanResult {
        // totals are only final once the session is done; before that the
        // best answer is "what has been settled so far"
        let total = match self.state {
            ScanState::Completed | ScanState::Failed => self.total,
            _ => self.counters.sum(),
        };

        ScanResult {
            page_url: self.page_url.clone(),
            state: self.state,
            total,
            counts: self.counters,
            rel: self.rel,
            has_redirects: self.counters.redirect > 0,
            has_broken_links: self.counters.broken > 0,
            has_error: self.error.is_some(),
            error_message: self.error.clone(),
            warnings: self.warnings.clone(),
            progress: self.progress,
            start_time: self.start_time,
            end_time: self.end_time,
            duration_ms: self.duration_ms,
            links: self.links.clone(),
        }
    }

    fn stamp_end(&mut self) {
        self.end_time = Some(Utc::now());
        self.duration_ms = self
            .started
            .map(|started| started.elapsed().as_millis() as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchor(index: usize, rel: &str) -> Anchor {
        Anchor {
            index,
            href: String::new(),
            text: String::new(),
            rel: RelFlags::parse(rel),
        }
    }

    fn record(index: usize, url: &str, rel: &str) -> LinkRecord {
        LinkRecord::new(&anchor(index, rel), url.to_string(), true)
    }

    #[test]
    fn test_no_backtracking() {
        let mut rec = record(0, "https://a.com/", "");
        assert!(rec.apply(&Resolution::broken(404, Source::Observation)));
        assert!(!rec.apply(&Resolution::valid(Some(200), Source::ActiveProbe)));
        assert_eq!(rec.status, LinkStatus::Broken);
        assert_eq!(rec.status_code, Some(404));
    }

    #[test]
    fn test_nofollow_valid_counts_as_nofollow() {
        let mut counters = Counters::default();
        let mut rec = record(0, "https://a.com/", "nofollow");
        rec.apply(&Resolution::valid(Some(200), Source::ActiveProbe));
        counters.count(&rec);

        let mut broken = record(1, "https://a.com/x", "nofollow");
        broken.apply(&Resolution::broken(500, Source::ActiveProbe));
        counters.count(&broken);

        assert_eq!(counters.nofollow, 1);
        assert_eq!(counters.broken, 1);
        assert_eq!(counters.valid, 0);
    }

    #[test]
    fn test_duplicate_urls_settle_together() {
        let mut session = ScanSession::new("https://a.com/", ScanOptions::default());
        session.begin();
        session.push(record(0, "https://a.com/x", ""));
        session.push(record(1, "https://a.com/x", ""));
        session.push(record(2, "https://a.com/y", ""));
        session.seal_collection();

        assert_eq!(session.pending_urls(), vec!["https://a.com/x", "https://a.com/y"]);

        let settled = session.settle_url(
            "https://a.com/x",
            &Resolution::redirect(301, None, Source::Observation),
        );
        assert_eq!(settled, 2);
        assert_eq!(session.pending_urls(), vec!["https://a.com/y"]);

        session.settle_url("https://a.com/y", &Resolution::valid(None, Source::ActiveProbe));
        assert!(session.finalize().is_none());

        let result = session.snapshot();
        assert_eq!(result.state, ScanState::Completed);
        assert_eq!(result.total, 3);
        assert_eq!(result.counts.redirect, 2);
        assert!(result.has_redirects);
        assert!(result.is_consistent());
        assert!(result.duration_ms.is_some());
    }

    #[test]
    fn test_mismatch_is_healed_and_warned() {
        let mut session = ScanSession::new("https://a.com/", ScanOptions::default());
        session.begin();
        session.push(record(0, "https://a.com/x", ""));
        session.push(record(1, "https://a.com/y", ""));
        session.seal_collection();
        session.settle_url("https://a.com/x", &Resolution::valid(None, Source::ActiveProbe));

        let mismatch = session.finalize();
        assert_eq!(
            mismatch,
            Some(LinkError::InvariantMismatch {
                stored: 2,
                recomputed: 1
            })
        );

        let result = session.snapshot();
        assert_eq!(result.total, 1);
        assert!(result.is_consistent());
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_failed_session_keeps_partial_counts() {
        let mut session = ScanSession::new("https://a.com/", ScanOptions::default());
        session.begin();
        let mut rec = record(0, "https://a.com/x", "");
        rec.settle(LinkStatus::Skipped, Source::Heuristic, None);
        session.push(rec);

        session.fail("DOM query failed".to_string());

        let result = session.snapshot();
        assert_eq!(result.state, ScanState::Failed);
        assert!(result.has_error);
        assert_eq!(result.error_message.as_deref(), Some("DOM query failed"));
        assert_eq!(result.total, 1);
        assert!(!session.is_running());
    }
}
