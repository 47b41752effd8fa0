// src/scan/progress.rs
// =============================================================================
// Events a scan emits while it runs, and the throttle that keeps progress
// events from flooding listeners.
//
// Progress layout:
//   0..25    collecting anchors
//   25..50   pre-scan against the observation store
//   50..100  active resolution, batch by batch
// =============================================================================

use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

use super::session::ScanResult;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScanEvent {
    Progress { page_url: String, progress: u8 },
    Finished(ScanResult),
}

pub struct ProgressThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl ProgressThrottle {
    pub fn new(interval: Duration) -> Self {
        ProgressThrottle {
            interval,
            last: None,
        }
    }

    // True at most once per interval; the first call always passes
    pub fn ready(&mut self) -> bool {
        let now = Instant::now();
        match self.last {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

// Maps resolution progress onto the 50..100 range
pub fn resolving_progress(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let done = done.min(total);
    (50 + done * 50 / total) as u8
}
