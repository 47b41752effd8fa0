// src/config.rs
// =============================================================================
// Knobs for a scan, with their defaults.
//
// - ScanOptions: what the caller asks for on each scan (maps 1:1 onto CLI
//   flags and onto the JSON a UI layer would send)
// - ResolverConfig: the two timeout tiers used by active probes
// - OrchestratorConfig: pacing of batches and progress events
// =============================================================================

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-scan options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    /// Probe links pointing at other hosts
    pub check_external: bool,
    /// Probe links pointing at the page's own host
    pub check_internal: bool,
    /// Classify redirects at all; when off, a redirecting link is just valid
    pub detect_redirects: bool,
    /// Accepted and carried, not used by any retry logic yet
    pub max_retries: u32,
    /// How many links are resolved concurrently
    pub batch_size: usize,
    /// Timeout for fetching the page itself, in milliseconds
    pub timeout_ms: u64,
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions {
            check_external: true,
            check_internal: true,
            detect_redirects: true,
            max_retries: 2,
            batch_size: 5,
            timeout_ms: 10_000,
        }
    }
}

impl ScanOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    // A batch size of 0 would never make progress
    pub fn batch_size(&self) -> usize {
        self.batch_size.max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Outer tier: how long a probe request may run at all
    pub probe_timeout: Duration,
    /// Inner tier: how long a scan waits for a bridged probe's answer
    pub resolution_timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig {
            probe_timeout: Duration::from_secs(5),
            resolution_timeout: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Pause between resolution batches
    pub batch_pause: Duration,
    /// Minimum gap between two progress events
    pub progress_interval: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        OrchestratorConfig {
            batch_pause: Duration::from_millis(50),
            progress_interval: Duration::from_millis(200),
        }
    }
}
