// src/scan/mod.rs
// =============================================================================
// Scanning one page: its anchors, the session that tracks them, and the
// orchestrator that drives a session through its phases.
//
// Submodules:
// - page: the HTML document and the anchor query
// - session: link records, counters, and the aggregate result
// - progress: scan events and progress throttling
// - orchestrator: the phase state machine, one session per page
// =============================================================================

mod orchestrator;
mod page;
mod progress;
mod session;

pub use orchestrator::ScanOrchestrator;
pub use page::{Anchor, Page};
pub use progress::{resolving_progress, ProgressThrottle, ScanEvent};
pub use session::{Counters, LinkRecord, LinkStatus, ScanResult, ScanSession, ScanState};
