// src/resolve/mod.rs
// =============================================================================
// Turning one URL into a Resolution.
//
// Submodules:
// - resolver: the ordered strategy (store, chains, heuristics, probes)
// - probe: the ProbeChannel seam and the direct HEAD implementation
// - bridge: the probe worker used for off-host links, with its
//   answer-or-timeout race
// - heuristic: the URL shortener table used when nothing can be probed
// - recording: writes probe answers back into the observation store
// =============================================================================

mod bridge;
mod heuristic;
mod probe;
mod recording;
mod resolver;

pub use bridge::{first_answer, BridgeProbe, Settled};
pub use heuristic::is_known_shortener;
pub use probe::{HttpProbe, ProbeChannel, ProbeOutcome};
pub use recording::RecordingProbe;
pub use resolver::{ProbeChannels, Resolution, Resolver, Source};
