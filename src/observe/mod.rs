// src/observe/mod.rs
// =============================================================================
// Everything we learn about URLs passively, from real network traffic.
//
// Submodules:
// - store: the observation/chain maps and their lookups (plain data)
// - handle: the background task owning the store, and its async handle
// - monitor: HTTP clients and hooks that feed observations in
// =============================================================================

mod handle;
mod monitor;
mod store;

pub use handle::{StoreHandle, SWEEP_INTERVAL};
pub use monitor::{monitored_client, observe_response};
pub use store::{
    classify_error, classify_redirect, BatchCheck, BatchLookup, Observation, ObservationKind,
    ObservationStore, RedirectCheck, TargetMembership, OBSERVATION_TTL_SECS,
};
