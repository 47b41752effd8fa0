// src/lib.rs
// =============================================================================
// link-health: finds broken, redirecting and spam links on a web page.
//
// Layers, bottom to top:
// - classify: pure URL and rel-attribute rules, no I/O
// - observe: redirects and errors seen in real traffic, kept for an hour
// - resolve: one URL -> one classification (store, heuristics, probes)
// - scan: one page -> one aggregate result
//
// The binary (src/main.rs) is a thin CLI over `scan` and `resolve`.
// =============================================================================

pub mod classify;
pub mod config;
pub mod error;
pub mod observe;
pub mod resolve;
pub mod scan;

pub use config::{OrchestratorConfig, ResolverConfig, ScanOptions};
pub use error::LinkError;
