// src/resolve/recording.rs
// =============================================================================
// Feeds probe answers back into the observation store.
//
// A probe is a real request, so whatever it learns is an observation like
// any other: a 3xx with a Location becomes a Redirect, a 4xx/5xx becomes
// Broken. RecordingProbe wraps any channel and records every answer before
// returning it; the bridge worker records through the same function.
// =============================================================================

use async_trait::async_trait;
use std::sync::Arc;

use super::probe::{ProbeChannel, ProbeOutcome};
use crate::error::LinkError;
use crate::observe::StoreHandle;

pub struct RecordingProbe {
    inner: Arc<dyn ProbeChannel>,
    store: StoreHandle,
}

impl RecordingProbe {
    pub fn new(inner: Arc<dyn ProbeChannel>, store: StoreHandle) -> Self {
        RecordingProbe { inner, store }
    }
}

#[async_trait]
impl ProbeChannel for RecordingProbe {
    async fn probe(&self, url: &str) -> Result<ProbeOutcome, LinkError> {
        let result = self.inner.probe(url).await;
        record_outcome(&self.store, url, &result);
        result
    }
}

// Reachable answers and failures teach the store nothing
pub(super) fn record_outcome(
    store: &StoreHandle,
    url: &str,
    result: &Result<ProbeOutcome, LinkError>,
) {
    match result {
        Ok(ProbeOutcome::Redirect {
            status_code,
            location: Some(location),
        }) => store.record_redirect(url, *status_code, location),
        Ok(ProbeOutcome::Broken { status_code }) => store.record_broken(url, *status_code),
        _ => {}
    }
}
