// src/resolve/bridge.rs
// =============================================================================
// The bridged probe channel used for off-host links.
//
// Off-host probes are not sent from the scanning task itself. They are
// handed over a message channel to a separate long-lived probe worker,
// which does the request and reports the outcome to the observation store
// whether or not anybody is still waiting for the answer.
//
// The scanner only waits a short while (the resolution timeout, ~1s) even
// though the request itself may take up to the network timeout (~5s):
//
//   scanner ──ProbeRequest──> worker ──HEAD──> server
//      │  (waits <= 1s)          │   (<= 5s)
//      │<────── reply ───────────┤
//                                └──> observation store (always)
//
// A late answer is lost to this scan but not to the next one.
// =============================================================================

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use super::probe::{ProbeChannel, ProbeOutcome};
use super::recording::record_outcome;
use crate::error::LinkError;
use crate::observe::StoreHandle;

struct ProbeRequest {
    url: String,
    reply: oneshot::Sender<Result<ProbeOutcome, LinkError>>,
}

/// How a wait for a single answer ended
#[derive(Debug, PartialEq, Eq)]
pub enum Settled<T> {
    Answered(T),
    /// The answering side went away without replying
    Abandoned,
    TimedOut,
}

// Waits for exactly one answer or the deadline, whichever comes first.
// The loser of the race can't produce a second result: on timeout the
// receiver is dropped, so a late reply has nowhere to go.
pub async fn first_answer<T>(rx: oneshot::Receiver<T>, deadline: Duration) -> Settled<T> {
    match tokio::time::timeout(deadline, rx).await {
        Ok(Ok(answer)) => Settled::Answered(answer),
        Ok(Err(_)) => Settled::Abandoned,
        Err(_) => Settled::TimedOut,
    }
}

#[derive(Clone)]
pub struct BridgeProbe {
    tx: mpsc::UnboundedSender<ProbeRequest>,
    answer_timeout: Duration,
}

impl BridgeProbe {
    // Starts the probe worker. Every request it receives is probed with
    // `probe` in its own task, and the outcome is recorded into `store`.
    pub fn spawn(
        probe: Arc<dyn ProbeChannel>,
        store: StoreHandle,
        answer_timeout: Duration,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(probe, store, rx));
        BridgeProbe { tx, answer_timeout }
    }
}

#[async_trait]
impl ProbeChannel for BridgeProbe {
    async fn probe(&self, url: &str) -> Result<ProbeOutcome, LinkError> {
        let (reply, rx) = oneshot::channel();
        let request = ProbeRequest {
            url: url.to_string(),
            reply,
        };

        if self.tx.send(request).is_err() {
            return Err(LinkError::ProbeChannelUnavailable);
        }

        match first_answer(rx, self.answer_timeout).await {
            Settled::Answered(result) => result,
            Settled::Abandoned => Err(LinkError::ProbeChannelUnavailable),
            Settled::TimedOut => Err(LinkError::NetworkTimeout(url.to_string())),
        }
    }
}

async fn run_worker(
    probe: Arc<dyn ProbeChannel>,
    store: StoreHandle,
    mut rx: mpsc::UnboundedReceiver<ProbeRequest>,
) {
    while let Some(request) = rx.recv().await {
        let probe = Arc::clone(&probe);
        let store = store.clone();

        tokio::spawn(async move {
            let result = probe.probe(&request.url).await;
            record_outcome(&store, &request.url, &result);

            if request.reply.send(result).is_err() {
                debug!(url = %request.url, "probe answered after the scanner stopped waiting");
            }
        });
    }
}
