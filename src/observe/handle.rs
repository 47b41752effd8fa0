// src/observe/handle.rs
// =============================================================================
// The observation store runs as one long-lived background task. Everyone
// else talks to it through a cloneable StoreHandle:
//
// - writes (record_redirect / record_broken) are fire-and-forget messages,
//   so they can be sent from sync code such as a redirect policy callback
// - reads send a request carrying a oneshot reply channel and await it
//
// The task processes one message at a time, so the store never needs a
// lock. The periodic TTL sweep runs inside the same loop.
// =============================================================================

use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use super::store::{
    BatchCheck, BatchLookup, Observation, ObservationStore, RedirectCheck, TargetMembership,
};
use crate::error::LinkError;

/// How often expired observations are swept
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(15 * 60);

enum StoreCommand {
    RecordRedirect {
        source_url: String,
        status_code: u16,
        redirect_url: String,
    },
    RecordBroken {
        url: String,
        status_code: u16,
    },
    Lookup {
        url: String,
        reply: oneshot::Sender<Option<Observation>>,
    },
    BatchLookup {
        urls: Vec<String>,
        reply: oneshot::Sender<BatchLookup>,
    },
    BatchCheck {
        urls: Vec<String>,
        reply: oneshot::Sender<BatchCheck>,
    },
    IsRedirectTarget {
        url: String,
        reply: oneshot::Sender<TargetMembership>,
    },
    CheckRedirect {
        url: String,
        reply: oneshot::Sender<RedirectCheck>,
    },
    Sweep {
        reply: oneshot::Sender<usize>,
    },
}

#[derive(Clone, Debug)]
pub struct StoreHandle {
    tx: mpsc::UnboundedSender<StoreCommand>,
}

impl StoreHandle {
    // Moves the store into a background task and returns its handle.
    // Must be called from inside a tokio runtime.
    pub fn spawn(store: ObservationStore) -> Self {
        Self::spawn_with_interval(store, SWEEP_INTERVAL)
    }

    pub fn spawn_with_interval(store: ObservationStore, sweep_every: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_store(store, rx, sweep_every));
        StoreHandle { tx }
    }

    pub fn record_redirect(&self, source_url: &str, status_code: u16, redirect_url: &str) {
        self.send(StoreCommand::RecordRedirect {
            source_url: source_url.to_string(),
            status_code,
            redirect_url: redirect_url.to_string(),
        });
    }

    pub fn record_broken(&self, url: &str, status_code: u16) {
        self.send(StoreCommand::RecordBroken {
            url: url.to_string(),
            status_code,
        });
    }

    pub async fn lookup(&self, url: &str) -> Result<Option<Observation>, LinkError> {
        let url = url.to_string();
        self.request(|reply| StoreCommand::Lookup { url, reply }).await
    }

    pub async fn batch_lookup(&self, urls: Vec<String>) -> Result<BatchLookup, LinkError> {
        self.request(|reply| StoreCommand::BatchLookup { urls, reply })
            .await
    }

    // One round trip for a whole set of URLs
    pub async fn batch_check_links(&self, urls: Vec<String>) -> Result<BatchCheck, LinkError> {
        self.request(|reply| StoreCommand::BatchCheck { urls, reply })
            .await
    }

    pub async fn is_redirect_target(&self, url: &str) -> Result<TargetMembership, LinkError> {
        let url = url.to_string();
        self.request(|reply| StoreCommand::IsRedirectTarget { url, reply })
            .await
    }

    pub async fn check_redirect(&self, url: &str) -> Result<RedirectCheck, LinkError> {
        let url = url.to_string();
        self.request(|reply| StoreCommand::CheckRedirect { url, reply })
            .await
    }

    // Forces a sweep now instead of waiting for the next tick
    pub async fn sweep(&self) -> Result<usize, LinkError> {
        self.request(|reply| StoreCommand::Sweep { reply }).await
    }

    fn send(&self, command: StoreCommand) {
        if self.tx.send(command).is_err() {
            debug!("observation store is gone, dropping write");
        }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> StoreCommand,
    ) -> Result<T, LinkError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .map_err(|_| LinkError::StoreUnavailable)?;
        rx.await.map_err(|_| LinkError::StoreUnavailable)
    }
}

async fn run_store(
    mut store: ObservationStore,
    mut rx: mpsc::UnboundedReceiver<StoreCommand>,
    sweep_every: Duration,
) {
    let mut ticker = tokio::time::interval(sweep_every);
    // the first tick fires immediately, nothing to sweep yet
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;

            _ = ticker.tick() => {
                let removed = store.sweep();
                if removed > 0 {
                    debug!(removed, remaining = store.len(), "swept expired observations");
                }
            }
            command = rx.recv() => match command {
                Some(command) => apply(&mut store, command),
                None => break,
            },
        }
    }

    debug!("observation store task stopped");
}

fn apply(store: &mut ObservationStore, command: StoreCommand) {
    // A dropped reply receiver just means the asker stopped waiting
    match command {
        StoreCommand::RecordRedirect {
            source_url,
            status_code,
            redirect_url,
        } => {
            debug!(%source_url, status_code, %redirect_url, "observed redirect");
            store.record_redirect(&source_url, status_code, &redirect_url);
        }
        StoreCommand::RecordBroken { url, status_code } => {
            debug!(%url, status_code, "observed error response");
            store.record_broken(&url, status_code);
        }
        StoreCommand::Lookup { url, reply } => {
            let _ = reply.send(store.lookup(&url).cloned());
        }
        StoreCommand::BatchLookup { urls, reply } => {
            let _ = reply.send(store.batch_lookup(&urls));
        }
        StoreCommand::BatchCheck { urls, reply } => {
            let _ = reply.send(store.batch_check(&urls));
        }
        StoreCommand::IsRedirectTarget { url, reply } => {
            let _ = reply.send(store.is_redirect_target(&url));
        }
        StoreCommand::CheckRedirect { url, reply } => {
            let _ = reply.send(store.check_redirect(&url));
        }
        StoreCommand::Sweep { reply } => {
            let removed = store.sweep();
            debug!(removed, "forced sweep");
            let _ = reply.send(removed);
        }
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why a task that owns the store instead of a shared lock?
//    - Only one piece of code ever touches the maps, so no locking at all
//    - Callers talk to it through a channel, like sending it a letter
//
// 2. What is a oneshot channel?
//    - A channel that carries exactly one value
//    - Each read sends one along with its command; the store task answers
//      through it and the caller awaits the answer
//
// 3. Why are writes fire-and-forget?
//    - Recording an observation happens inside an HTTP redirect hook, which
//      can't await; an unbounded send never blocks
// -----------------------------------------------------------------------------
