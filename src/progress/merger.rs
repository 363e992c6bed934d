//! Standing progress subscription for the active session

use super::{ProgressFeed, ProgressSnapshot};
use futures::StreamExt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Snapshot cell shared between the feed task and the coordinator.
///
/// Every write holds the gate lock, so a feed update can never land between
/// a suspend and the reset of the next exchange.
struct SharedProgress {
    accepting: Mutex<bool>,
    snapshot_tx: watch::Sender<ProgressSnapshot>,
}

impl SharedProgress {
    fn replace(&self, snapshot: ProgressSnapshot) {
        self.snapshot_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }

    /// Feed write; dropped while intake is closed
    fn publish(&self, snapshot: ProgressSnapshot) -> bool {
        let accepting = self.accepting.lock().unwrap_or_else(PoisonError::into_inner);
        if !*accepting {
            return false;
        }
        self.replace(snapshot);
        true
    }

    fn set_intake(&self, open: bool) {
        let mut accepting = self.accepting.lock().unwrap_or_else(PoisonError::into_inner);
        *accepting = open;
        self.replace(ProgressSnapshot::default());
    }

    fn clear(&self) {
        let _accepting = self.accepting.lock().unwrap_or_else(PoisonError::into_inner);
        self.replace(ProgressSnapshot::default());
    }
}

/// Cloneable handle that can close progress intake from outside the
/// coordinator (used by the cancel path).
#[derive(Clone)]
pub struct ProgressGate {
    shared: Arc<SharedProgress>,
}

impl ProgressGate {
    /// Clear the snapshot and ignore feed updates until the next reset
    pub fn suspend(&self) {
        self.shared.set_intake(false);
    }
}

struct Subscription {
    session_id: String,
    cancel: CancellationToken,
    _task: JoinHandle<()>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Merges the out-of-band progress feed into a single snapshot
pub struct ProgressMerger {
    feed: Arc<dyn ProgressFeed>,
    shared: Arc<SharedProgress>,
    subscription: Option<Subscription>,
    reconnect_delay: Duration,
}

impl ProgressMerger {
    pub fn new(feed: Arc<dyn ProgressFeed>) -> Self {
        let (snapshot_tx, _) = watch::channel(ProgressSnapshot::default());
        Self {
            feed,
            shared: Arc::new(SharedProgress {
                accepting: Mutex::new(true),
                snapshot_tx,
            }),
            subscription: None,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }

    #[allow(dead_code)] // Useful for tests
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Current snapshot (whole, never half-updated)
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.shared.snapshot_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.shared.snapshot_tx.subscribe()
    }

    pub fn gate(&self) -> ProgressGate {
        ProgressGate {
            shared: self.shared.clone(),
        }
    }

    /// Session the feed is currently subscribed for
    pub fn session_id(&self) -> Option<&str> {
        self.subscription.as_ref().map(|s| s.session_id.as_str())
    }

    /// Start of a new exchange: clear stale progress and reopen intake
    pub fn reset(&mut self) {
        self.shared.set_intake(true);
    }

    /// Cancellation: clear and stop accepting until the next reset
    pub fn suspend(&mut self) {
        self.shared.set_intake(false);
    }

    /// Follow the session identifier.
    ///
    /// The subscription is kept when the session is unchanged, torn down
    /// when it goes away, and re-established for a different session. Must
    /// be called from within a tokio runtime.
    pub fn set_session(&mut self, session_id: Option<&str>) {
        if self.session_id() == session_id {
            return;
        }

        if let Some(old) = self.subscription.take() {
            tracing::info!(session_id = %old.session_id, "Closing progress subscription");
        }
        self.shared.clear();

        let Some(session_id) = session_id else {
            return;
        };

        tracing::info!(session_id, "Opening progress subscription");
        let cancel = CancellationToken::new();
        let task = tokio::spawn(follow_feed(
            self.feed.clone(),
            self.shared.clone(),
            session_id.to_string(),
            cancel.clone(),
            self.reconnect_delay,
        ));
        self.subscription = Some(Subscription {
            session_id: session_id.to_string(),
            cancel,
            _task: task,
        });
    }
}

/// Subscription loop: consume the feed, reconnect after a pause when it
/// drops, stop when the token fires.
async fn follow_feed(
    feed: Arc<dyn ProgressFeed>,
    shared: Arc<SharedProgress>,
    session_id: String,
    cancel: CancellationToken,
    reconnect_delay: Duration,
) {
    loop {
        let subscribed = tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            result = feed.subscribe(&session_id) => result,
        };

        match subscribed {
            Ok(mut stream) => loop {
                let item = tokio::select! {
                    biased;
                    () = cancel.cancelled() => return,
                    item = stream.next() => item,
                };
                match item {
                    Some(Ok(snapshot)) => {
                        let tasks = snapshot.tasks.len();
                        if shared.publish(snapshot) {
                            tracing::debug!(session_id = %session_id, tasks, "Progress snapshot replaced");
                        } else {
                            tracing::debug!(session_id = %session_id, "Progress update ignored while suspended");
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!(session_id = %session_id, error = %e, "Progress feed error");
                        break;
                    }
                    None => {
                        tracing::debug!(session_id = %session_id, "Progress feed closed");
                        break;
                    }
                }
            },
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "Progress subscription failed");
            }
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            () = tokio::time::sleep(reconnect_delay) => {}
        }
    }
}
