//! Cancellation handle and the active-exchange guard

use crate::progress::ProgressGate;
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;

type ActiveSlot = Arc<Mutex<Option<CancellationToken>>>;

/// Cloneable handle for cancelling the in-flight exchange from another task
/// (e.g. a Ctrl-C listener).
#[derive(Clone)]
pub struct CancelHandle {
    slot: ActiveSlot,
    progress: ProgressGate,
}

impl CancelHandle {
    pub(super) fn new(progress: ProgressGate) -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
            progress,
        }
    }

    pub fn is_active(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Cancel the active exchange, if any.
    ///
    /// Marks the exchange inactive and closes progress intake before
    /// returning; the coordinator finishes the abort on its side. Returns
    /// false when nothing was in flight.
    pub fn cancel(&self) -> bool {
        let token = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(token) = token else {
            return false;
        };
        token.cancel();
        self.progress.suspend();
        tracing::info!("Exchange cancelled by user");
        true
    }

    /// Mark an exchange active. `None` if one already is.
    pub(super) fn begin(&self) -> Option<ActiveExchange> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return None;
        }
        let token = CancellationToken::new();
        *slot = Some(token.clone());
        Some(ActiveExchange {
            slot: self.slot.clone(),
            token,
        })
    }
}

/// Held for the lifetime of one exchange; releases the slot on drop,
/// including when the `send` future itself is dropped.
pub(super) struct ActiveExchange {
    slot: ActiveSlot,
    token: CancellationToken,
}

impl ActiveExchange {
    pub(super) fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for ActiveExchange {
    fn drop(&mut self) {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressMerger;
    use crate::testing::MockProgressFeed;

    fn handle() -> CancelHandle {
        let merger = ProgressMerger::new(Arc::new(MockProgressFeed::new()));
        CancelHandle::new(merger.gate())
    }

    #[test]
    fn test_cancel_without_exchange_is_noop() {
        let handle = handle();
        assert!(!handle.cancel());
        assert!(!handle.is_active());
    }

    #[test]
    fn test_only_one_exchange_at_a_time() {
        let handle = handle();
        let active = handle.begin().unwrap();
        assert!(handle.is_active());
        assert!(handle.begin().is_none());
        drop(active);
        assert!(!handle.is_active());
        assert!(handle.begin().is_some());
    }

    #[test]
    fn test_cancel_fires_token_and_releases_slot() {
        let handle = handle();
        let active = handle.begin().unwrap();
        assert!(handle.clone().cancel());
        assert!(active.token().is_cancelled());
        assert!(!handle.is_active());
        assert!(!handle.cancel());
    }
}
