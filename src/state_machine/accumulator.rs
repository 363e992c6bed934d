//! Stateful owner of the stream transition function

use super::{transition, Effect, SettledOutcome, StreamEvent, StreamSnapshot, StreamState};
use tokio::sync::watch;

/// Holds the accumulation state for the current exchange and publishes every
/// transition as a [`StreamSnapshot`].
///
/// Consumers call [`StreamAccumulator::subscribe`] and either await changes or
/// poll `borrow()`; nothing here knows about rendering.
pub struct StreamAccumulator {
    state: StreamState,
    snapshot_tx: watch::Sender<StreamSnapshot>,
}

impl Default for StreamAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamAccumulator {
    pub fn new() -> Self {
        let (snapshot_tx, _) = watch::channel(StreamSnapshot::default());
        Self {
            state: StreamState::Idle,
            snapshot_tx,
        }
    }

    pub fn state(&self) -> &StreamState {
        &self.state
    }

    pub fn subscribe(&self) -> watch::Receiver<StreamSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Back to `Idle` for a new exchange
    pub fn reset(&mut self) {
        self.set_state(StreamState::Idle);
    }

    /// Apply one event, returning the effects the owner must carry out
    pub fn apply(&mut self, event: StreamEvent) -> Vec<Effect> {
        let kind = event.kind();
        let result = transition(&self.state, event);
        tracing::debug!(
            event = kind,
            from = ?self.state.phase(),
            to = ?result.new_state.phase(),
            effects = result.effects.len(),
            "Stream transition"
        );
        self.set_state(result.new_state);
        result.effects
    }

    /// Drop whatever is buffered without emitting it and settle.
    ///
    /// Used on cancellation and timeout; the discarded text never becomes a
    /// message. Returns the number of bytes thrown away.
    pub fn abandon(&mut self) -> usize {
        let discarded = self.state.live_text().len();
        self.set_state(StreamState::Settled {
            outcome: SettledOutcome::Abandoned,
        });
        discarded
    }

    fn set_state(&mut self, state: StreamState) {
        self.state = state;
        let snapshot = self.state.snapshot();
        self.snapshot_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }
}
