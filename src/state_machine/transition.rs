//! Pure stream transition function
//!
//! `chunk` appends, a partial `response` replaces, and the first terminal
//! event settles the exchange. Settled is absorbing: later content is
//! ignored, but a trailing `end` may still hand over the session identifier.

use super::{Effect, SettledOutcome, StreamEvent, StreamState};

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: StreamState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: StreamState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Pure transition function
///
/// Given the same state and event it always produces the same result and
/// performs no I/O; the owner applies the effects.
pub fn transition(state: &StreamState, event: StreamEvent) -> TransitionResult {
    match (state, event) {
        // ============================================================
        // Settled absorbs everything except the session handover
        // ============================================================
        (StreamState::Settled { outcome }, StreamEvent::End { session_id }) => {
            TransitionResult::new(StreamState::Settled { outcome: *outcome })
                .with_effects(session_id.map(Effect::record_session))
        }

        (StreamState::Settled { outcome }, _) => {
            TransitionResult::new(StreamState::Settled { outcome: *outcome })
        }

        // ============================================================
        // Incremental text
        // ============================================================
        (StreamState::Idle, StreamEvent::Chunk { text }) => {
            TransitionResult::new(StreamState::Streaming { buffer: text })
        }

        (StreamState::Streaming { buffer }, StreamEvent::Chunk { text }) => {
            let mut buffer = buffer.clone();
            buffer.push_str(&text);
            TransitionResult::new(StreamState::Streaming { buffer })
        }

        // Partial responses are running snapshots, never deltas
        (
            StreamState::Idle | StreamState::Streaming { .. },
            StreamEvent::Response {
                text,
                partial: true,
            },
        ) => TransitionResult::new(StreamState::Streaming { buffer: text }),

        // ============================================================
        // Terminal events
        // ============================================================
        (
            StreamState::Idle | StreamState::Streaming { .. },
            StreamEvent::Response {
                text,
                partial: false,
            },
        ) => TransitionResult::new(StreamState::Settled {
            outcome: SettledOutcome::Completed,
        })
        .with_effect(Effect::complete(text)),

        (StreamState::Idle, StreamEvent::End { session_id }) => {
            TransitionResult::new(StreamState::Settled {
                outcome: SettledOutcome::Completed,
            })
            .with_effects(session_id.map(Effect::record_session))
        }

        // Final text arrived only through chunks: flush it
        (StreamState::Streaming { buffer }, StreamEvent::End { session_id }) => {
            let flushed = (!buffer.is_empty()).then(|| Effect::complete(buffer.clone()));
            TransitionResult::new(StreamState::Settled {
                outcome: SettledOutcome::Completed,
            })
            .with_effects(flushed)
            .with_effects(session_id.map(Effect::record_session))
        }

        (StreamState::Idle | StreamState::Streaming { .. }, StreamEvent::Error { message }) => {
            TransitionResult::new(StreamState::Settled {
                outcome: SettledOutcome::Failed,
            })
            .with_effect(Effect::fail(message))
        }

        // ============================================================
        // Progress notices carry no text
        // ============================================================
        (state @ (StreamState::Idle | StreamState::Streaming { .. }), StreamEvent::Progress) => {
            TransitionResult::new(state.clone())
        }
    }
}
