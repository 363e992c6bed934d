//! Property-based tests for the stream state machine
//!
//! These tests verify key invariants hold across all event sequences.

use super::*;
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 .,!?]{0,16}"
}

fn arb_non_empty_text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 .,!?]{1,16}"
}

fn arb_session() -> impl Strategy<Value = Option<String>> {
    proptest::option::of("[a-z0-9]{4,8}")
}

/// Non-terminal events
fn arb_incremental_event() -> impl Strategy<Value = StreamEvent> {
    prop_oneof![
        4 => arb_text().prop_map(|text| StreamEvent::Chunk { text }),
        2 => arb_text().prop_map(|text| StreamEvent::Response { text, partial: true }),
        1 => Just(StreamEvent::Progress),
    ]
}

fn arb_terminal_event() -> impl Strategy<Value = StreamEvent> {
    prop_oneof![
        arb_text().prop_map(|text| StreamEvent::Response { text, partial: false }),
        arb_session().prop_map(|session_id| StreamEvent::End { session_id }),
        arb_non_empty_text().prop_map(|message| StreamEvent::Error { message }),
    ]
}

fn arb_event() -> impl Strategy<Value = StreamEvent> {
    prop_oneof![
        5 => arb_incremental_event(),
        1 => arb_terminal_event(),
    ]
}

fn run(events: impl IntoIterator<Item = StreamEvent>) -> (StreamState, Vec<Effect>) {
    let mut state = StreamState::Idle;
    let mut effects = Vec::new();
    for event in events {
        let result = transition(&state, event);
        state = result.new_state;
        effects.extend(result.effects);
    }
    (state, effects)
}

fn emitted(effects: &[Effect]) -> usize {
    effects
        .iter()
        .filter(|e| matches!(e, Effect::CompleteMessage { .. } | Effect::FailMessage { .. }))
        .count()
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// The live buffer is the ordered concatenation of chunk texts
    #[test]
    fn prop_chunks_concatenate(texts in proptest::collection::vec(arb_text(), 0..20)) {
        let (state, effects) = run(texts.iter().cloned().map(|text| StreamEvent::Chunk { text }));
        prop_assert_eq!(state.live_text(), texts.concat());
        prop_assert!(effects.is_empty());
    }

    /// A partial response replaces whatever was buffered before it
    #[test]
    fn prop_partial_replaces(
        prefix in proptest::collection::vec(arb_incremental_event(), 0..10),
        snapshot in arb_text(),
    ) {
        let events = prefix
            .into_iter()
            .chain([StreamEvent::Response { text: snapshot.clone(), partial: true }]);
        let (state, _) = run(events);
        prop_assert!(state.is_streaming());
        prop_assert_eq!(state.live_text(), snapshot);
    }

    /// The live buffer is only ever non-empty while streaming
    #[test]
    fn prop_buffer_empty_unless_streaming(events in proptest::collection::vec(arb_event(), 0..30)) {
        let mut state = StreamState::Idle;
        for event in events {
            state = transition(&state, event).new_state;
            if !state.is_streaming() {
                prop_assert_eq!(state.live_text(), "");
            }
        }
    }

    /// At most one message per exchange, whatever follows the first terminal event
    #[test]
    fn prop_at_most_one_message(events in proptest::collection::vec(arb_event(), 0..40)) {
        let (_, effects) = run(events);
        prop_assert!(emitted(&effects) <= 1);
    }

    /// Exactly one message once text has been streamed and a terminal event arrives
    #[test]
    fn prop_exactly_one_message_with_text(
        first in arb_non_empty_text(),
        middle in proptest::collection::vec(arb_incremental_event(), 0..15),
        terminal in arb_terminal_event(),
        trailing in proptest::collection::vec(arb_event(), 0..10),
    ) {
        // Partial snapshots may blank the buffer; keep the last one non-empty
        let middle = middle.into_iter().map(|e| match e {
            StreamEvent::Response { text, partial: true } if text.is_empty() => {
                StreamEvent::Response { text: "x".into(), partial: true }
            }
            other => other,
        });
        let events = std::iter::once(StreamEvent::Chunk { text: first })
            .chain(middle)
            .chain(std::iter::once(terminal))
            .chain(trailing);

        let (state, effects) = run(events);
        prop_assert!(state.is_settled());
        prop_assert_eq!(emitted(&effects), 1);
    }

    /// Any terminal event settles, and settled never leaves
    #[test]
    fn prop_settled_is_absorbing(
        prefix in proptest::collection::vec(arb_incremental_event(), 0..10),
        terminal in arb_terminal_event(),
        trailing in proptest::collection::vec(arb_event(), 0..20),
    ) {
        let (state, _) = run(prefix.into_iter().chain(std::iter::once(terminal)));
        prop_assert!(state.is_settled());
        let phase_outcome = state.clone();

        let mut state = state;
        for event in trailing {
            state = transition(&state, event).new_state;
            prop_assert_eq!(&state, &phase_outcome);
        }
    }
}
