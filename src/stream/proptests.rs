//! Property-based tests for framing and interpretation
//!
//! - Chunk boundaries never change the decoded record sequence
//! - Unknown event tags never stall the records after them

use super::*;
use crate::state_machine::StreamEvent;
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

/// One wire record body without its delimiter
fn arb_record() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z0-9 àéõç]{0,20}".prop_map(|t| format!(r#"data: {{"type":"chunk","content":"{t}"}}"#)),
        "[a-zA-Z0-9 ]{0,20}".prop_map(|t| format!(r#"data: {{"type":"response","content":"{t}","partial":true}}"#)),
        Just(r#"data: {"type":"progress"}"#.to_string()),
        Just(": ping".to_string()),
        Just(String::new()),
        "[a-z]{3,10}".prop_map(|tag| format!(r#"data: {{"type":"x-{tag}"}}"#)),
    ]
}

fn arb_body() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec(arb_record(), 0..12)
}

fn encode(records: &[String], crlf: bool) -> Vec<u8> {
    let delimiter = if crlf { "\r\n" } else { "\n" };
    records
        .iter()
        .flat_map(|r| format!("{r}{delimiter}").into_bytes())
        .collect()
}

fn decode_in_pieces(bytes: &[u8], cuts: &[usize]) -> Vec<String> {
    let mut decoder = FrameDecoder::new();
    let mut records = Vec::new();
    let mut start = 0;
    for &cut in cuts {
        records.extend(decoder.push(&bytes[start..cut]));
        start = cut;
    }
    records.extend(decoder.push(&bytes[start..]));
    assert_eq!(decoder.finish(), 0);
    records
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// Two arbitrary split points yield the same records as one piece
    #[test]
    fn prop_two_splits_match_single_piece(
        body in arb_body(),
        crlf in any::<bool>(),
        a in any::<prop::sample::Index>(),
        b in any::<prop::sample::Index>(),
    ) {
        let bytes = encode(&body, crlf);
        let whole = decode_in_pieces(&bytes, &[]);

        let len = bytes.len() + 1;
        let mut cuts = vec![a.index(len), b.index(len)];
        cuts.sort_unstable();
        let split = decode_in_pieces(&bytes, &cuts);

        prop_assert_eq!(&split, &whole);
        prop_assert_eq!(whole, body);
    }

    /// Byte-at-a-time delivery is just the extreme split
    #[test]
    fn prop_byte_at_a_time(body in arb_body()) {
        let bytes = encode(&body, false);
        let cuts: Vec<usize> = (1..bytes.len()).collect();
        prop_assert_eq!(decode_in_pieces(&bytes, &cuts), body);
    }

    /// Unknown tags interleaved anywhere do not affect known events
    #[test]
    fn prop_unknown_tags_do_not_stall(
        texts in proptest::collection::vec("[a-z]{1,8}", 1..8),
        noise in proptest::collection::vec("[a-z]{3,8}", 0..8),
    ) {
        let mut records = Vec::new();
        for (i, text) in texts.iter().enumerate() {
            if let Some(tag) = noise.get(i) {
                records.push(format!(r#"data: {{"type":"{tag}-v2","content":"ignored"}}"#));
            }
            records.push(format!(r#"data: {{"type":"chunk","content":"{text}"}}"#));
        }

        let mut decoder = FrameDecoder::new();
        let events: Vec<StreamEvent> = decoder
            .push(&encode(&records, false))
            .iter()
            .filter_map(|r| interpret(r).expect("no malformed records"))
            .collect();

        let expected: Vec<StreamEvent> = texts
            .iter()
            .map(|t| StreamEvent::Chunk { text: t.clone() })
            .collect();
        prop_assert_eq!(events, expected);
    }
}
