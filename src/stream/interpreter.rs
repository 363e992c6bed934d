//! Record classification
//!
//! Turns one framed record into a typed [`StreamEvent`]. Records that do not
//! carry the event marker are not events; unknown event tags are skipped so
//! newer servers can add kinds without breaking older clients.

use crate::client::ExchangeError;
use crate::state_machine::StreamEvent;
use serde::Deserialize;
use serde_json::Value;

/// Prefix that marks a record as carrying an event payload
pub const EVENT_MARKER: &str = "data:";

const KNOWN_TAGS: [&str; 5] = ["progress", "chunk", "response", "end", "error"];
const UNKNOWN_ERROR: &str = "Unknown error";

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WirePayload {
    Progress {},
    Chunk {
        content: String,
    },
    Response {
        content: String,
        #[serde(default)]
        partial: bool,
    },
    End {
        #[serde(default)]
        session_id: Option<String>,
    },
    Error {
        #[serde(default, alias = "message")]
        error: Option<String>,
    },
}

impl From<WirePayload> for StreamEvent {
    fn from(payload: WirePayload) -> Self {
        match payload {
            WirePayload::Progress {} => StreamEvent::Progress,
            WirePayload::Chunk { content } => StreamEvent::Chunk { text: content },
            WirePayload::Response { content, partial } => StreamEvent::Response {
                text: content,
                partial,
            },
            WirePayload::End { session_id } => StreamEvent::End {
                session_id: session_id.filter(|s| !s.is_empty()),
            },
            WirePayload::Error { error } => StreamEvent::Error {
                message: error
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or_else(|| UNKNOWN_ERROR.to_string()),
            },
        }
    }
}

/// Classify a complete record.
///
/// Returns `Ok(None)` for records that carry no event (blank lines, comments,
/// other SSE fields, unknown tags) and `Err` with kind `MalformedRecord` when
/// a marked payload cannot be parsed. Either way the caller moves on to the
/// next record.
pub fn interpret(record: &str) -> Result<Option<StreamEvent>, ExchangeError> {
    let Some(payload) = record.strip_prefix(EVENT_MARKER) else {
        return Ok(None);
    };
    let payload = payload.strip_prefix(' ').unwrap_or(payload);
    if payload.trim().is_empty() {
        return Ok(None);
    }

    let value: Value = serde_json::from_str(payload)
        .map_err(|e| ExchangeError::malformed(format!("invalid JSON payload: {e}")))?;
    let Some(object) = value.as_object() else {
        return Err(ExchangeError::malformed("payload is not a JSON object"));
    };
    let tag = match object.get("type") {
        Some(Value::String(tag)) => tag.as_str(),
        Some(_) => return Err(ExchangeError::malformed("`type` is not a string")),
        None => return Err(ExchangeError::malformed("payload has no `type`")),
    };

    if !KNOWN_TAGS.contains(&tag) {
        tracing::debug!(tag, "Skipping unknown event type");
        return Ok(None);
    }

    let parsed: WirePayload = serde_json::from_value(value)
        .map_err(|e| ExchangeError::malformed(format!("invalid payload: {e}")))?;
    Ok(Some(parsed.into()))
}
