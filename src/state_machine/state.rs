//! Accumulation state types

use serde::Serialize;

/// How a settled exchange ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SettledOutcome {
    /// Final text emitted (or `end` with nothing buffered)
    Completed,
    /// The service signalled an error
    Failed,
    /// Cancelled or timed out; buffered text was discarded
    Abandoned,
}

/// Stream accumulation state for one exchange
///
/// The live buffer only exists inside `Streaming`, so it is empty by
/// construction whenever the exchange is idle or settled.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamState {
    #[default]
    Idle,
    Streaming {
        buffer: String,
    },
    Settled {
        outcome: SettledOutcome,
    },
}

impl StreamState {
    pub fn phase(&self) -> StreamPhase {
        match self {
            StreamState::Idle => StreamPhase::Idle,
            StreamState::Streaming { .. } => StreamPhase::Streaming,
            StreamState::Settled { .. } => StreamPhase::Settled,
        }
    }

    /// Text received so far for the in-flight exchange
    pub fn live_text(&self) -> &str {
        match self {
            StreamState::Streaming { buffer } => buffer,
            StreamState::Idle | StreamState::Settled { .. } => "",
        }
    }

    #[allow(dead_code)] // Useful for tests
    pub fn is_streaming(&self) -> bool {
        matches!(self, StreamState::Streaming { .. })
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, StreamState::Settled { .. })
    }

    pub fn snapshot(&self) -> StreamSnapshot {
        StreamSnapshot {
            phase: self.phase(),
            live_text: self.live_text().to_string(),
        }
    }
}

/// State tag without payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamPhase {
    #[default]
    Idle,
    Streaming,
    Settled,
}

/// Published view of the accumulator: value plus state tag
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct StreamSnapshot {
    pub phase: StreamPhase,
    pub live_text: String,
}

