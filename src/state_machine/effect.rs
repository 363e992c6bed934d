//! Effects produced by stream transitions

/// Effects to be applied by the owner of the accumulator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// The assistant turn is complete with this text
    CompleteMessage { content: String },

    /// The service reported an error; the turn ends with this text
    FailMessage { message: String },

    /// The stream carried a session identifier
    RecordSession { session_id: String },
}

impl Effect {
    pub fn complete(content: impl Into<String>) -> Self {
        Effect::CompleteMessage {
            content: content.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Effect::FailMessage {
            message: message.into(),
        }
    }

    pub fn record_session(session_id: impl Into<String>) -> Self {
        Effect::RecordSession {
            session_id: session_id.into(),
        }
    }
}
