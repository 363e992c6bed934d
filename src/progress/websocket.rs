//! WebSocket progress feed

use super::{ProgressError, ProgressFeed, ProgressSnapshot, ProgressStream};
use async_trait::async_trait;
use futures::StreamExt;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

/// Progress feed served at `{base_url}/{session_id}`
pub struct WebSocketFeed {
    base_url: String,
}

impl WebSocketFeed {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    fn session_url(&self, session_id: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), session_id)
    }
}

#[async_trait]
impl ProgressFeed for WebSocketFeed {
    async fn subscribe(&self, session_id: &str) -> Result<ProgressStream, ProgressError> {
        let url = self.session_url(session_id);
        let (ws_stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| ProgressError::Connect(format!("{url}: {e}")))?;
        tracing::debug!(url = %url, "Progress feed connected");

        let snapshots = futures::stream::unfold(Some(ws_stream), |ws| async move {
            let mut ws = ws?;
            loop {
                match ws.next().await {
                    Some(Ok(Message::Text(text))) => match ProgressSnapshot::parse(text.as_str()) {
                        Ok(snapshot) => return Some((Ok(snapshot), Some(ws))),
                        Err(e) => {
                            tracing::debug!(error = %e, "Ignoring unparseable progress message");
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => return None,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        return Some((Err(ProgressError::Transport(e.to_string())), None));
                    }
                }
            }
        });

        Ok(snapshots.boxed())
    }
}
