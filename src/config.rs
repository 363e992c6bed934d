//! Client configuration from the environment

use crate::attachment::DEFAULT_PASTE_THRESHOLD;
use crate::exchange::{resolve_workspace, DEFAULT_TIMEOUT};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
const PROGRESS_PATH: &str = "/service/ws/tasks";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Assistant service root, e.g. `http://localhost:8000`
    pub base_url: String,
    /// WebSocket root of the progress feed; the session id is appended
    pub progress_url: String,
    pub workspace_id: String,
    pub request_timeout: Duration,
    pub paste_threshold: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let base_url = lookup("ORACULO_BASE_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = base_url.trim_end_matches('/').to_string();

        let progress_url = lookup("ORACULO_PROGRESS_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| progress_url_for(&base_url));

        let timeout_secs = parse_or(
            "ORACULO_TIMEOUT_SECS",
            lookup("ORACULO_TIMEOUT_SECS"),
            DEFAULT_TIMEOUT.as_secs(),
        );
        let paste_threshold = parse_or(
            "ORACULO_PASTE_THRESHOLD",
            lookup("ORACULO_PASTE_THRESHOLD"),
            DEFAULT_PASTE_THRESHOLD,
        );

        Self {
            progress_url,
            workspace_id: resolve_workspace(lookup("ORACULO_WORKSPACE").as_deref()),
            request_timeout: Duration::from_secs(timeout_secs),
            paste_threshold,
            base_url,
        }
    }
}

/// `http(s)://host` becomes `ws(s)://host/service/ws/tasks`
fn progress_url_for(base_url: &str) -> String {
    let ws_base = if let Some(rest) = base_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base_url.to_string()
    };
    format!("{ws_base}{PROGRESS_PATH}")
}

fn parse_or<T>(key: &str, value: Option<String>, default: T) -> T
where
    T: std::str::FromStr + Copy + PartialOrd + From<u8>,
{
    let Some(raw) = value else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(parsed) if parsed > T::from(0) => parsed,
        _ => {
            tracing::warn!(key, value = %raw, "Invalid configuration value, using default");
            default
        }
    }
}
