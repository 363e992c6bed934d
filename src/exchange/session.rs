//! Session context owned by the coordinator

/// Workspace used when none is configured
pub const DEFAULT_WORKSPACE: &str = "default";

/// Extract the workspace id from a `/workspace/<id>` path
pub fn workspace_from_path(path: &str) -> Option<String> {
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    match (segments.next(), segments.next()) {
        (Some("workspace"), Some(id)) => Some(id.to_string()),
        _ => None,
    }
}

/// Resolve a configured workspace: a bare id, a `/workspace/<id>` path, or
/// nothing at all
pub fn resolve_workspace(value: Option<&str>) -> String {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return DEFAULT_WORKSPACE.to_string();
    };
    if value.contains('/') {
        workspace_from_path(value).unwrap_or_else(|| DEFAULT_WORKSPACE.to_string())
    } else {
        value.to_string()
    }
}

/// Conversation identity plus the last connectivity probe result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    session_id: Option<String>,
    workspace_id: String,
    connected: bool,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new(DEFAULT_WORKSPACE)
    }
}

impl SessionContext {
    pub fn new(workspace_id: impl Into<String>) -> Self {
        Self {
            session_id: None,
            workspace_id: workspace_id.into(),
            connected: false,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    pub fn is_default_workspace(&self) -> bool {
        self.workspace_id == DEFAULT_WORKSPACE
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    /// Adopt a session identifier handed over by the service.
    ///
    /// An absent identifier keeps the current one. Returns true when the
    /// session actually changed.
    pub fn adopt(&mut self, session_id: Option<&str>) -> bool {
        match session_id.filter(|s| !s.is_empty()) {
            Some(id) if self.session_id.as_deref() != Some(id) => {
                self.session_id = Some(id.to_string());
                true
            }
            _ => false,
        }
    }

    /// Adopt only when no session has been established yet
    pub fn adopt_if_absent(&mut self, session_id: Option<&str>) -> bool {
        if self.session_id.is_some() {
            return false;
        }
        self.adopt(session_id)
    }

    /// Switch workspace; the conversation continues under the same session
    pub fn set_workspace(&mut self, workspace_id: impl Into<String>) {
        self.workspace_id = workspace_id.into();
    }

    /// Forget the conversation (new chat); workspace and connectivity stay
    pub fn reset(&mut self) {
        self.session_id = None;
    }
}
