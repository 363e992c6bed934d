//! Task progress snapshot types

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Lifecycle of one server-side task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Error,
}

/// One entry in the task list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEntry {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thoughts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Latest known state of the out-of-band task list
///
/// Accepts both `current_step` and `currentStep` spellings on input.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    #[serde(default)]
    pub tasks: Vec<TaskEntry>,
    #[serde(default, alias = "currentStep", skip_serializing_if = "Option::is_none")]
    pub current_step: Option<u32>,
    #[serde(default, alias = "totalSteps", skip_serializing_if = "Option::is_none")]
    pub total_steps: Option<u32>,
}

impl ProgressSnapshot {
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty() && self.current_step.is_none() && self.total_steps.is_none()
    }

    pub fn running(&self) -> impl Iterator<Item = &TaskEntry> {
        self.tasks.iter().filter(|t| t.status == TaskStatus::Running)
    }

    /// Parse one feed message. An optional `type` field is ignored.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
