use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::{Task, TaskStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::Failed | SessionStatus::Cancelled
        )
    }

    /// Status moves forward only: pending -> running -> terminal. A terminal
    /// state never changes again.
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        match self {
            SessionStatus::Pending => next != SessionStatus::Pending,
            SessionStatus::Running => next.is_terminal(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

/// One end-to-end execution of a single submitted objective.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub objective: String,
    pub status: SessionStatus,
    /// Derived: `100 * completed_tasks / total_tasks`, refreshed on every
    /// task transition and on snapshot reads. Never set directly.
    pub progress: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_task: Option<String>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(objective: impl Into<String>, priority: Priority) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            objective: objective.into(),
            status: SessionStatus::Pending,
            progress: 0.0,
            current_task: None,
            tasks: Vec::new(),
            priority,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn computed_progress(&self) -> f32 {
        if self.tasks.is_empty() {
            return match self.status {
                SessionStatus::Completed => 100.0,
                _ => 0.0,
            };
        }
        let completed = self
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .count();
        100.0 * completed as f32 / self.tasks.len() as f32
    }

    pub fn refresh_progress(&mut self) {
        self.progress = self.computed_progress();
        self.updated_at = Utc::now();
    }
}
