use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Planner,
    Designer,
    Coder,
    Context,
}

impl AgentRole {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentRole::Planner => "planner",
            AgentRole::Designer => "designer",
            AgentRole::Coder => "coder",
            AgentRole::Context => "context",
        }
    }

    pub const ALL: [AgentRole; 4] = [
        AgentRole::Planner,
        AgentRole::Designer,
        AgentRole::Coder,
        AgentRole::Context,
    ];
}

impl Default for AgentRole {
    fn default() -> Self {
        AgentRole::Coder
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// One planner-emitted subtask, as extracted from model output. Fields the
/// model may omit carry defaults so a partially-formed element still lands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPlan {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<u32>,
    #[serde(default)]
    pub agent: AgentRole,
}

/// One subtask within a session's plan, owned by exactly one agent role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub agent: AgentRole,
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub status: TaskStatus,
    pub progress: u8,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<u32>,
}

impl Task {
    pub fn from_plan(plan: TaskPlan) -> Self {
        Self {
            id: plan.id,
            title: plan.title,
            description: plan.description,
            agent: plan.agent,
            dependencies: plan.dependencies,
            status: TaskStatus::Pending,
            progress: 0,
            updated_at: Utc::now(),
            error_message: None,
            estimated_time: plan.estimated_time,
        }
    }
}

/// Designer output. Transient per-task payload, retained only for the task's
/// lifetime within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Spec {
    #[serde(default)]
    pub architecture: String,
    #[serde(default)]
    pub components: Vec<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub data_structures: Value,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub implementation_notes: String,
}

impl Default for Spec {
    fn default() -> Self {
        Self {
            architecture: String::new(),
            components: Vec::new(),
            interfaces: Vec::new(),
            data_structures: Value::Object(serde_json::Map::new()),
            dependencies: Vec::new(),
            implementation_notes: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GeneratedFile {
    pub filename: String,
    pub content: String,
}

/// Coder output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodeResult {
    #[serde(default)]
    pub files_written: Vec<GeneratedFile>,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub errors: Vec<String>,
}
