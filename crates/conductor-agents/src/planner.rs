use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use conductor_extract::{extract_array, Extraction};
use conductor_gateway::{Completion, EndpointRole, GatewayError};
use conductor_types::{AgentRole, ChatMessage, TaskPlan};

use crate::degrade_timeout;

/// Decomposes a high-level objective into an ordered list of subtasks.
///
/// The planner performs no validation beyond structural extraction;
/// dependency-cycle checking happens at graph-build time in the
/// orchestrator.
pub struct Planner {
    gateway: Arc<dyn Completion>,
}

impl Planner {
    pub fn new(gateway: Arc<dyn Completion>) -> Self {
        Self { gateway }
    }

    pub async fn plan(
        &self,
        goal: &str,
        timeout_secs: Option<u64>,
        cancel: &CancellationToken,
    ) -> Result<Extraction<Vec<TaskPlan>>, GatewayError> {
        let messages = [ChatMessage::user(plan_prompt(goal))];
        match self
            .gateway
            .complete(EndpointRole::Control, &messages, timeout_secs, cancel)
            .await
        {
            Ok(text) => Ok(extract_array(&text, || fallback_plan(goal))),
            Err(err) => degrade_timeout(err, || fallback_plan(goal)),
        }
    }
}

fn plan_prompt(goal: &str) -> String {
    format!(
        "You are a planner agent. Break down the following goal into a detailed list of subtasks.\n\
         Return your response as a JSON array of task objects, where each task has:\n\
         - \"id\": unique task identifier\n\
         - \"title\": brief task title\n\
         - \"description\": detailed task description\n\
         - \"dependencies\": list of task IDs this task depends on\n\
         - \"estimated_time\": estimated time in minutes\n\
         - \"agent\": which agent should handle this (\"planner\", \"designer\", \"coder\", \"context\")\n\n\
         Goal: {goal}\n\n\
         Respond with only the JSON array, no additional text."
    )
}

/// The documented single-task degradation when no plan can be extracted.
pub fn fallback_plan(goal: &str) -> Vec<TaskPlan> {
    vec![TaskPlan {
        id: "task_1".to_string(),
        title: "Execute Goal".to_string(),
        description: goal.to_string(),
        dependencies: Vec::new(),
        estimated_time: Some(30),
        agent: AgentRole::Coder,
    }]
}
