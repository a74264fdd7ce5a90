use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use conductor_extract::{extract_object, Extraction};
use conductor_gateway::{Completion, EndpointRole, GatewayError};
use conductor_types::{ChatMessage, Spec, Task};

use crate::degrade_timeout;

/// Elaborates one subtask into a technical specification.
pub struct Designer {
    gateway: Arc<dyn Completion>,
}

impl Designer {
    pub fn new(gateway: Arc<dyn Completion>) -> Self {
        Self { gateway }
    }

    pub async fn design(
        &self,
        task: &Task,
        context: &str,
        timeout_secs: Option<u64>,
        cancel: &CancellationToken,
    ) -> Result<Extraction<Spec>, GatewayError> {
        let messages = [ChatMessage::user(design_prompt(task, context))];
        match self
            .gateway
            .complete(EndpointRole::Control, &messages, timeout_secs, cancel)
            .await
        {
            Ok(text) => Ok(extract_object(&text, || fallback_spec(task))),
            Err(err) => degrade_timeout(err, || fallback_spec(task)),
        }
    }
}

fn design_prompt(task: &Task, context: &str) -> String {
    let mut prompt = format!(
        "You are a designer agent. Create a detailed specification for the following task.\n\
         Return your response as a JSON object with these fields:\n\
         - \"architecture\": high-level architecture description\n\
         - \"components\": list of components/modules needed\n\
         - \"interfaces\": API endpoints or UI interfaces\n\
         - \"data_structures\": required data structures\n\
         - \"dependencies\": external dependencies needed\n\
         - \"implementation_notes\": key implementation considerations\n\n\
         Task: {}\nDescription: {}\n",
        task.title, task.description
    );
    if !context.is_empty() {
        prompt.push_str(&format!("Context:\n{context}\n"));
    }
    prompt.push_str("\nRespond with only the JSON object, no additional text.");
    prompt
}

/// Minimal specification naming the task, used when no parseable spec can be
/// extracted.
pub fn fallback_spec(task: &Task) -> Spec {
    Spec {
        architecture: "Simple implementation".to_string(),
        components: vec![task.title.clone()],
        interfaces: Vec::new(),
        data_structures: serde_json::Value::Object(serde_json::Map::new()),
        dependencies: Vec::new(),
        implementation_notes: task.description.clone(),
    }
}
