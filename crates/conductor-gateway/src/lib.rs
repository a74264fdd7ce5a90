//! Gateway to the two named model endpoints.
//!
//! Orchestration code talks to models through the [`Completion`] trait; the
//! concrete [`ModelGateway`] speaks an OpenAI-compatible chat wire format
//! and routes each call to the control model (planning, design) or the code
//! model (implementation). Calls are stateless: no caching, no retries —
//! failure policy belongs to the caller.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use conductor_types::ChatMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointRole {
    Control,
    Code,
}

impl EndpointRole {
    pub fn as_str(self) -> &'static str {
        match self {
            EndpointRole::Control => "control",
            EndpointRole::Code => "code",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("model endpoint unavailable: {0}")]
    Unavailable(String),
    #[error("model call timed out after {0}s")]
    Timeout(u64),
    #[error("model endpoint returned status {status}: {detail}")]
    UpstreamStatus { status: u16, detail: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub base_url: String,
    pub control_model: String,
    pub code_model: String,
    /// Default per-call timeout, overridable per call.
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".to_string(),
            control_model: "codellama:instruct".to_string(),
            code_model: "deepseek-coder".to_string(),
            timeout_secs: 120,
        }
    }
}

/// The seam orchestration code depends on. Tests inject canned
/// implementations; production uses [`ModelGateway`].
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(
        &self,
        role: EndpointRole,
        messages: &[ChatMessage],
        timeout_secs: Option<u64>,
        cancel: &CancellationToken,
    ) -> Result<String, GatewayError>;
}

pub struct ModelGateway {
    config: GatewayConfig,
    client: Client,
}

impl ModelGateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    pub fn model_for(&self, role: EndpointRole) -> &str {
        match role {
            EndpointRole::Control => &self.config.control_model,
            EndpointRole::Code => &self.config.code_model,
        }
    }

    async fn send(
        &self,
        role: EndpointRole,
        messages: &[ChatMessage],
    ) -> Result<String, GatewayError> {
        let model = self.model_for(role);
        let url = format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let wire_messages = messages
            .iter()
            .map(|m| json!({"role": m.role, "content": m.content}))
            .collect::<Vec<_>>();

        let response = self
            .client
            .post(url)
            .json(&json!({
                "model": model,
                "messages": wire_messages,
                "stream": false,
            }))
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            // Proxies answer with HTML or plain text; the body is not
            // guaranteed to be JSON on an error status.
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::UpstreamStatus {
                status: status.as_u16(),
                detail: upstream_detail(&body),
            });
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        if let Some(text) = extract_completion_text(&value) {
            return Ok(text);
        }

        Err(GatewayError::UpstreamStatus {
            status: status.as_u16(),
            detail: format!(
                "no completion content for model `{}` (response: {})",
                model,
                truncate_for_error(&value.to_string(), 500)
            ),
        })
    }
}

#[async_trait]
impl Completion for ModelGateway {
    async fn complete(
        &self,
        role: EndpointRole,
        messages: &[ChatMessage],
        timeout_secs: Option<u64>,
        cancel: &CancellationToken,
    ) -> Result<String, GatewayError> {
        let timeout = timeout_secs.unwrap_or(self.config.timeout_secs);
        let deadline = std::time::Duration::from_secs(timeout);

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(role = role.as_str(), "gateway call cancelled in flight");
                Err(GatewayError::Unavailable("call cancelled".to_string()))
            }
            result = tokio::time::timeout(deadline, self.send(role, messages)) => {
                match result {
                    Ok(inner) => inner,
                    Err(_) => Err(GatewayError::Timeout(timeout)),
                }
            }
        }
    }
}

/// Accepts both the chat shape (`choices[0].message.content`) and the
/// Ollama generate shape (`response`) so either endpoint flavor works.
fn extract_completion_text(value: &serde_json::Value) -> Option<String> {
    if let Some(text) = value
        .get("choices")
        .and_then(|v| v.get(0))
        .and_then(|v| v.get("message"))
        .and_then(|v| v.get("content"))
        .and_then(|v| v.as_str())
    {
        return Some(text.to_string());
    }
    value
        .get("response")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

/// Structured message when the error body is JSON, truncated raw text when
/// it is not.
fn upstream_detail(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| extract_error_detail(&value))
        .unwrap_or_else(|| truncate_for_error(body, 500))
}

fn extract_error_detail(value: &serde_json::Value) -> Option<String> {
    value
        .get("error")
        .and_then(|v| v.get("message"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
        })
}

fn truncate_for_error(input: &str, max_len: usize) -> String {
    if input.len() <= max_len {
        return input.to_string();
    }
    // Back off to the nearest char boundary; a fixed byte cut can land
    // inside a multi-byte character in an upstream body.
    let mut cut = max_len;
    while !input.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &input[..cut])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_text_prefers_chat_shape() {
        let value = json!({
            "choices": [{"message": {"role": "assistant", "content": "hello"}}],
            "response": "shadowed",
        });
        assert_eq!(extract_completion_text(&value).as_deref(), Some("hello"));
    }

    #[test]
    fn completion_text_accepts_generate_shape() {
        let value = json!({"response": "plain"});
        assert_eq!(extract_completion_text(&value).as_deref(), Some("plain"));
    }

    #[test]
    fn error_detail_reads_nested_then_flat_message() {
        let nested = json!({"error": {"message": "boom"}});
        assert_eq!(extract_error_detail(&nested).as_deref(), Some("boom"));
        let flat = json!({"message": "flat boom"});
        assert_eq!(extract_error_detail(&flat).as_deref(), Some("flat boom"));
    }

    #[test]
    fn truncation_never_splits_a_multibyte_character() {
        let mut body = "a".repeat(499);
        body.push('é');
        body.push_str(" trailing detail");
        let truncated = truncate_for_error(&body, 500);
        // Byte 500 falls inside the two-byte 'é'; the cut backs off to 499.
        assert_eq!(truncated, format!("{}...", "a".repeat(499)));

        let short = "plain ascii";
        assert_eq!(truncate_for_error(short, 500), short);
    }

    #[test]
    fn upstream_detail_handles_non_json_error_bodies() {
        let html = "<html><body><h1>502 Bad Gateway</h1></body></html>";
        assert_eq!(upstream_detail(html), html);

        let json_body = r#"{"error":{"message":"model not loaded"}}"#;
        assert_eq!(upstream_detail(json_body), "model not loaded");
    }

    #[tokio::test]
    async fn cancelled_token_aborts_before_dispatch() {
        let gateway = ModelGateway::new(GatewayConfig {
            // Unroutable address; the cancel branch must win regardless.
            base_url: "http://127.0.0.1:1".to_string(),
            ..GatewayConfig::default()
        });
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = gateway
            .complete(EndpointRole::Control, &[ChatMessage::user("hi")], Some(5), &cancel)
            .await
            .expect_err("cancelled");
        assert!(matches!(err, GatewayError::Unavailable(_)));
    }

    #[test]
    fn model_routing_by_endpoint_role() {
        let gateway = ModelGateway::new(GatewayConfig::default());
        assert_eq!(gateway.model_for(EndpointRole::Control), "codellama:instruct");
        assert_eq!(gateway.model_for(EndpointRole::Code), "deepseek-coder");
    }
}
