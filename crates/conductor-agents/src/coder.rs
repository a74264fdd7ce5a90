use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use conductor_extract::{extract_object, Extraction};
use conductor_gateway::{Completion, EndpointRole, GatewayError};
use conductor_types::{ChatMessage, CodeResult, GeneratedFile, Spec};

use crate::degrade_timeout;

const FILE_MARKER_SUFFIXES: [&str; 3] = [".py:", ".js:", ".html:"];

/// Implements a specification as a set of generated files.
pub struct Coder {
    gateway: Arc<dyn Completion>,
}

impl Coder {
    pub fn new(gateway: Arc<dyn Completion>) -> Self {
        Self { gateway }
    }

    pub async fn code(
        &self,
        spec: &Spec,
        context: &str,
        timeout_secs: Option<u64>,
        cancel: &CancellationToken,
    ) -> Result<Extraction<CodeResult>, GatewayError> {
        let messages = [ChatMessage::user(code_prompt(spec, context))];
        match self
            .gateway
            .complete(EndpointRole::Code, &messages, timeout_secs, cancel)
            .await
        {
            Ok(text) => Ok(extract_object(&text, || recover_from_text(&text, spec))),
            Err(err) => degrade_timeout(err, || template_stub(spec)),
        }
    }
}

fn code_prompt(spec: &Spec, context: &str) -> String {
    let mut prompt = format!(
        "You are a coder agent. Implement the following specification.\n\
         Return your response as a JSON object with these fields:\n\
         - \"files_written\": array of objects with \"filename\" and \"content\" keys\n\
         - \"stdout\": string with any output messages\n\
         - \"errors\": array of any error messages\n\n\
         Specification:\n\
         Architecture: {}\n\
         Components: {}\n\
         Implementation Notes: {}\n",
        spec.architecture,
        spec.components.join(", "),
        spec.implementation_notes
    );
    if !context.is_empty() {
        prompt.push_str(&format!("Context:\n{context}\n"));
    }
    prompt.push_str(
        "\nGenerate clean, production-ready code with appropriate error handling.\n\
         Respond with only the JSON object, no additional text.",
    );
    prompt
}

/// Second-stage recovery when the response carried no parseable object:
/// scan for filename markers, and failing that emit the template stub.
fn recover_from_text(text: &str, spec: &Spec) -> CodeResult {
    let files = scan_file_markers(text);
    if files.is_empty() {
        return template_stub(spec);
    }
    CodeResult {
        files_written: files,
        stdout: "Code generated successfully".to_string(),
        errors: Vec::new(),
    }
}

/// Recovers file boundaries from semi-structured text. A line ending in
/// `.py:`, `.js:` or `.html:` names a file; subsequent non-blank lines
/// accumulate as its content until the next marker.
pub fn scan_file_markers(text: &str) -> Vec<GeneratedFile> {
    let mut files = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in text.lines() {
        let trimmed = line.trim();
        if FILE_MARKER_SUFFIXES.iter().any(|s| trimmed.ends_with(s)) {
            if let Some((filename, body)) = current.take() {
                files.push(GeneratedFile {
                    filename,
                    content: body.join("\n"),
                });
            }
            current = Some((trimmed.trim_end_matches(':').to_string(), Vec::new()));
        } else if let Some((_, body)) = current.as_mut() {
            if !trimmed.is_empty() {
                body.push(line);
            }
        }
    }

    if let Some((filename, body)) = current.take() {
        files.push(GeneratedFile {
            filename,
            content: body.join("\n"),
        });
    }
    files
}

fn template_stub(spec: &Spec) -> CodeResult {
    let architecture = if spec.architecture.is_empty() {
        "Unknown"
    } else {
        spec.architecture.as_str()
    };
    CodeResult {
        files_written: vec![GeneratedFile {
            filename: "implementation.py".to_string(),
            content: format!(
                "# Implementation for: {architecture}\n# TODO: Implement based on specification"
            ),
        }],
        stdout: "Generated basic implementation template".to_string(),
        errors: vec!["JSON parsing failed, created template".to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StaticCompletion;

    fn sample_spec() -> Spec {
        Spec {
            architecture: "single module".to_string(),
            components: vec!["core".to_string()],
            implementation_notes: "just do it".to_string(),
            ..Spec::default()
        }
    }

    #[tokio::test]
    async fn structured_result_is_parsed() {
        let raw = r#"{"files_written":[{"filename":"main.py","content":"print(1)"}],
                      "stdout":"ok","errors":[]}"#;
        let coder = Coder::new(Arc::new(StaticCompletion::text(raw)));
        let result = coder
            .code(&sample_spec(), "", None, &CancellationToken::new())
            .await
            .expect("code");
        assert!(!result.is_fallback());
        let code = result.into_value();
        assert_eq!(code.files_written.len(), 1);
        assert_eq!(code.files_written[0].filename, "main.py");
    }

    #[test]
    fn line_scanner_splits_on_filename_markers() {
        let text = "app.py:\nprint(1)\nindex.js:\nconsole.log(1)";
        let files = scan_file_markers(text);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].filename, "app.py");
        assert_eq!(files[0].content, "print(1)");
        assert_eq!(files[1].filename, "index.js");
        assert_eq!(files[1].content, "console.log(1)");
    }

    #[test]
    fn line_scanner_skips_blank_lines_and_preamble() {
        let text = "here you go\n\nserver.py:\n\nimport os\nprint(os.name)\n";
        let files = scan_file_markers(text);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].filename, "server.py");
        assert_eq!(files[0].content, "import os\nprint(os.name)");
    }

    #[test]
    fn line_scanner_ignores_text_with_no_markers() {
        assert!(scan_file_markers("nothing resembling files").is_empty());
    }

    #[tokio::test]
    async fn unstructured_response_recovers_files_via_scanner() {
        let raw = "Sure, here are the files:\napp.py:\nprint(1)\nindex.js:\nconsole.log(1)";
        let coder = Coder::new(Arc::new(StaticCompletion::text(raw)));
        let result = coder
            .code(&sample_spec(), "", None, &CancellationToken::new())
            .await
            .expect("code");
        assert!(result.is_fallback());
        let code = result.into_value();
        assert_eq!(code.files_written.len(), 2);
        assert_eq!(code.stdout, "Code generated successfully");
        assert!(code.errors.is_empty());
    }

    #[tokio::test]
    async fn markerless_garbage_emits_template_stub() {
        let coder = Coder::new(Arc::new(StaticCompletion::text("cannot comply")));
        let result = coder
            .code(&sample_spec(), "", None, &CancellationToken::new())
            .await
            .expect("code");
        assert!(result.is_fallback());
        let code = result.into_value();
        assert_eq!(code.files_written.len(), 1);
        assert_eq!(code.files_written[0].filename, "implementation.py");
        assert!(code.files_written[0].content.contains("single module"));
        assert_eq!(code.stdout, "Generated basic implementation template");
        assert_eq!(code.errors, vec!["JSON parsing failed, created template"]);
    }

    #[tokio::test]
    async fn timeout_degrades_to_template_stub() {
        let coder = Coder::new(Arc::new(StaticCompletion::Fail(|| GatewayError::Timeout(120))));
        let result = coder
            .code(&sample_spec(), "", None, &CancellationToken::new())
            .await
            .expect("degraded");
        assert!(result.is_fallback());
        assert_eq!(
            result.into_value().files_written[0].filename,
            "implementation.py"
        );
    }
}
