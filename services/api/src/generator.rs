use std::time::Duration;

use revamp::config::AssistConfig;
use revamp::workflows::assist::{GenerationError, GenerationRequest, TextGenerator};
use serde_json::{json, Value};
use tracing::{debug, warn};

/// Blocking client for an OpenAI-compatible chat completions endpoint in JSON mode.
pub(crate) struct HttpTextGenerator {
    agent: ureq::Agent,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl HttpTextGenerator {
    pub(crate) fn new(config: &AssistConfig) -> Self {
        let timeout = Duration::from_millis(config.timeout_ms);
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .timeout_write(timeout)
            .build();
        Self {
            agent,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }
}

impl TextGenerator for HttpTextGenerator {
    fn generate(&self, request: GenerationRequest) -> Result<Value, GenerationError> {
        let payload = completion_payload(&self.model, &request);
        let mut call = self
            .agent
            .post(&self.endpoint)
            .set("Content-Type", "application/json")
            .set("Accept", "application/json");
        if let Some(key) = self.api_key.as_deref() {
            call = call.set("Authorization", &format!("Bearer {key}"));
        }

        let body: Value = match call.send_json(payload) {
            Ok(response) => response.into_json().map_err(|err| {
                GenerationError::Unavailable(format!("completion body unreadable: {err}"))
            })?,
            Err(ureq::Error::Status(code, _)) => {
                warn!(flow = request.name, code, "completion request rejected");
                return Err(status_error(code));
            }
            Err(ureq::Error::Transport(transport)) => {
                warn!(flow = request.name, error = %transport, "completion transport failed");
                return Err(GenerationError::Unavailable(format!(
                    "transport error: {transport}"
                )));
            }
        };

        debug!(flow = request.name, "completion received");
        completion_output(&body)
    }
}

fn completion_payload(model: &str, request: &GenerationRequest) -> Value {
    let keys = request
        .output_fields
        .iter()
        .map(|field| format!("\"{field}\""))
        .collect::<Vec<_>>()
        .join(", ");
    json!({
        "model": model,
        "response_format": { "type": "json_object" },
        "messages": [
            {
                "role": "system",
                "content": format!("Reply with one JSON object with exactly the keys {keys}."),
            },
            { "role": "user", "content": request.prompt },
        ],
    })
}

fn completion_output(body: &Value) -> Result<Value, GenerationError> {
    let choice = body
        .pointer("/choices/0")
        .ok_or_else(|| GenerationError::Unavailable("completion has no choices".to_string()))?;
    if let Some(refusal) = choice.pointer("/message/refusal").and_then(Value::as_str) {
        return Err(GenerationError::Refused(refusal.to_string()));
    }
    if choice.get("finish_reason").and_then(Value::as_str) == Some("content_filter") {
        return Err(GenerationError::Refused("content filtered".to_string()));
    }
    let content = choice
        .pointer("/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| GenerationError::Unavailable("completion has no content".to_string()))?;
    // Non-JSON text is passed through; the flow rejects it as malformed.
    Ok(serde_json::from_str(content).unwrap_or_else(|_| Value::String(content.to_string())))
}

fn status_error(code: u16) -> GenerationError {
    match code {
        400 | 422 => GenerationError::Refused(format!("provider rejected the prompt ({code})")),
        _ => GenerationError::Unavailable(format!("provider returned http status {code}")),
    }
}
