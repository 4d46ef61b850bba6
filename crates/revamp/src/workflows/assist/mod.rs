//! Prompt-driven helpers for admins: security rule drafts and event import.
//!
//! Both helpers go through [`TextGenerator`], which returns the model's JSON
//! output. Anything that does not deserialize into the expected shape is
//! reported as [`AssistError::MalformedOutput`]. [`assist_router`] serves them
//! under `/api/v1/admin/assist`.

mod luma;
mod router;
mod security_rules;

pub use luma::{extract_luma_event, LumaEventDetails};
pub use router::assist_router;
pub use security_rules::{
    suggest_security_rules, SecurityRulesRequest, SecurityRulesSuggestion, MIN_REQUEST_CHARS,
};

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Structured generation call: a named prompt plus the JSON fields the
/// caller expects back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationRequest {
    pub name: &'static str,
    pub prompt: String,
    pub output_fields: Vec<&'static str>,
}

/// Text generation backend returning JSON output.
pub trait TextGenerator: Send + Sync {
    fn generate(&self, request: GenerationRequest) -> Result<serde_json::Value, GenerationError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("generation provider unavailable: {0}")]
    Unavailable(String),
    #[error("generation refused: {0}")]
    Refused(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AssistError {
    #[error("{field} needs at least {minimum} characters, got {actual}")]
    TooShort {
        field: &'static str,
        minimum: usize,
        actual: usize,
    },
    #[error("{0} is not an absolute http(s) URL")]
    InvalidUrl(String),
    #[error("{flow} returned malformed output: {reason}")]
    MalformedOutput { flow: &'static str, reason: String },
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

fn decode<T: DeserializeOwned>(
    flow: &'static str,
    output: serde_json::Value,
) -> Result<T, AssistError> {
    serde_json::from_value(output).map_err(|err| AssistError::MalformedOutput {
        flow,
        reason: err.to_string(),
    })
}
