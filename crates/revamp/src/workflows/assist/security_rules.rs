use serde::{Deserialize, Serialize};
use tracing::info;

use super::{decode, AssistError, GenerationRequest, TextGenerator};

const FLOW: &str = "security_rules_suggestion";

/// Minimum length, in characters after trimming, of each free-text input.
pub const MIN_REQUEST_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityRulesRequest {
    pub schema_description: String,
    pub access_control_requirements: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityRulesSuggestion {
    pub security_rules: String,
}

/// Draft document-store security rules for a schema and its access requirements.
pub fn suggest_security_rules<G>(
    generator: &G,
    request: &SecurityRulesRequest,
) -> Result<SecurityRulesSuggestion, AssistError>
where
    G: TextGenerator + ?Sized,
{
    let schema = long_enough("schema description", &request.schema_description)?;
    let requirements = long_enough(
        "access control requirements",
        &request.access_control_requirements,
    )?;

    let prompt = format!(
        "You design security rules for a document database.\n\
         Write rules that enforce the access control requirements below for the described schema.\n\n\
         Schema description: {schema}\n\
         Access control requirements: {requirements}\n\n\
         Return a JSON object with a single key \"security_rules\" whose value is the complete \
         rules file, ready to paste into the rules editor."
    );

    let output = generator.generate(GenerationRequest {
        name: FLOW,
        prompt,
        output_fields: vec!["security_rules"],
    })?;
    let suggestion: SecurityRulesSuggestion = decode(FLOW, output)?;
    if suggestion.security_rules.trim().is_empty() {
        return Err(AssistError::MalformedOutput {
            flow: FLOW,
            reason: "security_rules is empty".to_string(),
        });
    }

    info!(
        lines = suggestion.security_rules.lines().count(),
        "security rules drafted"
    );
    Ok(suggestion)
}

fn long_enough<'a>(field: &'static str, raw: &'a str) -> Result<&'a str, AssistError> {
    let value = raw.trim();
    let actual = value.chars().count();
    if actual < MIN_REQUEST_CHARS {
        return Err(AssistError::TooShort {
            field,
            minimum: MIN_REQUEST_CHARS,
            actual,
        });
    }
    Ok(value)
}
