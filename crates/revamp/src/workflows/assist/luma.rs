use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

use super::{decode, AssistError, GenerationRequest, TextGenerator};

const FLOW: &str = "luma_event_details";

/// Event fields pulled from a Luma event page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LumaEventDetails {
    pub title: String,
    pub description: String,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct RawEventDetails {
    title: String,
    description: String,
    date: String,
}

/// Pre-fill an event form from a Luma link.
pub fn extract_luma_event<G>(generator: &G, url: &str) -> Result<LumaEventDetails, AssistError>
where
    G: TextGenerator + ?Sized,
{
    let url = url.trim();
    if !is_absolute_http_url(url) {
        return Err(AssistError::InvalidUrl(url.to_string()));
    }

    let prompt = format!(
        "You extract event details from Luma event pages.\n\
         The page URL is: {url}\n\n\
         Return a JSON object with the keys \"title\", \"description\", and \"date\". \
         The date must be an RFC 3339 timestamp such as 2025-11-04T18:30:00Z."
    );

    let output = generator.generate(GenerationRequest {
        name: FLOW,
        prompt,
        output_fields: vec!["title", "description", "date"],
    })?;
    let raw: RawEventDetails = decode(FLOW, output)?;

    if raw.title.trim().is_empty() {
        return Err(AssistError::MalformedOutput {
            flow: FLOW,
            reason: "title is empty".to_string(),
        });
    }
    let date = DateTime::parse_from_rfc3339(raw.date.trim())
        .map_err(|err| AssistError::MalformedOutput {
            flow: FLOW,
            reason: format!("date {:?} is not RFC 3339: {err}", raw.date),
        })?
        .with_timezone(&Utc);

    info!(url, title = %raw.title, %date, "luma event details extracted");
    Ok(LumaEventDetails {
        title: raw.title.trim().to_string(),
        description: raw.description.trim().to_string(),
        date,
    })
}

fn is_absolute_http_url(raw: &str) -> bool {
    match Url::parse(raw) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https")
                && url.host_str().is_some_and(|host| !host.is_empty())
        }
        Err(_) => false,
    }
}
