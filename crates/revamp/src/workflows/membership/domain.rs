use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::status::{ApplicationStatus, VerificationStatus};

/// Identifier issued by the identity provider for a community member.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for ambassador applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for community events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub String);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Community role. Admin is granted outside this crate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Member,
    Ambassador,
    Admin,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Ambassador => "ambassador",
            Role::Admin => "admin",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "member" => Some(Role::Member),
            "ambassador" => Some(Role::Ambassador),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// Opaque reference returned by blob storage (typically a download URL).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRef(pub String);

/// Member profile as persisted in the `users` collection.
///
/// Counters default to zero when the stored document omits them, so a partially
/// written profile still evaluates (and fails) eligibility instead of erroring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub college: String,
    pub college_email: String,
    #[serde(default)]
    pub year: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_domain: Option<String>,
    pub verification_status: VerificationStatus,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub points: u32,
    #[serde(default)]
    pub events_attended: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub college_id_ref: Option<BlobRef>,
    pub created_at: DateTime<Utc>,
}

/// Free-text answers collected on the ambassador application form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationAnswers {
    pub why: String,
    pub what: String,
    pub experience: String,
}

/// Ambassador application as persisted in the `ambassadorApplications` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmbassadorApplication {
    pub id: ApplicationId,
    pub user_id: UserId,
    pub status: ApplicationStatus,
    pub submitted_at: DateTime<Utc>,
    pub answers: ApplicationAnswers,
    pub video_ref: BlobRef,
}

/// File handed over by a form before it is pushed to blob storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Registration form payload. The user id comes from the session, not the body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRequest {
    pub name: String,
    pub email: String,
    pub college: String,
    pub year: u32,
    pub college_email: String,
    #[serde(default)]
    pub primary_domain: Option<String>,
    #[serde(default)]
    pub college_id: Option<MediaUpload>,
}

/// Ambassador application form payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRequest {
    pub answers: ApplicationAnswers,
    pub video: MediaUpload,
}

/// Points and attendance granted for a community activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityAward {
    pub points: u32,
    #[serde(default)]
    pub attended_event: bool,
}

/// Event as persisted in the `events` collection.
///
/// `colleges` and `domains` hold the same slugs members carry on their profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityEvent {
    pub id: EventId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub target_years: Vec<u32>,
    #[serde(default)]
    pub colleges: Vec<String>,
    #[serde(default)]
    pub domains: Vec<String>,
    /// Ticket price in paise; zero means free.
    #[serde(default)]
    pub price: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub luma_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner_url: Option<String>,
}

impl CommunityEvent {
    pub fn is_free(&self) -> bool {
        self.price == 0
    }
}

/// Admin payload for publishing an event; the id is assigned on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub date: DateTime<Utc>,
    pub target_years: Vec<u32>,
    #[serde(default)]
    pub colleges: Vec<String>,
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub price: u32,
    #[serde(default)]
    pub luma_url: Option<String>,
    #[serde(default)]
    pub banner_url: Option<String>,
}
