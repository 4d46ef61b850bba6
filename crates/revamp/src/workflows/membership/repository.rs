use std::fmt;

use serde::{Deserialize, Serialize};

use super::domain::{
    ActivityAward, AmbassadorApplication, ApplicationId, BlobRef, CommunityEvent, Role, UserId,
    UserProfile,
};
use super::status::{ApplicationStatus, VerificationStatus};

/// Result of a status write conditioned on the record's current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusWrite<S> {
    Applied,
    Stale { current: S },
}

/// Typed view over the `users` collection.
pub trait UserRepository: Send + Sync {
    /// Fails with [`RepositoryError::Conflict`] when the id is already taken.
    fn insert_user(&self, profile: UserProfile) -> Result<UserProfile, RepositoryError>;
    fn fetch_user(&self, id: &UserId) -> Result<Option<UserProfile>, RepositoryError>;
    /// Writes `next` only if the stored status still equals `expected`. A
    /// `college_id_ref` of `None` leaves the stored reference untouched.
    fn compare_and_set_verification(
        &self,
        id: &UserId,
        expected: VerificationStatus,
        next: VerificationStatus,
        college_id_ref: Option<BlobRef>,
    ) -> Result<StatusWrite<VerificationStatus>, RepositoryError>;
    /// Writes `next` only if the stored role still equals `expected`.
    fn compare_and_set_role(
        &self,
        id: &UserId,
        expected: Role,
        next: Role,
    ) -> Result<StatusWrite<Role>, RepositoryError>;
    fn apply_award(&self, id: &UserId, award: ActivityAward)
        -> Result<UserProfile, RepositoryError>;
    fn pending_users(&self, limit: usize) -> Result<Vec<UserProfile>, RepositoryError>;
}

/// Outcome of an application insert. The pending check and the insert happen atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplicationInsert {
    Inserted(AmbassadorApplication),
    PendingExists,
    IdTaken,
}

/// Typed view over the `ambassadorApplications` collection.
pub trait ApplicationRepository: Send + Sync {
    fn insert_application(
        &self,
        application: AmbassadorApplication,
    ) -> Result<ApplicationInsert, RepositoryError>;
    fn fetch_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<AmbassadorApplication>, RepositoryError>;
    fn applications_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<AmbassadorApplication>, RepositoryError>;
    fn compare_and_set_application(
        &self,
        id: &ApplicationId,
        expected: ApplicationStatus,
        next: ApplicationStatus,
    ) -> Result<StatusWrite<ApplicationStatus>, RepositoryError>;
    fn pending_applications(
        &self,
        limit: usize,
    ) -> Result<Vec<AmbassadorApplication>, RepositoryError>;
}

/// Typed view over the `events` collection.
pub trait EventRepository: Send + Sync {
    /// Fails with [`RepositoryError::Conflict`] when the id is already taken.
    fn insert_event(&self, event: CommunityEvent) -> Result<CommunityEvent, RepositoryError>;
    /// Events whose target years include `year`, in any order.
    fn events_for_year(&self, year: u32) -> Result<Vec<CommunityEvent>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Blob storage used for college IDs and application videos.
pub trait BlobStore: Send + Sync {
    fn upload(
        &self,
        path: &str,
        bytes: &[u8],
        content_type: &mime::Mime,
    ) -> Result<BlobRef, BlobError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlobError {
    #[error("blob storage unavailable: {0}")]
    Unavailable(String),
}

/// Outbound hook for member-facing messages after a moderation decision.
pub trait ModerationNotifier: Send + Sync {
    fn publish(&self, notice: ModerationNotice) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeTemplate {
    UserVerified,
    UserRejected,
    AmbassadorWelcome,
    ApplicationRejected,
}

impl NoticeTemplate {
    pub const fn label(self) -> &'static str {
        match self {
            NoticeTemplate::UserVerified => "user_verified",
            NoticeTemplate::UserRejected => "user_rejected",
            NoticeTemplate::AmbassadorWelcome => "ambassador_welcome",
            NoticeTemplate::ApplicationRejected => "application_rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationNotice {
    pub template: NoticeTemplate,
    pub user_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_id: Option<ApplicationId>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Entry the caller should drop from its pending working set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum PendingEntry {
    Verification(UserId),
    Application(ApplicationId),
}

impl fmt::Display for PendingEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PendingEntry::Verification(id) => write!(f, "verification {id}"),
            PendingEntry::Application(id) => write!(f, "application {id}"),
        }
    }
}

/// Returned by a committed moderation decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModerationReceipt {
    pub evict: PendingEntry,
    pub status: &'static str,
}

/// Pending application joined with the applicant's profile, if it still exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingApplicationView {
    pub application: AmbassadorApplication,
    pub applicant: Option<UserProfile>,
}
