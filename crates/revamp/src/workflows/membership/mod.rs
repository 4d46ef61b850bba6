//! Member onboarding, ambassador applications, and admin moderation.
//!
//! Pure decision logic lives in [`status`], [`eligibility`], [`events`], and [`access`];
//! [`service::CommunityService`] sequences those decisions against the store,
//! blob storage, and notifier traits defined in [`repository`].

pub mod access;
pub mod domain;
pub mod eligibility;
pub mod events;
pub mod intake;
pub mod repository;
pub mod router;
pub mod service;
pub mod status;

#[cfg(test)]
mod tests;

pub use access::{
    decide, AccessDecision, AccessPolicy, RouteClass, RouteTable, SessionContext,
};
pub use domain::{
    ActivityAward, AmbassadorApplication, ApplicationAnswers, ApplicationId, ApplicationRequest,
    BlobRef, CommunityEvent, EventDraft, EventId, MediaUpload, RegistrationRequest, Role, UserId,
    UserProfile,
};
pub use eligibility::{
    explain_eligibility, is_eligible_for_ambassador, Criterion, CriterionResult,
    EligibilityCriteria, EligibilityEvaluator, EligibilityReport,
};
pub use events::{discover_events, is_visible_to};
pub use intake::IntakeViolation;
pub use repository::{
    ApplicationInsert, ApplicationRepository, BlobError, BlobStore, EventRepository,
    ModerationNotice, ModerationNotifier, ModerationReceipt, NoticeTemplate, NotifyError,
    PendingApplicationView, PendingEntry, RepositoryError, StatusWrite, UserRepository,
};
pub use router::community_router;
pub use service::{
    CommunityService, ConflictReason, IntakeError, ModerationError, RecordKind, RoleGrant,
    WriteStep,
};
pub use status::{
    transition, ApplicationDecision, ApplicationStatus, InvalidTransition, ModeratedStatus,
    VerificationDecision, VerificationStatus,
};
