use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::domain::{
    ActivityAward, AmbassadorApplication, ApplicationId, ApplicationRequest, BlobRef,
    CommunityEvent, EventDraft, EventId, MediaUpload, RegistrationRequest, Role, UserId,
    UserProfile,
};
use super::eligibility::{EligibilityCriteria, EligibilityEvaluator, EligibilityReport};
use super::events;
use super::intake::{self, IntakeViolation};
use super::repository::{
    ApplicationInsert, ApplicationRepository, BlobError, BlobStore, EventRepository,
    ModerationNotice, ModerationNotifier, ModerationReceipt, NoticeTemplate,
    PendingApplicationView, PendingEntry, RepositoryError, StatusWrite, UserRepository,
};
use super::status::{
    transition, ApplicationDecision, ApplicationStatus, InvalidTransition, ModeratedStatus,
    VerificationDecision, VerificationStatus,
};

/// Service composing the document store, blob storage, notifier, and the
/// eligibility rubric behind the member and admin workflows.
pub struct CommunityService<S, B, N> {
    store: Arc<S>,
    blobs: Arc<B>,
    notifier: Arc<N>,
    evaluator: EligibilityEvaluator,
}

static APPLICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static EVENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Fresh ids are drawn this many times before an insert gives up.
pub const ID_ATTEMPTS: usize = 3;

fn next_application_id() -> ApplicationId {
    let id = APPLICATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ApplicationId(format!("amb-{id:06}"))
}

fn next_event_id() -> EventId {
    let id = EVENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    EventId(format!("evt-{id:06}"))
}

impl<S, B, N> CommunityService<S, B, N>
where
    S: UserRepository + ApplicationRepository + EventRepository + 'static,
    B: BlobStore + 'static,
    N: ModerationNotifier + 'static,
{
    pub fn new(
        store: Arc<S>,
        blobs: Arc<B>,
        notifier: Arc<N>,
        criteria: EligibilityCriteria,
    ) -> Self {
        Self {
            store,
            blobs,
            notifier,
            evaluator: EligibilityEvaluator::new(criteria),
        }
    }

    pub fn criteria(&self) -> &EligibilityCriteria {
        self.evaluator.criteria()
    }

    /// Create the member profile for a freshly authenticated identity.
    pub fn register(
        &self,
        user_id: &UserId,
        request: RegistrationRequest,
    ) -> Result<UserProfile, IntakeError> {
        intake::validate_registration(&request)?;

        let college_id_ref = match &request.college_id {
            Some(upload) => Some(self.upload_college_id(user_id, upload)?),
            None => None,
        };

        let profile = UserProfile {
            id: user_id.clone(),
            name: request.name.trim().to_string(),
            email: request.email.trim().to_string(),
            college: request.college.trim().to_string(),
            college_email: request.college_email.trim().to_string(),
            year: request.year,
            primary_domain: request
                .primary_domain
                .as_deref()
                .map(str::trim)
                .filter(|domain| !domain.is_empty())
                .map(str::to_string),
            verification_status: VerificationStatus::Pending,
            role: Role::Member,
            points: 0,
            events_attended: 0,
            college_id_ref,
            created_at: Utc::now(),
        };

        let stored = self.store.insert_user(profile).map_err(|err| match err {
            RepositoryError::Conflict => IntakeError::Conflict {
                user_id: user_id.clone(),
                reason: ConflictReason::ProfileExists,
            },
            other => IntakeError::Repository(other),
        })?;

        info!(user = %stored.id, college = %stored.college, "member registered");
        Ok(stored)
    }

    /// Put a rejected verification back in the queue with a new college ID.
    pub fn resubmit_verification(
        &self,
        user_id: &UserId,
        college_id: MediaUpload,
    ) -> Result<UserProfile, IntakeError> {
        let profile = self.load_profile(user_id)?;
        // Checked before the upload; only a concurrent resubmission can strand a blob.
        let next = profile.verification_status.reopen(&user_id.0)?;
        let blob = self.upload_college_id(user_id, &college_id)?;

        match self.store.compare_and_set_verification(
            user_id,
            profile.verification_status,
            next,
            Some(blob),
        )? {
            StatusWrite::Applied => {}
            StatusWrite::Stale { current } => {
                let stale = InvalidTransition::new(&user_id.0, current.label(), next.label());
                return Err(stale.into());
            }
        }

        info!(user = %user_id, "verification resubmitted");
        self.load_profile(user_id)
    }

    pub fn eligibility(&self, user_id: &UserId) -> Result<EligibilityReport, IntakeError> {
        let profile = self.load_profile(user_id)?;
        Ok(self.evaluator.explain(&profile))
    }

    /// Submit an ambassador application on behalf of an eligible member.
    pub fn submit_application(
        &self,
        user_id: &UserId,
        request: ApplicationRequest,
    ) -> Result<AmbassadorApplication, IntakeError> {
        let profile = self.load_profile(user_id)?;

        let report = self.evaluator.explain(&profile);
        if !report.eligible {
            return Err(IntakeError::NotEligible(report));
        }

        intake::validate_answers(&request.answers)?;
        let content_type = intake::validate_video(&request.video)?;

        if profile.role != Role::Member {
            return Err(IntakeError::Conflict {
                user_id: user_id.clone(),
                reason: ConflictReason::RoleAlreadyGranted(profile.role),
            });
        }
        let existing = self.store.applications_for_user(user_id)?;
        if let Some(reason) = existing.iter().find_map(|app| match app.status {
            ApplicationStatus::Pending => Some(ConflictReason::PendingApplication),
            ApplicationStatus::Approved => Some(ConflictReason::AlreadyApproved),
            ApplicationStatus::Rejected => None,
        }) {
            return Err(IntakeError::Conflict {
                user_id: user_id.clone(),
                reason,
            });
        }

        let path = intake::ambassador_video_path(user_id, &request.video)?;
        let video_ref = self
            .blobs
            .upload(&path, &request.video.bytes, &content_type)?;

        let mut application = AmbassadorApplication {
            id: next_application_id(),
            user_id: user_id.clone(),
            status: ApplicationStatus::Pending,
            submitted_at: Utc::now(),
            answers: request.answers,
            video_ref,
        };

        let mut attempts = 1;
        let stored = loop {
            match self.store.insert_application(application.clone()) {
                Ok(ApplicationInsert::Inserted(stored)) => break stored,
                Ok(ApplicationInsert::IdTaken) if attempts < ID_ATTEMPTS => {
                    warn!(application = %application.id, "application id already taken");
                    application.id = next_application_id();
                    attempts += 1;
                }
                Ok(ApplicationInsert::IdTaken) => {
                    return Err(IntakeError::IdsExhausted {
                        kind: RecordKind::Application,
                        attempts,
                    });
                }
                Ok(ApplicationInsert::PendingExists) => {
                    return Err(IntakeError::Conflict {
                        user_id: user_id.clone(),
                        reason: ConflictReason::PendingApplication,
                    });
                }
                Err(err) => return Err(err.into()),
            }
        };

        info!(user = %user_id, application = %stored.id, "ambassador application submitted");
        Ok(stored)
    }

    /// Admin decision on a member's pending verification.
    pub fn resolve_verification(
        &self,
        user_id: &UserId,
        decision: VerificationDecision,
    ) -> Result<ModerationReceipt, ModerationError> {
        let profile = self
            .store
            .fetch_user(user_id)?
            .ok_or_else(|| ModerationError::not_found(RecordKind::User, &user_id.0))?;

        let target = transition(
            &user_id.0,
            profile.verification_status,
            VerificationStatus::from(decision),
        )?;

        match self.store.compare_and_set_verification(
            user_id,
            VerificationStatus::Pending,
            target,
            None,
        ) {
            Ok(StatusWrite::Applied) => {}
            Ok(StatusWrite::Stale { current }) => {
                return Err(
                    InvalidTransition::new(&user_id.0, current.label(), target.label()).into(),
                )
            }
            Err(RepositoryError::NotFound) => {
                return Err(ModerationError::not_found(RecordKind::User, &user_id.0))
            }
            Err(err) => return Err(err.into()),
        }

        info!(user = %user_id, status = target.label(), "verification resolved");

        let template = match decision {
            VerificationDecision::Verified => NoticeTemplate::UserVerified,
            VerificationDecision::Rejected => NoticeTemplate::UserRejected,
        };
        self.notify(ModerationNotice {
            template,
            user_id: user_id.clone(),
            application_id: None,
        });

        Ok(ModerationReceipt {
            evict: PendingEntry::Verification(user_id.clone()),
            status: target.label(),
        })
    }

    /// Admin decision on a pending ambassador application.
    ///
    /// Approval writes the application status and then moves the applicant from
    /// member to ambassador. The two writes are not atomic: if the role grant fails
    /// the application stays approved and [`ModerationError::PartialFailure`] is
    /// returned so the caller can run [`Self::reconcile_role_grant`]. An applicant
    /// who already holds ambassador or admin keeps that role.
    pub fn resolve_application(
        &self,
        application_id: &ApplicationId,
        decision: ApplicationDecision,
    ) -> Result<ModerationReceipt, ModerationError> {
        let application = self
            .store
            .fetch_application(application_id)?
            .ok_or_else(|| {
                ModerationError::not_found(RecordKind::Application, &application_id.0)
            })?;

        let target = transition(
            &application_id.0,
            application.status,
            ApplicationStatus::from(decision),
        )?;

        match self.store.compare_and_set_application(
            application_id,
            ApplicationStatus::Pending,
            target,
        ) {
            Ok(StatusWrite::Applied) => {}
            Ok(StatusWrite::Stale { current }) => {
                return Err(InvalidTransition::new(
                    &application_id.0,
                    current.label(),
                    target.label(),
                )
                .into())
            }
            Err(RepositoryError::NotFound) => {
                return Err(ModerationError::not_found(
                    RecordKind::Application,
                    &application_id.0,
                ))
            }
            Err(err) => return Err(err.into()),
        }

        if target == ApplicationStatus::Approved {
            match self.grant_ambassador(&application.user_id) {
                Ok(RoleGrant::Granted) => {}
                Ok(RoleGrant::AlreadyGranted) => info!(
                    application = %application_id,
                    user = %application.user_id,
                    "applicant already holds an elevated role; role left unchanged"
                ),
                Err(source) => {
                    warn!(
                        application = %application_id,
                        user = %application.user_id,
                        error = %source,
                        "application approved but ambassador role grant failed"
                    );
                    return Err(ModerationError::PartialFailure {
                        application_id: application_id.clone(),
                        user_id: application.user_id,
                        failed_write: WriteStep::RoleGrant,
                        source,
                    });
                }
            }
        }

        info!(
            application = %application_id,
            user = %application.user_id,
            status = target.label(),
            "ambassador application resolved"
        );

        let template = match decision {
            ApplicationDecision::Approved => NoticeTemplate::AmbassadorWelcome,
            ApplicationDecision::Rejected => NoticeTemplate::ApplicationRejected,
        };
        self.notify(ModerationNotice {
            template,
            user_id: application.user_id,
            application_id: Some(application_id.clone()),
        });

        Ok(ModerationReceipt {
            evict: PendingEntry::Application(application_id.clone()),
            status: target.label(),
        })
    }

    /// Re-apply the ambassador role for an approved application. Safe to retry;
    /// an applicant already holding ambassador or admin reports `AlreadyGranted`.
    pub fn reconcile_role_grant(
        &self,
        application_id: &ApplicationId,
    ) -> Result<RoleGrant, ModerationError> {
        let application = self
            .store
            .fetch_application(application_id)?
            .ok_or_else(|| {
                ModerationError::not_found(RecordKind::Application, &application_id.0)
            })?;

        if application.status != ApplicationStatus::Approved {
            return Err(ModerationError::NotApproved {
                application_id: application_id.clone(),
                status: application.status.label(),
            });
        }

        let grant = self
            .grant_ambassador(&application.user_id)
            .map_err(|err| match err {
                RepositoryError::NotFound => {
                    ModerationError::not_found(RecordKind::User, &application.user_id.0)
                }
                other => ModerationError::Repository(other),
            })?;
        if grant == RoleGrant::Granted {
            info!(
                application = %application_id,
                user = %application.user_id,
                "ambassador role grant reconciled"
            );
        }
        Ok(grant)
    }

    /// Credit points (and optionally an attended event) to a member.
    pub fn record_activity(
        &self,
        user_id: &UserId,
        award: ActivityAward,
    ) -> Result<UserProfile, ModerationError> {
        let profile = self
            .store
            .apply_award(user_id, award)
            .map_err(|err| match err {
                RepositoryError::NotFound => {
                    ModerationError::not_found(RecordKind::User, &user_id.0)
                }
                other => ModerationError::Repository(other),
            })?;
        info!(
            user = %user_id,
            points = profile.points,
            events = profile.events_attended,
            "activity recorded"
        );
        Ok(profile)
    }

    /// Publish an event to the discovery feed.
    pub fn publish_event(&self, draft: EventDraft) -> Result<CommunityEvent, IntakeError> {
        events::validate_event(&draft)?;

        let mut event = CommunityEvent {
            id: next_event_id(),
            title: draft.title.trim().to_string(),
            description: draft.description.trim().to_string(),
            date: draft.date,
            target_years: draft.target_years,
            colleges: slugs(draft.colleges),
            domains: slugs(draft.domains),
            price: draft.price,
            luma_url: draft.luma_url,
            banner_url: draft.banner_url,
        };

        let mut attempts = 1;
        let stored = loop {
            match self.store.insert_event(event.clone()) {
                Ok(stored) => break stored,
                Err(RepositoryError::Conflict) if attempts < ID_ATTEMPTS => {
                    event.id = next_event_id();
                    attempts += 1;
                }
                Err(RepositoryError::Conflict) => {
                    return Err(IntakeError::IdsExhausted {
                        kind: RecordKind::Event,
                        attempts,
                    })
                }
                Err(err) => return Err(err.into()),
            }
        };

        info!(event = %stored.id, date = %stored.date, "event published");
        Ok(stored)
    }

    /// Upcoming events aimed at the member's year and college or domain, soonest first.
    pub fn discover_events(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<CommunityEvent>, IntakeError> {
        let profile = self.load_profile(user_id)?;
        let candidates = self.store.events_for_year(profile.year)?;
        Ok(events::discover_events(candidates, &profile, now))
    }

    pub fn pending_verifications(&self, limit: usize) -> Result<Vec<UserProfile>, ModerationError> {
        Ok(self.store.pending_users(limit)?)
    }

    pub fn pending_applications(
        &self,
        limit: usize,
    ) -> Result<Vec<PendingApplicationView>, ModerationError> {
        self.store
            .pending_applications(limit)?
            .into_iter()
            .map(|application| -> Result<PendingApplicationView, ModerationError> {
                let applicant = self.store.fetch_user(&application.user_id)?;
                Ok(PendingApplicationView {
                    application,
                    applicant,
                })
            })
            .collect()
    }

    fn load_profile(&self, user_id: &UserId) -> Result<UserProfile, IntakeError> {
        self.store
            .fetch_user(user_id)?
            .ok_or_else(|| IntakeError::UserNotFound(user_id.clone()))
    }

    fn grant_ambassador(&self, user_id: &UserId) -> Result<RoleGrant, RepositoryError> {
        match self
            .store
            .compare_and_set_role(user_id, Role::Member, Role::Ambassador)?
        {
            StatusWrite::Applied => Ok(RoleGrant::Granted),
            StatusWrite::Stale { .. } => Ok(RoleGrant::AlreadyGranted),
        }
    }

    fn upload_college_id(
        &self,
        user_id: &UserId,
        upload: &MediaUpload,
    ) -> Result<BlobRef, IntakeError> {
        let content_type = intake::validate_college_id(upload)?;
        let path = intake::college_id_path(user_id, upload)?;
        Ok(self.blobs.upload(&path, &upload.bytes, &content_type)?)
    }

    // Decisions are already committed; a failed notice is logged, not returned.
    fn notify(&self, notice: ModerationNotice) {
        let template = notice.template.label();
        if let Err(err) = self.notifier.publish(notice) {
            warn!(template, error = %err, "moderation notice not delivered");
        }
    }
}

/// Record type named in a `NotFound` error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    User,
    Application,
    Event,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::User => f.write_str("user"),
            RecordKind::Application => f.write_str("application"),
            RecordKind::Event => f.write_str("event"),
        }
    }
}

/// Write that did not land during a multi-step moderation action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteStep {
    RoleGrant,
}

impl fmt::Display for WriteStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteStep::RoleGrant => f.write_str("ambassador role grant"),
        }
    }
}

/// Outcome of [`CommunityService::reconcile_role_grant`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleGrant {
    Granted,
    AlreadyGranted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictReason {
    ProfileExists,
    PendingApplication,
    AlreadyApproved,
    RoleAlreadyGranted(Role),
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictReason::ProfileExists => f.write_str("already has a profile"),
            ConflictReason::PendingApplication => {
                f.write_str("already has a pending ambassador application")
            }
            ConflictReason::AlreadyApproved => {
                f.write_str("already has an approved ambassador application")
            }
            ConflictReason::RoleAlreadyGranted(role) => {
                write!(f, "already holds the {} role", role.label())
            }
        }
    }
}

/// Error raised by admin moderation actions.
#[derive(Debug, thiserror::Error)]
pub enum ModerationError {
    #[error("{kind} {id} not found")]
    NotFound { kind: RecordKind, id: String },
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    #[error("application {application_id} for user {user_id}: {failed_write} failed: {source}")]
    PartialFailure {
        application_id: ApplicationId,
        user_id: UserId,
        failed_write: WriteStep,
        source: RepositoryError,
    },
    #[error("application {application_id} is {status}; only approved applications grant the ambassador role")]
    NotApproved {
        application_id: ApplicationId,
        status: &'static str,
    },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl ModerationError {
    fn not_found(kind: RecordKind, id: &str) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

/// Error raised by member-facing intake workflows.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error(transparent)]
    Invalid(#[from] IntakeViolation),
    #[error("user {0} not found")]
    UserNotFound(UserId),
    #[error("{}", .0.summary())]
    NotEligible(EligibilityReport),
    #[error("user {user_id} {reason}")]
    Conflict {
        user_id: UserId,
        reason: ConflictReason,
    },
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    #[error("no free {kind} id after {attempts} attempts")]
    IdsExhausted { kind: RecordKind, attempts: usize },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Blob(#[from] BlobError),
}

fn slugs(raw: Vec<String>) -> Vec<String> {
    raw.into_iter()
        .map(|slug| slug.trim().to_string())
        .filter(|slug| !slug.is_empty())
        .collect()
}
