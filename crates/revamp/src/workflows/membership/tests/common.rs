use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::membership::domain::{
    ActivityAward, AmbassadorApplication, ApplicationAnswers, ApplicationId, ApplicationRequest,
    BlobRef, CommunityEvent, EventDraft, EventId, MediaUpload, RegistrationRequest, Role, UserId,
    UserProfile,
};
use crate::workflows::membership::repository::{
    ApplicationInsert, ApplicationRepository, BlobError, BlobStore, EventRepository,
    ModerationNotice, ModerationNotifier, NotifyError, RepositoryError, StatusWrite,
    UserRepository,
};
use crate::workflows::membership::status::{ApplicationStatus, VerificationStatus};
use crate::workflows::membership::{community_router, CommunityService, EligibilityCriteria};

pub(super) type TestService = CommunityService<MemoryStore, MemoryBlobs, MemoryNotifier>;

pub(super) fn user_id(raw: &str) -> UserId {
    UserId(raw.to_string())
}

pub(super) fn profile(id: &str, points: u32, events_attended: u32, year: u32) -> UserProfile {
    UserProfile {
        id: user_id(id),
        name: "Ada Lovelace".to_string(),
        email: format!("{id}@mail.test"),
        college: "Analytical College".to_string(),
        college_email: format!("{id}@college.edu"),
        year,
        primary_domain: Some("web-dev".to_string()),
        verification_status: VerificationStatus::Verified,
        role: Role::Member,
        points,
        events_attended,
        college_id_ref: None,
        created_at: Utc
            .with_ymd_and_hms(2025, 9, 1, 12, 0, 0)
            .single()
            .expect("valid timestamp"),
    }
}

pub(super) fn eligible_profile(id: &str) -> UserProfile {
    profile(id, 640, 7, 3)
}

pub(super) fn pending_profile(id: &str) -> UserProfile {
    let mut profile = profile(id, 0, 0, 1);
    profile.verification_status = VerificationStatus::Pending;
    profile
}

pub(super) fn upload(name: &str, content_type: &str, len: usize) -> MediaUpload {
    MediaUpload {
        file_name: name.to_string(),
        content_type: content_type.to_string(),
        bytes: vec![7u8; len],
    }
}

pub(super) fn registration() -> RegistrationRequest {
    RegistrationRequest {
        name: "Grace Hopper".to_string(),
        email: "grace@mail.test".to_string(),
        college: "Navy College".to_string(),
        year: 2,
        college_email: "grace@navy.edu".to_string(),
        primary_domain: Some("  systems ".to_string()),
        college_id: Some(upload("id-card.png", "image/png", 2048)),
    }
}

pub(super) fn answers() -> ApplicationAnswers {
    ApplicationAnswers {
        why: "w".repeat(120),
        what: "a".repeat(140),
        experience: "e".repeat(60),
    }
}

pub(super) fn application_request() -> ApplicationRequest {
    ApplicationRequest {
        answers: answers(),
        video: upload("pitch.mp4", "video/mp4", 4096),
    }
}

pub(super) fn stored_application(
    id: &str,
    user: &str,
    status: ApplicationStatus,
) -> AmbassadorApplication {
    AmbassadorApplication {
        id: ApplicationId(id.to_string()),
        user_id: user_id(user),
        status,
        submitted_at: Utc
            .with_ymd_and_hms(2025, 10, 2, 9, 30, 0)
            .single()
            .expect("valid timestamp"),
        answers: answers(),
        video_ref: BlobRef(format!("memory://ambassador-videos/{user}/pitch.mp4")),
    }
}

/// Fixed clock for discovery tests.
pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 1, 10, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn event_draft(title: &str, days_ahead: i64, years: &[u32]) -> EventDraft {
    EventDraft {
        title: title.to_string(),
        description: "Hands-on session".to_string(),
        date: now() + Duration::days(days_ahead),
        target_years: years.to_vec(),
        colleges: vec![" Analytical College ".to_string(), String::new()],
        domains: Vec::new(),
        price: 0,
        luma_url: Some("https://lu.ma/session".to_string()),
        banner_url: None,
    }
}

pub(super) fn build_service() -> (
    TestService,
    Arc<MemoryStore>,
    Arc<MemoryBlobs>,
    Arc<MemoryNotifier>,
) {
    let store = Arc::new(MemoryStore::default());
    let blobs = Arc::new(MemoryBlobs::default());
    let notifier = Arc::new(MemoryNotifier::default());
    let service = CommunityService::new(
        store.clone(),
        blobs.clone(),
        notifier.clone(),
        EligibilityCriteria::default(),
    );
    (service, store, blobs, notifier)
}

#[derive(Default)]
struct Records {
    users: HashMap<UserId, UserProfile>,
    applications: HashMap<ApplicationId, AmbassadorApplication>,
    events: HashMap<EventId, CommunityEvent>,
}

/// All collections behind one lock so conditional writes are atomic.
#[derive(Default, Clone)]
pub(super) struct MemoryStore {
    records: Arc<Mutex<Records>>,
    fail_role_grant: Arc<AtomicBool>,
    offline: Arc<AtomicBool>,
    taken_ids: Arc<AtomicUsize>,
    verification_race: Arc<AtomicBool>,
}

impl MemoryStore {
    pub(super) fn seed_user(&self, profile: UserProfile) {
        self.records
            .lock()
            .expect("store mutex poisoned")
            .users
            .insert(profile.id.clone(), profile);
    }

    pub(super) fn seed_application(&self, application: AmbassadorApplication) {
        self.records
            .lock()
            .expect("store mutex poisoned")
            .applications
            .insert(application.id.clone(), application);
    }

    pub(super) fn user(&self, id: &str) -> UserProfile {
        self.records
            .lock()
            .expect("store mutex poisoned")
            .users
            .get(&user_id(id))
            .cloned()
            .expect("user present")
    }

    pub(super) fn has_user(&self, id: &str) -> bool {
        self.records
            .lock()
            .expect("store mutex poisoned")
            .users
            .contains_key(&user_id(id))
    }

    pub(super) fn application(&self, id: &ApplicationId) -> AmbassadorApplication {
        self.records
            .lock()
            .expect("store mutex poisoned")
            .applications
            .get(id)
            .cloned()
            .expect("application present")
    }

    pub(super) fn application_count(&self) -> usize {
        self.records
            .lock()
            .expect("store mutex poisoned")
            .applications
            .len()
    }

    pub(super) fn seed_event(&self, event: CommunityEvent) {
        self.records
            .lock()
            .expect("store mutex poisoned")
            .events
            .insert(event.id.clone(), event);
    }

    pub(super) fn set_role(&self, id: &str, role: Role) {
        self.records
            .lock()
            .expect("store mutex poisoned")
            .users
            .get_mut(&user_id(id))
            .expect("user present")
            .role = role;
    }

    /// The next verification write finds another resubmission already landed.
    pub(super) fn lose_next_verification_race(&self) {
        self.verification_race.store(true, Ordering::SeqCst);
    }

    /// The next `count` inserts find their generated id already in use.
    pub(super) fn claim_next_ids(&self, count: usize) {
        self.taken_ids.store(count, Ordering::SeqCst);
    }

    fn id_taken(&self) -> bool {
        self.taken_ids
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }

    pub(super) fn fail_role_grants(&self, fail: bool) {
        self.fail_role_grant.store(fail, Ordering::SeqCst);
    }

    pub(super) fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), RepositoryError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(RepositoryError::Unavailable("database offline".to_string()))
        } else {
            Ok(())
        }
    }
}

impl UserRepository for MemoryStore {
    fn insert_user(&self, profile: UserProfile) -> Result<UserProfile, RepositoryError> {
        self.check_online()?;
        let mut guard = self.records.lock().expect("store mutex poisoned");
        if guard.users.contains_key(&profile.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.users.insert(profile.id.clone(), profile.clone());
        Ok(profile)
    }

    fn fetch_user(&self, id: &UserId) -> Result<Option<UserProfile>, RepositoryError> {
        self.check_online()?;
        let guard = self.records.lock().expect("store mutex poisoned");
        Ok(guard.users.get(id).cloned())
    }

    fn compare_and_set_verification(
        &self,
        id: &UserId,
        expected: VerificationStatus,
        next: VerificationStatus,
        college_id_ref: Option<BlobRef>,
    ) -> Result<StatusWrite<VerificationStatus>, RepositoryError> {
        self.check_online()?;
        let mut guard = self.records.lock().expect("store mutex poisoned");
        let profile = guard.users.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if self.verification_race.swap(false, Ordering::SeqCst) {
            profile.verification_status = VerificationStatus::Pending;
            profile.college_id_ref = Some(BlobRef("memory://college-ids/winner.png".to_string()));
        }
        if profile.verification_status != expected {
            return Ok(StatusWrite::Stale {
                current: profile.verification_status,
            });
        }
        profile.verification_status = next;
        if let Some(blob) = college_id_ref {
            profile.college_id_ref = Some(blob);
        }
        Ok(StatusWrite::Applied)
    }

    fn compare_and_set_role(
        &self,
        id: &UserId,
        expected: Role,
        next: Role,
    ) -> Result<StatusWrite<Role>, RepositoryError> {
        self.check_online()?;
        if self.fail_role_grant.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable(
                "write quota exceeded".to_string(),
            ));
        }
        let mut guard = self.records.lock().expect("store mutex poisoned");
        let profile = guard.users.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if profile.role != expected {
            return Ok(StatusWrite::Stale {
                current: profile.role,
            });
        }
        profile.role = next;
        Ok(StatusWrite::Applied)
    }

    fn apply_award(
        &self,
        id: &UserId,
        award: ActivityAward,
    ) -> Result<UserProfile, RepositoryError> {
        self.check_online()?;
        let mut guard = self.records.lock().expect("store mutex poisoned");
        let profile = guard.users.get_mut(id).ok_or(RepositoryError::NotFound)?;
        profile.points = profile.points.saturating_add(award.points);
        if award.attended_event {
            profile.events_attended = profile.events_attended.saturating_add(1);
        }
        Ok(profile.clone())
    }

    fn pending_users(&self, limit: usize) -> Result<Vec<UserProfile>, RepositoryError> {
        self.check_online()?;
        let guard = self.records.lock().expect("store mutex poisoned");
        let mut pending = guard
            .users
            .values()
            .filter(|profile| profile.verification_status == VerificationStatus::Pending)
            .cloned()
            .collect::<Vec<_>>();
        pending.sort_by(|a, b| a.id.cmp(&b.id));
        pending.truncate(limit);
        Ok(pending)
    }
}

impl ApplicationRepository for MemoryStore {
    fn insert_application(
        &self,
        application: AmbassadorApplication,
    ) -> Result<ApplicationInsert, RepositoryError> {
        self.check_online()?;
        if self.id_taken() {
            return Ok(ApplicationInsert::IdTaken);
        }
        let mut guard = self.records.lock().expect("store mutex poisoned");
        let duplicate = guard.applications.values().any(|existing| {
            existing.user_id == application.user_id && existing.status == ApplicationStatus::Pending
        });
        if duplicate {
            return Ok(ApplicationInsert::PendingExists);
        }
        if guard.applications.contains_key(&application.id) {
            return Ok(ApplicationInsert::IdTaken);
        }
        guard
            .applications
            .insert(application.id.clone(), application.clone());
        Ok(ApplicationInsert::Inserted(application))
    }

    fn fetch_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<AmbassadorApplication>, RepositoryError> {
        self.check_online()?;
        let guard = self.records.lock().expect("store mutex poisoned");
        Ok(guard.applications.get(id).cloned())
    }

    fn applications_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<AmbassadorApplication>, RepositoryError> {
        self.check_online()?;
        let guard = self.records.lock().expect("store mutex poisoned");
        Ok(guard
            .applications
            .values()
            .filter(|application| &application.user_id == user_id)
            .cloned()
            .collect())
    }

    fn compare_and_set_application(
        &self,
        id: &ApplicationId,
        expected: ApplicationStatus,
        next: ApplicationStatus,
    ) -> Result<StatusWrite<ApplicationStatus>, RepositoryError> {
        self.check_online()?;
        let mut guard = self.records.lock().expect("store mutex poisoned");
        let application = guard
            .applications
            .get_mut(id)
            .ok_or(RepositoryError::NotFound)?;
        if application.status != expected {
            return Ok(StatusWrite::Stale {
                current: application.status,
            });
        }
        application.status = next;
        Ok(StatusWrite::Applied)
    }

    fn pending_applications(
        &self,
        limit: usize,
    ) -> Result<Vec<AmbassadorApplication>, RepositoryError> {
        self.check_online()?;
        let guard = self.records.lock().expect("store mutex poisoned");
        let mut pending = guard
            .applications
            .values()
            .filter(|application| application.status == ApplicationStatus::Pending)
            .cloned()
            .collect::<Vec<_>>();
        pending.sort_by(|a, b| a.id.cmp(&b.id));
        pending.truncate(limit);
        Ok(pending)
    }
}

impl EventRepository for MemoryStore {
    fn insert_event(&self, event: CommunityEvent) -> Result<CommunityEvent, RepositoryError> {
        self.check_online()?;
        if self.id_taken() {
            return Err(RepositoryError::Conflict);
        }
        let mut guard = self.records.lock().expect("store mutex poisoned");
        if guard.events.contains_key(&event.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.events.insert(event.id.clone(), event.clone());
        Ok(event)
    }

    fn events_for_year(&self, year: u32) -> Result<Vec<CommunityEvent>, RepositoryError> {
        self.check_online()?;
        let guard = self.records.lock().expect("store mutex poisoned");
        Ok(guard
            .events
            .values()
            .filter(|event| event.target_years.contains(&year))
            .cloned()
            .collect())
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryBlobs {
    uploads: Arc<Mutex<Vec<(String, String)>>>,
    offline: Arc<AtomicBool>,
}

impl MemoryBlobs {
    /// Stored `(path, content type)` pairs in upload order.
    pub(super) fn uploads(&self) -> Vec<(String, String)> {
        self.uploads.lock().expect("blob mutex poisoned").clone()
    }

    pub(super) fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }
}

impl BlobStore for MemoryBlobs {
    fn upload(
        &self,
        path: &str,
        _bytes: &[u8],
        content_type: &mime::Mime,
    ) -> Result<BlobRef, BlobError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(BlobError::Unavailable("bucket offline".to_string()));
        }
        self.uploads
            .lock()
            .expect("blob mutex poisoned")
            .push((path.to_string(), content_type.essence_str().to_string()));
        Ok(BlobRef(format!("memory://{path}")))
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryNotifier {
    events: Arc<Mutex<Vec<ModerationNotice>>>,
}

impl MemoryNotifier {
    pub(super) fn events(&self) -> Vec<ModerationNotice> {
        self.events.lock().expect("notifier mutex poisoned").clone()
    }
}

impl ModerationNotifier for MemoryNotifier {
    fn publish(&self, notice: ModerationNotice) -> Result<(), NotifyError> {
        self.events
            .lock()
            .expect("notifier mutex poisoned")
            .push(notice);
        Ok(())
    }
}

pub(super) struct BrokenNotifier;

impl ModerationNotifier for BrokenNotifier {
    fn publish(&self, _notice: ModerationNotice) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("smtp relay refused".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn router_with_service(service: TestService) -> axum::Router {
    community_router(Arc::new(service))
}
