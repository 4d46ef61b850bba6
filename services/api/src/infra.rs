use metrics_exporter_prometheus::PrometheusHandle;
use revamp::workflows::membership::{
    ActivityAward, AmbassadorApplication, ApplicationId, ApplicationInsert, ApplicationRepository,
    ApplicationStatus, BlobError, BlobRef, BlobStore, CommunityEvent, EventId, EventRepository,
    ModerationNotice, ModerationNotifier, NotifyError, RepositoryError, Role, StatusWrite, UserId,
    UserProfile, UserRepository, VerificationStatus,
};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default)]
struct Collections {
    users: HashMap<UserId, UserProfile>,
    applications: HashMap<ApplicationId, AmbassadorApplication>,
    events: HashMap<EventId, CommunityEvent>,
}

/// Process-local stand-in for the `users`, `ambassadorApplications`, and `events`
/// collections. All live under one lock so conditional writes are atomic.
#[derive(Default, Clone)]
pub(crate) struct InMemoryCommunityStore {
    collections: Arc<Mutex<Collections>>,
}

impl InMemoryCommunityStore {
    fn lock(&self) -> Result<MutexGuard<'_, Collections>, RepositoryError> {
        self.collections
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store lock poisoned".to_string()))
    }
}

fn oldest_first<T, K: Ord>(mut items: Vec<T>, key: impl Fn(&T) -> K, limit: usize) -> Vec<T> {
    items.sort_by_key(key);
    items.truncate(limit);
    items
}

impl UserRepository for InMemoryCommunityStore {
    fn insert_user(&self, profile: UserProfile) -> Result<UserProfile, RepositoryError> {
        let mut guard = self.lock()?;
        if guard.users.contains_key(&profile.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.users.insert(profile.id.clone(), profile.clone());
        Ok(profile)
    }

    fn fetch_user(&self, id: &UserId) -> Result<Option<UserProfile>, RepositoryError> {
        Ok(self.lock()?.users.get(id).cloned())
    }

    fn compare_and_set_verification(
        &self,
        id: &UserId,
        expected: VerificationStatus,
        next: VerificationStatus,
        college_id_ref: Option<BlobRef>,
    ) -> Result<StatusWrite<VerificationStatus>, RepositoryError> {
        let mut guard = self.lock()?;
        let profile = guard.users.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if profile.verification_status != expected {
            return Ok(StatusWrite::Stale {
                current: profile.verification_status,
            });
        }
        profile.verification_status = next;
        if college_id_ref.is_some() {
            profile.college_id_ref = college_id_ref;
        }
        Ok(StatusWrite::Applied)
    }

    fn compare_and_set_role(
        &self,
        id: &UserId,
        expected: Role,
        next: Role,
    ) -> Result<StatusWrite<Role>, RepositoryError> {
        let mut guard = self.lock()?;
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
        let mut guard = self.lock()?;
        let profile = guard.users.get_mut(id).ok_or(RepositoryError::NotFound)?;
        profile.points = profile.points.saturating_add(award.points);
        if award.attended_event {
            profile.events_attended = profile.events_attended.saturating_add(1);
        }
        Ok(profile.clone())
    }

    fn pending_users(&self, limit: usize) -> Result<Vec<UserProfile>, RepositoryError> {
        let guard = self.lock()?;
        let pending = guard
            .users
            .values()
            .filter(|profile| profile.verification_status == VerificationStatus::Pending)
            .cloned()
            .collect();
        Ok(oldest_first(pending, |profile| profile.created_at, limit))
    }
}

impl ApplicationRepository for InMemoryCommunityStore {
    fn insert_application(
        &self,
        application: AmbassadorApplication,
    ) -> Result<ApplicationInsert, RepositoryError> {
        let mut guard = self.lock()?;
        let has_pending = guard.applications.values().any(|existing| {
            existing.user_id == application.user_id && existing.status == ApplicationStatus::Pending
        });
        if has_pending {
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
        Ok(self.lock()?.applications.get(id).cloned())
    }

    fn applications_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<AmbassadorApplication>, RepositoryError> {
        let guard = self.lock()?;
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
        let mut guard = self.lock()?;
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
        let guard = self.lock()?;
        let pending = guard
            .applications
            .values()
            .filter(|application| application.status == ApplicationStatus::Pending)
            .cloned()
            .collect();
        Ok(oldest_first(pending, |application| application.submitted_at, limit))
    }
}

impl EventRepository for InMemoryCommunityStore {
    fn insert_event(&self, event: CommunityEvent) -> Result<CommunityEvent, RepositoryError> {
        let mut guard = self.lock()?;
        if guard.events.contains_key(&event.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.events.insert(event.id.clone(), event.clone());
        Ok(event)
    }

    fn events_for_year(&self, year: u32) -> Result<Vec<CommunityEvent>, RepositoryError> {
        let guard = self.lock()?;
        Ok(guard
            .events
            .values()
            .filter(|event| event.target_years.contains(&year))
            .cloned()
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StoredBlob {
    pub(crate) content_type: String,
    pub(crate) size: usize,
}

/// Keeps object metadata only; bytes are discarded after upload.
#[derive(Default, Clone)]
pub(crate) struct InMemoryBlobStore {
    objects: Arc<Mutex<HashMap<String, StoredBlob>>>,
}

impl InMemoryBlobStore {
    pub(crate) fn object(&self, path: &str) -> Option<StoredBlob> {
        self.objects
            .lock()
            .ok()
            .and_then(|objects| objects.get(path).cloned())
    }
}

impl BlobStore for InMemoryBlobStore {
    fn upload(
        &self,
        path: &str,
        bytes: &[u8],
        content_type: &mime::Mime,
    ) -> Result<BlobRef, BlobError> {
        let mut objects = self
            .objects
            .lock()
            .map_err(|_| BlobError::Unavailable("blob index lock poisoned".to_string()))?;
        objects.insert(
            path.to_string(),
            StoredBlob {
                content_type: content_type.essence_str().to_string(),
                size: bytes.len(),
            },
        );
        Ok(BlobRef(format!("memory://{path}")))
    }
}

/// Logs each notice and keeps it for inspection.
#[derive(Default, Clone)]
pub(crate) struct InMemoryNotifier {
    notices: Arc<Mutex<Vec<ModerationNotice>>>,
}

impl InMemoryNotifier {
    pub(crate) fn notices(&self) -> Vec<ModerationNotice> {
        self.notices
            .lock()
            .map(|notices| notices.clone())
            .unwrap_or_default()
    }
}

impl ModerationNotifier for InMemoryNotifier {
    fn publish(&self, notice: ModerationNotice) -> Result<(), NotifyError> {
        info!(
            template = notice.template.label(),
            user = %notice.user_id,
            "moderation notice queued"
        );
        self.notices
            .lock()
            .map_err(|_| NotifyError::Transport("notice queue lock poisoned".to_string()))?
            .push(notice);
        Ok(())
    }
}
