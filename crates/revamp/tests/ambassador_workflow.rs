//! End-to-end coverage of the member journey through the public router: registration,
//! verification, activity awards, ambassador application, and approval.

mod common {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use revamp::workflows::membership::{
        ActivityAward, AmbassadorApplication, ApplicationId, ApplicationInsert,
        ApplicationRepository, ApplicationStatus, BlobError, BlobRef, BlobStore, CommunityEvent,
        CommunityService, EligibilityCriteria, EventId, EventRepository, ModerationNotice,
        ModerationNotifier, NotifyError, RepositoryError, Role, StatusWrite, UserId, UserProfile,
        UserRepository, VerificationStatus,
    };

    #[derive(Default)]
    struct Collections {
        users: HashMap<UserId, UserProfile>,
        applications: HashMap<ApplicationId, AmbassadorApplication>,
        events: HashMap<EventId, CommunityEvent>,
    }

    #[derive(Default, Clone)]
    pub struct InMemoryStore {
        inner: Arc<Mutex<Collections>>,
    }

    impl InMemoryStore {
        pub fn user(&self, id: &str) -> Option<UserProfile> {
            let guard = self.inner.lock().expect("store mutex poisoned");
            guard.users.get(&UserId(id.to_string())).cloned()
        }
    }

    impl UserRepository for InMemoryStore {
        fn insert_user(&self, profile: UserProfile) -> Result<UserProfile, RepositoryError> {
            let mut guard = self.inner.lock().expect("store mutex poisoned");
            if guard.users.contains_key(&profile.id) {
                return Err(RepositoryError::Conflict);
            }
            guard.users.insert(profile.id.clone(), profile.clone());
            Ok(profile)
        }

        fn fetch_user(&self, id: &UserId) -> Result<Option<UserProfile>, RepositoryError> {
            Ok(self
                .inner
                .lock()
                .expect("store mutex poisoned")
                .users
                .get(id)
                .cloned())
        }

        fn compare_and_set_verification(
            &self,
            id: &UserId,
            expected: VerificationStatus,
            next: VerificationStatus,
            college_id_ref: Option<BlobRef>,
        ) -> Result<StatusWrite<VerificationStatus>, RepositoryError> {
            let mut guard = self.inner.lock().expect("store mutex poisoned");
            let user = guard.users.get_mut(id).ok_or(RepositoryError::NotFound)?;
            if user.verification_status != expected {
                return Ok(StatusWrite::Stale {
                    current: user.verification_status,
                });
            }
            user.verification_status = next;
            if college_id_ref.is_some() {
                user.college_id_ref = college_id_ref;
            }
            Ok(StatusWrite::Applied)
        }

        fn compare_and_set_role(
            &self,
            id: &UserId,
            expected: Role,
            next: Role,
        ) -> Result<StatusWrite<Role>, RepositoryError> {
            let mut guard = self.inner.lock().expect("store mutex poisoned");
            let user = guard.users.get_mut(id).ok_or(RepositoryError::NotFound)?;
            if user.role != expected {
                return Ok(StatusWrite::Stale { current: user.role });
            }
            user.role = next;
            Ok(StatusWrite::Applied)
        }

        fn apply_award(
            &self,
            id: &UserId,
            award: ActivityAward,
        ) -> Result<UserProfile, RepositoryError> {
            let mut guard = self.inner.lock().expect("store mutex poisoned");
            let user = guard.users.get_mut(id).ok_or(RepositoryError::NotFound)?;
            user.points += award.points;
            if award.attended_event {
                user.events_attended += 1;
            }
            Ok(user.clone())
        }

        fn pending_users(&self, limit: usize) -> Result<Vec<UserProfile>, RepositoryError> {
            let guard = self.inner.lock().expect("store mutex poisoned");
            Ok(guard
                .users
                .values()
                .filter(|user| user.verification_status == VerificationStatus::Pending)
                .take(limit)
                .cloned()
                .collect())
        }
    }

    impl ApplicationRepository for InMemoryStore {
        fn insert_application(
            &self,
            application: AmbassadorApplication,
        ) -> Result<ApplicationInsert, RepositoryError> {
            let mut guard = self.inner.lock().expect("store mutex poisoned");
            if guard.applications.values().any(|existing| {
                existing.user_id == application.user_id
                    && existing.status == ApplicationStatus::Pending
            }) {
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
            Ok(self
                .inner
                .lock()
                .expect("store mutex poisoned")
                .applications
                .get(id)
                .cloned())
        }

        fn applications_for_user(
            &self,
            user_id: &UserId,
        ) -> Result<Vec<AmbassadorApplication>, RepositoryError> {
            let guard = self.inner.lock().expect("store mutex poisoned");
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
            let mut guard = self.inner.lock().expect("store mutex poisoned");
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
            let guard = self.inner.lock().expect("store mutex poisoned");
            Ok(guard
                .applications
                .values()
                .filter(|application| application.status == ApplicationStatus::Pending)
                .take(limit)
                .cloned()
                .collect())
        }
    }

    impl EventRepository for InMemoryStore {
        fn insert_event(&self, event: CommunityEvent) -> Result<CommunityEvent, RepositoryError> {
            let mut guard = self.inner.lock().expect("store mutex poisoned");
            if guard.events.contains_key(&event.id) {
                return Err(RepositoryError::Conflict);
            }
            guard.events.insert(event.id.clone(), event.clone());
            Ok(event)
        }

        fn events_for_year(&self, year: u32) -> Result<Vec<CommunityEvent>, RepositoryError> {
            let guard = self.inner.lock().expect("store mutex poisoned");
            Ok(guard
                .events
                .values()
                .filter(|event| event.target_years.contains(&year))
                .cloned()
                .collect())
        }
    }

    #[derive(Default)]
    pub struct BucketBlobs;

    impl BlobStore for BucketBlobs {
        fn upload(
            &self,
            path: &str,
            _bytes: &[u8],
            _content_type: &mime::Mime,
        ) -> Result<BlobRef, BlobError> {
            Ok(BlobRef(format!("https://storage.test/{path}")))
        }
    }

    #[derive(Default, Clone)]
    pub struct RecordingNotifier {
        pub notices: Arc<Mutex<Vec<ModerationNotice>>>,
    }

    impl ModerationNotifier for RecordingNotifier {
        fn publish(&self, notice: ModerationNotice) -> Result<(), NotifyError> {
            self.notices
                .lock()
                .expect("notifier mutex poisoned")
                .push(notice);
            Ok(())
        }
    }

    pub type Service = CommunityService<InMemoryStore, BucketBlobs, RecordingNotifier>;

    pub fn build() -> (Arc<Service>, Arc<InMemoryStore>, Arc<RecordingNotifier>) {
        let store = Arc::new(InMemoryStore::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let service = Arc::new(CommunityService::new(
            store.clone(),
            Arc::new(BucketBlobs),
            notifier.clone(),
            EligibilityCriteria::default(),
        ));
        (service, store, notifier)
    }
}

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use revamp::workflows::membership::{
    community_router, NoticeTemplate, Role, VerificationStatus,
};
use serde_json::{json, Value};
use tower::ServiceExt;

fn call(method: Method, uri: &str, session: (&str, &str), body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-session-user", session.0)
        .header("x-session-role", session.1);
    match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .expect("request builds"),
        None => builder.body(Body::empty()).expect("request builds"),
    }
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json payload")
}

const MEMBER: (&str, &str) = ("stu-42", "member");
const ADMIN: (&str, &str) = ("admin-1", "admin");

#[tokio::test]
async fn member_becomes_ambassador_after_verification_activity_and_approval() {
    let (service, store, notifier) = common::build();
    let router = community_router(service);

    let registered = router
        .clone()
        .oneshot(call(
            Method::POST,
            "/api/v1/register",
            MEMBER,
            Some(json!({
                "name": "Priya Raman",
                "email": "priya@mail.test",
                "college": "Institute of Design",
                "year": 3,
                "college_email": "priya@iod.edu",
                "college_id": {
                    "file_name": "student-card.jpg",
                    "content_type": "image/jpeg",
                    "bytes": [255, 216, 255, 224]
                }
            })),
        ))
        .await
        .expect("register responds");
    assert_eq!(registered.status(), StatusCode::CREATED);
    assert_eq!(
        json_body(registered).await["college_id_ref"],
        "https://storage.test/college-ids/stu-42/student-card.jpg"
    );

    let queue = router
        .clone()
        .oneshot(call(Method::GET, "/api/v1/admin/verifications", ADMIN, None))
        .await
        .expect("queue responds");
    assert_eq!(json_body(queue).await[0]["id"], "stu-42");

    let verified = router
        .clone()
        .oneshot(call(
            Method::POST,
            "/api/v1/admin/verifications/stu-42",
            ADMIN,
            Some(json!({ "decision": "verified" })),
        ))
        .await
        .expect("verification responds");
    assert_eq!(verified.status(), StatusCode::OK);

    let early = router
        .clone()
        .oneshot(call(Method::GET, "/api/v1/me/eligibility", MEMBER, None))
        .await
        .expect("eligibility responds");
    assert_eq!(json_body(early).await["eligible"], false);

    for _ in 0..5 {
        let awarded = router
            .clone()
            .oneshot(call(
                Method::POST,
                "/api/v1/admin/activity/stu-42",
                ADMIN,
                Some(json!({ "points": 100, "attended_event": true })),
            ))
            .await
            .expect("award responds");
        assert_eq!(awarded.status(), StatusCode::OK);
    }

    let ready = router
        .clone()
        .oneshot(call(Method::GET, "/api/v1/me/eligibility", MEMBER, None))
        .await
        .expect("eligibility responds");
    assert_eq!(json_body(ready).await["eligible"], true);

    let submitted = router
        .clone()
        .oneshot(call(
            Method::POST,
            "/api/v1/ambassador/applications",
            MEMBER,
            Some(json!({
                "answers": {
                    "why": "x".repeat(110),
                    "what": "y".repeat(150),
                    "experience": "z".repeat(55)
                },
                "video": {
                    "file_name": "intro.webm",
                    "content_type": "video/webm",
                    "bytes": [26, 69, 223, 163]
                }
            })),
        ))
        .await
        .expect("application responds");
    assert_eq!(submitted.status(), StatusCode::ACCEPTED);
    let application_id = json_body(submitted).await["id"]
        .as_str()
        .expect("application id")
        .to_string();

    let pending = router
        .clone()
        .oneshot(call(Method::GET, "/api/v1/admin/ambassadors", ADMIN, None))
        .await
        .expect("pending responds");
    let pending = json_body(pending).await;
    assert_eq!(pending[0]["application"]["id"], application_id.as_str());
    assert_eq!(pending[0]["applicant"]["name"], "Priya Raman");

    let approved = router
        .clone()
        .oneshot(call(
            Method::POST,
            &format!("/api/v1/admin/ambassadors/{application_id}"),
            ADMIN,
            Some(json!({ "decision": "approved" })),
        ))
        .await
        .expect("approval responds");
    assert_eq!(approved.status(), StatusCode::OK);
    let receipt = json_body(approved).await;
    assert_eq!(receipt["evict"]["kind"], "application");
    assert_eq!(receipt["status"], "approved");

    let profile = store.user("stu-42").expect("profile stored");
    assert_eq!(profile.role, Role::Ambassador);
    assert_eq!(profile.verification_status, VerificationStatus::Verified);

    let templates = notifier
        .notices
        .lock()
        .expect("notifier mutex poisoned")
        .iter()
        .map(|notice| notice.template)
        .collect::<Vec<_>>();
    assert_eq!(
        templates,
        vec![NoticeTemplate::UserVerified, NoticeTemplate::AmbassadorWelcome]
    );

    let admin_page = router
        .oneshot(call(
            Method::POST,
            "/api/v1/access/decide",
            ("stu-42", "ambassador"),
            Some(json!({ "path": "/admin" })),
        ))
        .await
        .expect("access responds");
    assert_eq!(json_body(admin_page).await["decision"], "deny");
}

#[tokio::test]
async fn duplicate_applications_and_repeat_decisions_conflict() {
    let (service, _, _) = common::build();
    let router = community_router(service.clone());

    let registered = router
        .clone()
        .oneshot(call(
            Method::POST,
            "/api/v1/register",
            ("stu-7", "member"),
            Some(json!({
                "name": "Tomas Ruiz",
                "email": "tomas@mail.test",
                "college": "Polytechnic",
                "year": 2,
                "college_email": "tomas@poly.edu"
            })),
        ))
        .await
        .expect("register responds");
    assert_eq!(registered.status(), StatusCode::CREATED);

    let again = router
        .clone()
        .oneshot(call(
            Method::POST,
            "/api/v1/register",
            ("stu-7", "member"),
            Some(json!({
                "name": "Tomas Ruiz",
                "email": "tomas@mail.test",
                "college": "Polytechnic",
                "year": 2,
                "college_email": "tomas@poly.edu"
            })),
        ))
        .await
        .expect("register responds");
    assert_eq!(again.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(again).await["reason"], "profile_exists");

    for expected in [StatusCode::OK, StatusCode::CONFLICT] {
        let response = router
            .clone()
            .oneshot(call(
                Method::POST,
                "/api/v1/admin/verifications/stu-7",
                ADMIN,
                Some(json!({ "decision": "rejected" })),
            ))
            .await
            .expect("verification responds");
        assert_eq!(response.status(), expected);
    }

    let resubmitted = router
        .oneshot(call(
            Method::POST,
            "/api/v1/me/verification",
            ("stu-7", "member"),
            Some(json!({
                "file_name": "id-scan.pdf",
                "content_type": "application/pdf",
                "bytes": [37, 80, 68, 70]
            })),
        ))
        .await
        .expect("resubmission responds");
    assert_eq!(resubmitted.status(), StatusCode::OK);
    assert_eq!(json_body(resubmitted).await["verification_status"], "pending");
}
