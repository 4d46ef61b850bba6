use crate::infra::{InMemoryBlobStore, InMemoryCommunityStore, InMemoryNotifier};
use chrono::{Duration, Utc};
use clap::Args;
use revamp::config::AppConfig;
use revamp::error::AppError;
use revamp::workflows::membership::{
    AccessPolicy, ActivityAward, ApplicationAnswers, ApplicationDecision, ApplicationRequest,
    CommunityService, EligibilityCriteria, EligibilityEvaluator, EligibilityReport, EventDraft,
    MediaUpload,
    ModeratedStatus, RegistrationRequest, Role, RouteTable, SessionContext, UserId, UserProfile,
    VerificationDecision, VerificationStatus,
};
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Session user id for the demo member
    #[arg(long, default_value = "demo-student")]
    pub(crate) member: String,
    /// File name of the uploaded college ID; its extension picks the content type
    #[arg(long, default_value = "student-id.png")]
    pub(crate) college_id: String,
    /// File name of the application video; its extension picks the content type
    #[arg(long, default_value = "ambassador-pitch.mp4")]
    pub(crate) video: String,
    /// Events the member attends before applying (100 points each)
    #[arg(long, default_value_t = 5)]
    pub(crate) events: u32,
    /// Reject the application instead of approving it
    #[arg(long)]
    pub(crate) reject: bool,
}

#[derive(Args, Debug)]
pub(crate) struct EligibilityArgs {
    /// Accumulated community points
    #[arg(long)]
    pub(crate) points: u32,
    /// Events attended
    #[arg(long)]
    pub(crate) events: u32,
    /// Year of study
    #[arg(long)]
    pub(crate) year: u32,
}

#[derive(Args, Debug)]
pub(crate) struct AccessArgs {
    /// Page path to evaluate, e.g. /admin/users
    #[arg(long)]
    pub(crate) path: String,
    /// Evaluate as a signed-in caller
    #[arg(long)]
    pub(crate) session: bool,
    /// Caller role (member, ambassador, admin)
    #[arg(long, value_parser = parse_role, default_value = "member")]
    pub(crate) role: Role,
}

fn parse_role(raw: &str) -> Result<Role, String> {
    Role::parse(raw)
        .ok_or_else(|| format!("unknown role '{raw}' (expected member, ambassador, or admin)"))
}

fn media(file_name: &str, bytes: usize) -> MediaUpload {
    MediaUpload {
        file_name: file_name.to_string(),
        content_type: mime_guess::from_path(file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string(),
        bytes: vec![0u8; bytes],
    }
}

fn render_report(report: &EligibilityReport) {
    println!("  {}", report.summary());
    for result in &report.criteria {
        let mark = if result.satisfied { "ok" } else { "missing" };
        println!(
            "    - {}: {} / {} ({mark})",
            result.criterion.label(),
            result.actual,
            result.required
        );
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        member,
        college_id,
        video,
        events,
        reject,
    } = args;
    let criteria = AppConfig::load()?.ambassador;

    let store = Arc::new(InMemoryCommunityStore::default());
    let blobs = Arc::new(InMemoryBlobStore::default());
    let notifier = Arc::new(InMemoryNotifier::default());
    let service = CommunityService::new(store, blobs.clone(), notifier.clone(), criteria);
    let member = UserId(member);

    println!("REvamp membership demo");
    let registration = RegistrationRequest {
        name: "Demo Student".to_string(),
        email: format!("{member}@mail.test"),
        college: "Demo Institute of Technology".to_string(),
        year: 2,
        college_email: format!("{member}@dit.edu"),
        primary_domain: Some("web-dev".to_string()),
        college_id: Some(media(&college_id, 4 * 1024)),
    };
    let profile = match service.register(&member, registration) {
        Ok(profile) => profile,
        Err(err) => {
            println!("  Registration rejected: {err}");
            return Ok(());
        }
    };
    println!(
        "- Registered {} ({}) -> verification {}",
        profile.id,
        profile.college,
        profile.verification_status.label()
    );
    if let Some(blob) = &profile.college_id_ref {
        let path = blob.0.trim_start_matches("memory://");
        if let Some(stored) = blobs.object(path) {
            println!(
                "  College ID stored at {} ({}, {} bytes)",
                blob.0, stored.content_type, stored.size
            );
        }
    }

    match service.resolve_verification(&member, VerificationDecision::Verified) {
        Ok(receipt) => println!("- Admin verified member; drop {} from queue", receipt.evict),
        Err(err) => {
            println!("  Verification failed: {err}");
            return Ok(());
        }
    }

    println!("- Eligibility before activity:");
    match service.eligibility(&member) {
        Ok(report) => render_report(&report),
        Err(err) => println!("  Eligibility unavailable: {err}"),
    }

    for _ in 0..events {
        let award = ActivityAward {
            points: 100,
            attended_event: true,
        };
        if let Err(err) = service.record_activity(&member, award) {
            println!("  Award failed: {err}");
            return Ok(());
        }
    }
    println!("- Recorded {events} attended events");
    match service.eligibility(&member) {
        Ok(report) => render_report(&report),
        Err(err) => println!("  Eligibility unavailable: {err}"),
    }

    let request = ApplicationRequest {
        answers: ApplicationAnswers {
            why: "I want to grow the design and engineering community on my campus by running \
                  regular peer workshops and study nights."
                .to_string(),
            what: "Monthly build sessions, a mentorship pairing program for first years, and \
                   showcases where members present their projects to local founders."
                .to_string(),
            experience: "Ran the campus coding club for two semesters and organised a hackathon."
                .to_string(),
        },
        video: media(&video, 256 * 1024),
    };
    let application = match service.submit_application(&member, request) {
        Ok(application) => application,
        Err(err) => {
            println!("  Application rejected: {err}");
            return Ok(());
        }
    };
    println!(
        "- Submitted application {} with video {}",
        application.id, application.video_ref.0
    );

    let decision = if reject {
        ApplicationDecision::Rejected
    } else {
        ApplicationDecision::Approved
    };
    match service.resolve_application(&application.id, decision) {
        Ok(receipt) => println!("- Admin marked application {}", receipt.status),
        Err(err) => println!("  Moderation failed: {err}"),
    }

    match service.pending_applications(10) {
        Ok(pending) => println!("  Applications still pending: {}", pending.len()),
        Err(err) => println!("  Pending queue unavailable: {err}"),
    }

    let draft = EventDraft {
        title: "Campus Build Night".to_string(),
        description: "Bring a project, leave with a demo.".to_string(),
        date: Utc::now() + Duration::days(7),
        target_years: vec![1, 2, 3],
        colleges: Vec::new(),
        domains: vec!["web-dev".to_string()],
        price: 0,
        luma_url: Some("https://lu.ma/campus-build-night".to_string()),
        banner_url: None,
    };
    match service.publish_event(draft) {
        Ok(event) => println!(
            "- Published event {} for {}",
            event.title,
            event.date.format("%Y-%m-%d")
        ),
        Err(err) => println!("  Event not published: {err}"),
    }
    match service.discover_events(&member, Utc::now()) {
        Ok(feed) => {
            println!("- Member event feed:");
            for event in feed {
                let price = if event.is_free() { "free" } else { "paid" };
                println!("    - {} ({price})", event.title);
            }
        }
        Err(err) => println!("  Event feed unavailable: {err}"),
    }

    println!("- Notices sent:");
    for notice in notifier.notices() {
        println!("    - {} -> {}", notice.template.label(), notice.user_id);
    }

    let session = SessionContext::signed_in(
        member.clone(),
        if reject { Role::Member } else { Role::Ambassador },
    );
    let policy = AccessPolicy::default();
    for path in ["/ambassador", "/admin", "/login"] {
        println!(
            "- Access {path}: {}",
            policy.decide_for(path, &session).label()
        );
    }

    Ok(())
}

pub(crate) fn run_eligibility(args: EligibilityArgs) -> Result<(), AppError> {
    let criteria = AppConfig::load()?.ambassador;
    let report = eligibility_report(&args, criteria);
    println!("Ambassador eligibility");
    render_report(&report);
    Ok(())
}

fn eligibility_report(
    args: &EligibilityArgs,
    criteria: EligibilityCriteria,
) -> EligibilityReport {
    let profile = UserProfile {
        id: UserId("cli".to_string()),
        name: String::new(),
        email: String::new(),
        college: String::new(),
        college_email: String::new(),
        year: args.year,
        primary_domain: None,
        verification_status: VerificationStatus::Verified,
        role: Role::Member,
        points: args.points,
        events_attended: args.events,
        college_id_ref: None,
        created_at: Utc::now(),
    };
    EligibilityEvaluator::new(criteria).explain(&profile)
}

pub(crate) fn run_access_check(args: AccessArgs) {
    let session = if args.session {
        SessionContext::signed_in(UserId("cli".to_string()), args.role)
    } else {
        SessionContext::anonymous()
    };
    let decision = AccessPolicy::new(RouteTable::web()).decide_for(&args.path, &session);
    match decision.redirect_target() {
        Some(target) => println!("{} -> {} ({target})", args.path, decision.label()),
        None => println!("{} -> {}", args.path, decision.label()),
    }
}
