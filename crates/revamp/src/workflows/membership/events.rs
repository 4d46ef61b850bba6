//! Event discovery: which upcoming events a member gets to see.

use chrono::{DateTime, Utc};

use super::domain::{CommunityEvent, EventDraft, UserProfile};
use super::intake::IntakeViolation;

pub const MIN_TITLE_CHARS: usize = 2;

/// An event is shown to a member when it targets their year of study, is aimed at
/// their college or their primary domain, and has not started yet.
pub fn is_visible_to(event: &CommunityEvent, profile: &UserProfile, now: DateTime<Utc>) -> bool {
    if event.date <= now || !event.target_years.contains(&profile.year) {
        return false;
    }
    let college = event
        .colleges
        .iter()
        .any(|college| same_slug(college, &profile.college));
    let domain = profile.primary_domain.as_deref().is_some_and(|primary| {
        event
            .domains
            .iter()
            .any(|domain| same_slug(domain, primary))
    });
    college || domain
}

/// Visible events for `profile`, soonest first.
pub fn discover_events(
    events: impl IntoIterator<Item = CommunityEvent>,
    profile: &UserProfile,
    now: DateTime<Utc>,
) -> Vec<CommunityEvent> {
    let mut visible = events
        .into_iter()
        .filter(|event| is_visible_to(event, profile, now))
        .collect::<Vec<_>>();
    visible.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
    visible
}

pub fn validate_event(draft: &EventDraft) -> Result<(), IntakeViolation> {
    if draft.title.trim().chars().count() < MIN_TITLE_CHARS {
        return Err(IntakeViolation::TitleTooShort);
    }
    if draft.target_years.is_empty() {
        return Err(IntakeViolation::NoTargetYears);
    }
    if let Some(year) = draft
        .target_years
        .iter()
        .copied()
        .find(|year| !(1..=4).contains(year))
    {
        return Err(IntakeViolation::YearOutOfRange(year));
    }
    let has_audience = draft
        .colleges
        .iter()
        .chain(&draft.domains)
        .any(|slug| !slug.trim().is_empty());
    if !has_audience {
        return Err(IntakeViolation::NoAudience);
    }
    Ok(())
}

fn same_slug(a: &str, b: &str) -> bool {
    let (a, b) = (a.trim(), b.trim());
    !a.is_empty() && a.eq_ignore_ascii_case(b)
}
