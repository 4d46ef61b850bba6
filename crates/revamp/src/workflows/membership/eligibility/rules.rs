use super::super::domain::UserProfile;
use super::criteria::EligibilityCriteria;
use super::{Criterion, CriterionResult};

fn check(criterion: Criterion, required: u32, actual: u32) -> CriterionResult {
    CriterionResult {
        criterion,
        required,
        actual,
        satisfied: actual >= required,
    }
}

// Every criterion is evaluated so the report never hides a later failure.
pub(crate) fn evaluate_criteria(
    profile: &UserProfile,
    criteria: &EligibilityCriteria,
) -> Vec<CriterionResult> {
    vec![
        check(Criterion::Points, criteria.minimum_points, profile.points),
        check(
            Criterion::EventsAttended,
            criteria.minimum_events_attended,
            profile.events_attended,
        ),
        check(Criterion::Year, criteria.minimum_year, profile.year),
    ]
}
