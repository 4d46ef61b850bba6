mod criteria;
mod rules;

pub use criteria::EligibilityCriteria;

use super::domain::{UserId, UserProfile};
use rules::evaluate_criteria;
use serde::{Deserialize, Serialize};

/// Individual prerequisite of the ambassador program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    Points,
    EventsAttended,
    Year,
}

impl Criterion {
    pub const fn label(self) -> &'static str {
        match self {
            Criterion::Points => "points",
            Criterion::EventsAttended => "events attended",
            Criterion::Year => "year of study",
        }
    }
}

/// Outcome for one criterion, rendered as per-line feedback on the apply page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriterionResult {
    pub criterion: Criterion,
    pub required: u32,
    pub actual: u32,
    pub satisfied: bool,
}

/// Per-criterion breakdown of a member's eligibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityReport {
    pub user_id: UserId,
    pub eligible: bool,
    pub criteria: Vec<CriterionResult>,
}

impl EligibilityReport {
    pub fn is_satisfied(&self, criterion: Criterion) -> bool {
        self.criteria
            .iter()
            .any(|result| result.criterion == criterion && result.satisfied)
    }

    pub fn unmet(&self) -> Vec<Criterion> {
        self.criteria
            .iter()
            .filter(|result| !result.satisfied)
            .map(|result| result.criterion)
            .collect()
    }

    pub fn summary(&self) -> String {
        if self.eligible {
            return "eligible for the ambassador program".to_string();
        }

        let missing = self
            .criteria
            .iter()
            .filter(|result| !result.satisfied)
            .map(|result| {
                format!(
                    "{} {} of {}",
                    result.criterion.label(),
                    result.actual,
                    result.required
                )
            })
            .collect::<Vec<_>>();
        format!("not yet eligible: {}", missing.join(", "))
    }
}

/// Stateless evaluator applying a set of thresholds to member profiles.
#[derive(Debug, Clone, Default)]
pub struct EligibilityEvaluator {
    criteria: EligibilityCriteria,
}

impl EligibilityEvaluator {
    pub fn new(criteria: EligibilityCriteria) -> Self {
        Self { criteria }
    }

    pub fn criteria(&self) -> &EligibilityCriteria {
        &self.criteria
    }

    pub fn is_eligible(&self, profile: &UserProfile) -> bool {
        evaluate_criteria(profile, &self.criteria)
            .iter()
            .all(|result| result.satisfied)
    }

    pub fn explain(&self, profile: &UserProfile) -> EligibilityReport {
        let criteria = evaluate_criteria(profile, &self.criteria);
        EligibilityReport {
            user_id: profile.id.clone(),
            eligible: criteria.iter().all(|result| result.satisfied),
            criteria,
        }
    }
}

/// Eligibility under the standard program thresholds (500 points, 5 events, year 2).
pub fn is_eligible_for_ambassador(profile: &UserProfile) -> bool {
    EligibilityEvaluator::default().is_eligible(profile)
}

pub fn explain_eligibility(profile: &UserProfile) -> EligibilityReport {
    EligibilityEvaluator::default().explain(profile)
}
