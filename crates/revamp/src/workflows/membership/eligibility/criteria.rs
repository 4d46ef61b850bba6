use serde::{Deserialize, Serialize};

/// Thresholds a member must reach before applying to the ambassador program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityCriteria {
    pub minimum_points: u32,
    pub minimum_events_attended: u32,
    pub minimum_year: u32,
}

impl Default for EligibilityCriteria {
    fn default() -> Self {
        Self {
            minimum_points: 500,
            minimum_events_attended: 5,
            minimum_year: 2,
        }
    }
}
