//! Status lifecycle shared by member verification and ambassador applications.
//!
//! Both records start `Pending` and are resolved exactly once into one of two
//! terminal values. Moderation never moves a record back to `Pending`; the only
//! way back is a member re-submitting a rejected verification (see
//! [`VerificationStatus::reopen`]).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Status enumeration governed by the pending-then-terminal rule.
pub trait ModeratedStatus: Copy + PartialEq + fmt::Debug {
    const PENDING: Self;

    fn label(self) -> &'static str;

    fn is_pending(self) -> bool {
        self == Self::PENDING
    }
}

/// Verification state of a member's student status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    Verified,
    Rejected,
}

impl ModeratedStatus for VerificationStatus {
    const PENDING: Self = VerificationStatus::Pending;

    fn label(self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Verified => "verified",
            VerificationStatus::Rejected => "rejected",
        }
    }
}

impl VerificationStatus {
    /// Re-open a rejected verification after the member uploads new proof.
    pub fn reopen(self, record_id: &str) -> Result<Self, InvalidTransition> {
        match self {
            VerificationStatus::Rejected => Ok(VerificationStatus::Pending),
            current => Err(InvalidTransition::new(
                record_id,
                current.label(),
                VerificationStatus::Pending.label(),
            )),
        }
    }
}

/// State of an ambassador application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

impl ModeratedStatus for ApplicationStatus {
    const PENDING: Self = ApplicationStatus::Pending;

    fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        }
    }
}

/// Admin decision on a pending verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationDecision {
    Verified,
    Rejected,
}

impl From<VerificationDecision> for VerificationStatus {
    fn from(value: VerificationDecision) -> Self {
        match value {
            VerificationDecision::Verified => VerificationStatus::Verified,
            VerificationDecision::Rejected => VerificationStatus::Rejected,
        }
    }
}

/// Admin decision on a pending ambassador application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationDecision {
    Approved,
    Rejected,
}

impl From<ApplicationDecision> for ApplicationStatus {
    fn from(value: ApplicationDecision) -> Self {
        match value {
            ApplicationDecision::Approved => ApplicationStatus::Approved,
            ApplicationDecision::Rejected => ApplicationStatus::Rejected,
        }
    }
}

/// Raised when a record is not `Pending` or the target is not terminal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("record {record_id} cannot move from {current} to {attempted}")]
pub struct InvalidTransition {
    pub record_id: String,
    pub current: &'static str,
    pub attempted: &'static str,
}

impl InvalidTransition {
    pub fn new(record_id: &str, current: &'static str, attempted: &'static str) -> Self {
        Self {
            record_id: record_id.to_string(),
            current,
            attempted,
        }
    }
}

/// Validate a moderation transition and return the new status.
pub fn transition<S: ModeratedStatus>(
    record_id: &str,
    current: S,
    target: S,
) -> Result<S, InvalidTransition> {
    if !current.is_pending() || target.is_pending() {
        return Err(InvalidTransition::new(
            record_id,
            current.label(),
            target.label(),
        ));
    }
    Ok(target)
}
