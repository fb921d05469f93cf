//! Approval state machine shared by accounts and organizations.
//!
//! Rows store approval as four loose columns. They are lifted into
//! [`ApprovalState`] on read so that a decided row always carries its
//! decider and timestamp, and lowered back with [`ApprovalState::to_columns`]
//! on write.

use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use placement_common::{AppError, AppResult};
use placement_db::entities::{ApprovalColumns, ApprovalStatus};
use serde::{Deserialize, Serialize};

/// Outcome requested by a reviewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionAction {
    Approve,
    Reject,
}

impl DecisionAction {
    /// Status an entity ends up in after this action.
    #[must_use]
    pub const fn outcome(self) -> ApprovalStatus {
        match self {
            Self::Approve => ApprovalStatus::Approved,
            Self::Reject => ApprovalStatus::Rejected,
        }
    }
}

impl FromStr for DecisionAction {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(Self::Approve),
            "reject" => Ok(Self::Reject),
            other => Err(AppError::Validation(format!(
                "action must be 'approve' or 'reject', got '{other}'"
            ))),
        }
    }
}

/// Who decided, when, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub by: String,
    pub at: DateTime<FixedOffset>,
    pub notes: Option<String>,
}

/// Review state of an account or organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ApprovalState {
    Pending,
    Approved(Decision),
    Rejected(Decision),
}

impl ApprovalState {
    /// Lift stored columns into a state.
    ///
    /// A decided row without decider or timestamp, or a pending row with
    /// either set, is corrupt and fails with an internal error.
    pub fn from_columns(columns: ApprovalColumns) -> AppResult<Self> {
        let ApprovalColumns {
            status,
            approved_by,
            approved_at,
            notes,
        } = columns;

        match (status, approved_by, approved_at) {
            (ApprovalStatus::Pending, None, None) => Ok(Self::Pending),
            (ApprovalStatus::Approved, Some(by), Some(at)) => {
                Ok(Self::Approved(Decision { by, at, notes }))
            }
            (ApprovalStatus::Rejected, Some(by), Some(at)) => {
                Ok(Self::Rejected(Decision { by, at, notes }))
            }
            (status, by, at) => Err(AppError::Internal(format!(
                "inconsistent approval columns: status={status} approved_by_set={} approved_at_set={}",
                by.is_some(),
                at.is_some()
            ))),
        }
    }

    /// Lower into the four stored columns.
    #[must_use]
    pub fn to_columns(&self) -> ApprovalColumns {
        match self {
            Self::Pending => ApprovalColumns {
                status: ApprovalStatus::Pending,
                approved_by: None,
                approved_at: None,
                notes: None,
            },
            Self::Approved(d) | Self::Rejected(d) => ApprovalColumns {
                status: self.status(),
                approved_by: Some(d.by.clone()),
                approved_at: Some(d.at),
                notes: d.notes.clone(),
            },
        }
    }

    #[must_use]
    pub const fn status(&self) -> ApprovalStatus {
        match self {
            Self::Pending => ApprovalStatus::Pending,
            Self::Approved(_) => ApprovalStatus::Approved,
            Self::Rejected(_) => ApprovalStatus::Rejected,
        }
    }

    #[must_use]
    pub const fn decision(&self) -> Option<&Decision> {
        match self {
            Self::Pending => None,
            Self::Approved(d) | Self::Rejected(d) => Some(d),
        }
    }

    /// State of an entity created directly by an admin. Not a transition.
    #[must_use]
    pub const fn approved_at_creation(decision: Decision) -> Self {
        Self::Approved(decision)
    }

    /// The only transition: `Pending` to `Approved` or `Rejected`.
    ///
    /// `subject` names the entity in the error, e.g. `organization 01h...`.
    pub fn decide(&self, subject: &str, action: DecisionAction, decision: Decision) -> AppResult<Self> {
        match (self, action) {
            (Self::Pending, DecisionAction::Approve) => Ok(Self::Approved(decision)),
            (Self::Pending, DecisionAction::Reject) => Ok(Self::Rejected(decision)),
            (Self::Approved(_) | Self::Rejected(_), _) => Err(AppError::InvalidStateTransition(
                format!("{subject} is already {}", self.status()),
            )),
        }
    }
}
