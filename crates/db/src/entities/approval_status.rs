//! Approval status column shared by accounts and organizations.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Review status of an account or organization.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum ApprovalStatus {
    #[sea_orm(string_value = "pending")]
    #[default]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

impl ApprovalStatus {
    /// Column value as stored.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

/// The four approval columns of a row, as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalColumns {
    pub status: ApprovalStatus,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTimeWithTimeZone>,
    pub notes: Option<String>,
}

impl super::account::Model {
    /// Approval columns of this account.
    #[must_use]
    pub fn approval_columns(&self) -> ApprovalColumns {
        ApprovalColumns {
            status: self.approval_status,
            approved_by: self.approved_by.clone(),
            approved_at: self.approved_at,
            notes: self.approval_notes.clone(),
        }
    }

    /// Overwrite the approval columns in memory.
    pub fn set_approval_columns(&mut self, columns: ApprovalColumns) {
        self.approval_status = columns.status;
        self.approved_by = columns.approved_by;
        self.approved_at = columns.approved_at;
        self.approval_notes = columns.notes;
    }
}

impl super::organization::Model {
    /// Approval columns of this organization.
    #[must_use]
    pub fn approval_columns(&self) -> ApprovalColumns {
        ApprovalColumns {
            status: self.approval_status,
            approved_by: self.approved_by.clone(),
            approved_at: self.approved_at,
            notes: self.approval_notes.clone(),
        }
    }

    /// Overwrite the approval columns in memory.
    pub fn set_approval_columns(&mut self, columns: ApprovalColumns) {
        self.approval_status = columns.status;
        self.approved_by = columns.approved_by;
        self.approved_at = columns.approved_at;
        self.approval_notes = columns.notes;
    }
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
