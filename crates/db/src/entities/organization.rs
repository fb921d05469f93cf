//! Organization entity (university or company).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::approval_status::ApprovalStatus;

/// Organization kind. Fixed at creation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum OrganizationKind {
    #[sea_orm(string_value = "university")]
    University,
    #[sea_orm(string_value = "company")]
    Company,
}

impl OrganizationKind {
    /// Column value as stored.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::University => "university",
            Self::Company => "company",
        }
    }
}

impl std::fmt::Display for OrganizationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[sea_orm(table_name = "organization")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(unique)]
    pub name: String,

    /// Lowercased, e.g. `iitb.ac.in`
    #[sea_orm(unique)]
    pub domain: String,

    pub kind: OrganizationKind,

    /// Companies only: the university campus this company recruits at
    #[sea_orm(nullable)]
    pub partner_university_id: Option<String>,

    #[sea_orm(default_value = false)]
    pub is_verified: bool,

    pub approval_status: ApprovalStatus,

    #[sea_orm(nullable)]
    pub approved_by: Option<String>,

    #[sea_orm(nullable)]
    pub approved_at: Option<DateTimeWithTimeZone>,

    #[sea_orm(column_type = "Text", nullable)]
    pub approval_notes: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    /// The university whose placement officers review this organization.
    #[must_use]
    pub fn review_scope(&self) -> Option<&str> {
        match self.kind {
            OrganizationKind::University => Some(self.id.as_str()),
            OrganizationKind::Company => self.partner_university_id.as_deref(),
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::account::Entity")]
    Account,

    #[sea_orm(
        belongs_to = "Entity",
        from = "Column::PartnerUniversityId",
        to = "Column::Id",
        on_delete = "SetNull"
    )]
    PartnerUniversity,
}

impl Related<super::account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Account.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
