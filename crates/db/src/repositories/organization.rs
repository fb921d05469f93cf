//! Organization repository.

use std::sync::Arc;

use crate::entities::{
    ApprovalColumns, ApprovalStatus, Organization,
    organization::{self, OrganizationKind},
};
use placement_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    FromQueryResult, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, sea_query::Expr,
};

/// Number of organizations per (kind, status) pair.
#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult)]
pub struct KindStatusCount {
    pub kind: OrganizationKind,
    pub approval_status: ApprovalStatus,
    pub count: i64,
}

/// Organization repository for database operations.
#[derive(Clone)]
pub struct OrganizationRepository {
    db: Arc<DatabaseConnection>,
}

impl OrganizationRepository {
    /// Create a new organization repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find an organization by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<organization::Model>> {
        Organization::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get an organization by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<organization::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("organization {id}")))
    }

    /// Find all listed organizations that exist.
    pub async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<organization::Model>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        Organization::find()
            .filter(organization::Column::Id.is_in(ids.iter().map(String::as_str)))
            .order_by_asc(organization::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Whether an organization name is taken.
    pub async fn exists_by_name(&self, name: &str) -> AppResult<bool> {
        let count = Organization::find()
            .filter(organization::Column::Name.eq(name))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(count > 0)
    }

    /// Whether a domain is taken (case-insensitive).
    pub async fn exists_by_domain(&self, domain: &str) -> AppResult<bool> {
        let count = Organization::find()
            .filter(organization::Column::Domain.eq(domain.to_lowercase()))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(count > 0)
    }

    /// Insert an organization on the given connection or transaction.
    pub async fn insert_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: organization::ActiveModel,
    ) -> AppResult<organization::Model> {
        model.insert(conn).await.map_err(super::insert_error)
    }

    /// Insert an organization.
    pub async fn create(&self, model: organization::ActiveModel) -> AppResult<organization::Model> {
        self.insert_in(self.db.as_ref(), model).await
    }

    /// Read an organization with `FOR UPDATE`. Must run inside a transaction.
    pub async fn lock_by_id<C: ConnectionTrait>(
        &self,
        txn: &C,
        id: &str,
    ) -> AppResult<Option<organization::Model>> {
        Organization::find_by_id(id)
            .lock_exclusive()
            .one(txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Lock several organizations in ascending id order.
    pub async fn lock_by_ids<C: ConnectionTrait>(
        &self,
        txn: &C,
        ids: &[String],
    ) -> AppResult<Vec<organization::Model>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        Organization::find()
            .filter(organization::Column::Id.is_in(ids.iter().map(String::as_str)))
            .order_by_asc(organization::Column::Id)
            .lock_exclusive()
            .all(txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Write decision columns if the organization is still pending.
    ///
    /// Returns the number of rows changed: 0 means another writer decided first.
    pub async fn apply_decision<C: ConnectionTrait>(
        &self,
        txn: &C,
        id: &str,
        columns: &ApprovalColumns,
    ) -> AppResult<u64> {
        let verified = columns.status == ApprovalStatus::Approved;

        let result = Organization::update_many()
            .col_expr(
                organization::Column::ApprovalStatus,
                Expr::value(columns.status),
            )
            .col_expr(
                organization::Column::ApprovedBy,
                Expr::value(columns.approved_by.clone()),
            )
            .col_expr(
                organization::Column::ApprovedAt,
                Expr::value(columns.approved_at),
            )
            .col_expr(
                organization::Column::ApprovalNotes,
                Expr::value(columns.notes.clone()),
            )
            .col_expr(organization::Column::IsVerified, Expr::value(verified))
            .col_expr(
                organization::Column::UpdatedAt,
                Expr::value(columns.approved_at),
            )
            .filter(organization::Column::Id.eq(id))
            .filter(organization::Column::ApprovalStatus.eq(ApprovalStatus::Pending))
            .exec(txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Ids of companies recruiting at a university.
    pub async fn partner_company_ids(&self, university_id: &str) -> AppResult<Vec<String>> {
        Organization::find()
            .select_only()
            .column(organization::Column::Id)
            .filter(organization::Column::Kind.eq(OrganizationKind::Company))
            .filter(organization::Column::PartnerUniversityId.eq(university_id))
            .into_tuple::<String>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Pending organizations, newest first.
    ///
    /// With a university scope, only companies recruiting at that university.
    pub async fn find_pending(
        &self,
        university_scope: Option<&str>,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<organization::Model>> {
        let mut query = Organization::find()
            .filter(organization::Column::ApprovalStatus.eq(ApprovalStatus::Pending))
            .order_by_desc(organization::Column::Id);

        if let Some(university_id) = university_scope {
            query = query
                .filter(organization::Column::Kind.eq(OrganizationKind::Company))
                .filter(organization::Column::PartnerUniversityId.eq(university_id));
        }

        query
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Organization counts grouped by kind and approval status.
    pub async fn count_by_kind_and_status(
        &self,
        university_scope: Option<&str>,
    ) -> AppResult<Vec<KindStatusCount>> {
        let mut query = Organization::find()
            .select_only()
            .column(organization::Column::Kind)
            .column(organization::Column::ApprovalStatus)
            .column_as(Expr::col(organization::Column::Id).count(), "count")
            .group_by(organization::Column::Kind)
            .group_by(organization::Column::ApprovalStatus);

        if let Some(university_id) = university_scope {
            query = query
                .filter(organization::Column::Kind.eq(OrganizationKind::Company))
                .filter(organization::Column::PartnerUniversityId.eq(university_id));
        }

        query
            .into_model::<KindStatusCount>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
