//! Account repository.

use std::sync::Arc;

use crate::entities::{
    Account, ApprovalColumns, ApprovalStatus,
    account::{self, AccountRole},
};
use placement_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    FromQueryResult, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    sea_query::Expr,
};

/// Number of accounts per (role, status) pair.
#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult)]
pub struct RoleStatusCount {
    pub role: AccountRole,
    pub approval_status: ApprovalStatus,
    pub count: i64,
}

/// Account repository for database operations.
#[derive(Clone)]
pub struct AccountRepository {
    db: Arc<DatabaseConnection>,
}

impl AccountRepository {
    /// Create a new account repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find an account by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<account::Model>> {
        Account::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get an account by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<account::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("account {id}")))
    }

    /// Find an account by email (case-insensitive).
    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<account::Model>> {
        Account::find()
            .filter(account::Column::Email.eq(email.to_lowercase()))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Whether an email is already registered.
    pub async fn exists_by_email(&self, email: &str) -> AppResult<bool> {
        let count = Account::find()
            .filter(account::Column::Email.eq(email.to_lowercase()))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(count > 0)
    }

    /// Insert an account on the given connection or transaction.
    pub async fn insert_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: account::ActiveModel,
    ) -> AppResult<account::Model> {
        model.insert(conn).await.map_err(super::insert_error)
    }

    /// Insert an account.
    pub async fn create(&self, model: account::ActiveModel) -> AppResult<account::Model> {
        self.insert_in(self.db.as_ref(), model).await
    }

    /// Read an account with `FOR UPDATE`. Must run inside a transaction.
    pub async fn lock_by_id<C: ConnectionTrait>(
        &self,
        txn: &C,
        id: &str,
    ) -> AppResult<Option<account::Model>> {
        Account::find_by_id(id)
            .lock_exclusive()
            .one(txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Lock every pending member of an organization, in id order.
    pub async fn lock_pending_members<C: ConnectionTrait>(
        &self,
        txn: &C,
        organization_id: &str,
    ) -> AppResult<Vec<account::Model>> {
        Account::find()
            .filter(account::Column::OrganizationId.eq(organization_id))
            .filter(account::Column::ApprovalStatus.eq(ApprovalStatus::Pending))
            .order_by_asc(account::Column::Id)
            .lock_exclusive()
            .all(txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Write decision columns to every listed account that is still pending.
    ///
    /// Returns the number of rows changed.
    pub async fn apply_decision<C: ConnectionTrait>(
        &self,
        txn: &C,
        ids: &[String],
        columns: &ApprovalColumns,
    ) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = Account::update_many()
            .col_expr(
                account::Column::ApprovalStatus,
                Expr::value(columns.status),
            )
            .col_expr(
                account::Column::ApprovedBy,
                Expr::value(columns.approved_by.clone()),
            )
            .col_expr(account::Column::ApprovedAt, Expr::value(columns.approved_at))
            .col_expr(
                account::Column::ApprovalNotes,
                Expr::value(columns.notes.clone()),
            )
            .col_expr(account::Column::UpdatedAt, Expr::value(columns.approved_at))
            .filter(account::Column::Id.is_in(ids.iter().map(String::as_str)))
            .filter(account::Column::ApprovalStatus.eq(ApprovalStatus::Pending))
            .exec(txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Toggle the deactivation switch.
    pub async fn set_active(&self, id: &str, active: bool) -> AppResult<account::Model> {
        let account = self.get_by_id(id).await?;
        let mut model: account::ActiveModel = account.into();
        model.is_active = Set(active);
        model.updated_at = Set(Some(chrono::Utc::now().into()));
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Hard-delete an account. Returns whether a row was removed.
    pub async fn delete(&self, id: &str) -> AppResult<bool> {
        let result = Account::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected > 0)
    }

    /// Pending accounts, newest first, optionally limited to some organizations.
    pub async fn find_pending(
        &self,
        organization_ids: Option<&[String]>,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<account::Model>> {
        let mut query = Account::find()
            .filter(account::Column::ApprovalStatus.eq(ApprovalStatus::Pending))
            .order_by_desc(account::Column::Id);

        if let Some(ids) = organization_ids {
            query = query.filter(account::Column::OrganizationId.is_in(ids.iter().map(String::as_str)));
        }

        query
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Account counts grouped by role and approval status.
    pub async fn count_by_role_and_status(
        &self,
        organization_ids: Option<&[String]>,
    ) -> AppResult<Vec<RoleStatusCount>> {
        let mut query = Account::find()
            .select_only()
            .column(account::Column::Role)
            .column(account::Column::ApprovalStatus)
            .column_as(Expr::col(account::Column::Id).count(), "count")
            .group_by(account::Column::Role)
            .group_by(account::Column::ApprovalStatus);

        if let Some(ids) = organization_ids {
            query = query.filter(account::Column::OrganizationId.is_in(ids.iter().map(String::as_str)));
        }

        query
            .into_model::<RoleStatusCount>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
