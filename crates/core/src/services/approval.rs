//! Approval engine.
//!
//! The only writer of approval columns. Every decision runs in one
//! transaction: the target row is read `FOR UPDATE`, moved through
//! [`ApprovalState::decide`], and written back with a compare-and-swap on
//! `approval_status = 'pending'`. Organization decisions cascade to the
//! organization's still-pending members inside the same transaction.
//! Notices go out only after commit.
//!
//! An account is only ever approved inside an approved organization.

use std::{collections::BTreeMap, sync::Arc};

use chrono::Utc;
use placement_common::{AppError, AppResult};
use placement_db::{
    entities::{
        ApprovalStatus,
        account,
        organization::{self, OrganizationKind},
    },
    repositories::{AccountRepository, KindStatusCount, OrganizationRepository, RoleStatusCount},
};
use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use serde::Serialize;
use tracing::{info, warn};

use super::{
    approval_state::{ApprovalState, Decision, DecisionAction},
    guard::{CallerContext, Target, actions, authorize},
    notifier::{Notice, Notifier},
};

/// Largest accepted bulk decision.
pub const MAX_BULK_SIZE: usize = 100;

/// Everything one organization decision touched.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationDecision {
    pub organization: organization::Model,
    pub state: ApprovalState,
    /// Members moved along with the organization.
    pub cascaded: Vec<account::Model>,
}

/// Result of a single account decision.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDecision {
    pub account: account::Model,
    pub state: ApprovalState,
}

/// Result of a bulk organization decision.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDecision {
    /// Organizations actually moved out of `pending`.
    pub transitioned: u64,
    pub organization_ids: Vec<String>,
    /// Members moved by the cascades.
    pub cascaded: u64,
}

/// Work waiting for review.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingApprovals {
    pub organizations: Vec<organization::Model>,
    pub accounts: Vec<account::Model>,
}

/// Per-status counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: u64,
    pub approved: u64,
    pub rejected: u64,
}

impl StatusCounts {
    fn add(&mut self, status: ApprovalStatus, count: i64) {
        let count = count.max(0) as u64;
        match status {
            ApprovalStatus::Pending => self.pending += count,
            ApprovalStatus::Approved => self.approved += count,
            ApprovalStatus::Rejected => self.rejected += count,
        }
    }
}

/// Approval counts by organization kind and account role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalStatistics {
    pub organizations: BTreeMap<String, StatusCounts>,
    pub accounts: BTreeMap<String, StatusCounts>,
    pub pending_total: u64,
}

impl ApprovalStatistics {
    fn from_counts(organizations: &[KindStatusCount], accounts: &[RoleStatusCount]) -> Self {
        let mut stats = Self::default();

        for row in organizations {
            stats
                .organizations
                .entry(row.kind.to_string())
                .or_default()
                .add(row.approval_status, row.count);
        }
        for row in accounts {
            stats
                .accounts
                .entry(row.role.to_string())
                .or_default()
                .add(row.approval_status, row.count);
        }

        stats.pending_total = stats
            .organizations
            .values()
            .chain(stats.accounts.values())
            .map(|c| c.pending)
            .sum();
        stats
    }
}

/// Approval engine.
#[derive(Clone)]
pub struct ApprovalEngine {
    db: Arc<DatabaseConnection>,
    organizations: OrganizationRepository,
    accounts: AccountRepository,
    notifier: Arc<dyn Notifier>,
}

impl ApprovalEngine {
    /// Create a new approval engine.
    #[must_use]
    pub fn new(db: Arc<DatabaseConnection>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            organizations: OrganizationRepository::new(Arc::clone(&db)),
            accounts: AccountRepository::new(Arc::clone(&db)),
            db,
            notifier,
        }
    }

    /// Check that `caller` may decide this organization.
    ///
    /// Admins may decide any organization. A TPO may decide companies
    /// recruiting at their own university, never universities.
    pub async fn authorize_organization_decision(
        &self,
        caller: &CallerContext,
        organization_id: &str,
    ) -> AppResult<()> {
        authorize(caller, &actions::DECIDE_ORGANIZATION, &Target::any())?;
        if caller.is_admin() {
            return Ok(());
        }

        let organization = self.organizations.get_by_id(organization_id).await?;
        Self::check_organization_scope(caller, &organization)
    }

    /// Check that `caller` may decide this account.
    pub async fn authorize_account_decision(
        &self,
        caller: &CallerContext,
        account_id: &str,
    ) -> AppResult<()> {
        authorize(caller, &actions::DECIDE_ACCOUNT, &Target::any())?;
        if caller.is_admin() {
            return Ok(());
        }

        let account = self.accounts.get_by_id(account_id).await?;
        let scope = match account.organization_id.as_deref() {
            Some(organization_id) => self
                .organizations
                .find_by_id(organization_id)
                .await?
                .and_then(|o| o.review_scope().map(String::from)),
            None => None,
        };

        authorize(
            caller,
            &actions::DECIDE_ACCOUNT,
            &Target::in_organization(scope.as_deref()),
        )
    }

    /// Check that `caller` may decide every listed organization that exists.
    pub async fn authorize_bulk_decision(
        &self,
        caller: &CallerContext,
        organization_ids: &[String],
    ) -> AppResult<()> {
        authorize(caller, &actions::BULK_DECIDE_ORGANIZATIONS, &Target::any())?;
        if caller.is_admin() {
            return Ok(());
        }

        for organization in self.organizations.find_by_ids(organization_ids).await? {
            Self::check_organization_scope(caller, &organization)?;
        }
        Ok(())
    }

    fn check_organization_scope(
        caller: &CallerContext,
        organization: &organization::Model,
    ) -> AppResult<()> {
        if organization.kind == OrganizationKind::University {
            authorize(caller, &actions::DECIDE_UNIVERSITY, &Target::any())?;
        }
        authorize(
            caller,
            &actions::DECIDE_ORGANIZATION,
            &Target::in_organization(organization.review_scope()),
        )
    }

    /// Approve or reject a pending organization and its pending members.
    ///
    /// For a company those are its recruiters; for a university, students
    /// and TPOs who signed up while it was still under review.
    pub async fn decide_organization(
        &self,
        organization_id: &str,
        action: DecisionAction,
        decider_id: &str,
        notes: Option<String>,
    ) -> AppResult<OrganizationDecision> {
        let decision = Self::new_decision(decider_id, notes);

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let organization = self
            .organizations
            .lock_by_id(&txn, organization_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("organization {organization_id}")))?;

        // An early return drops `txn`, which rolls it back.
        let outcome = self
            .transition_organization(&txn, organization, action, decision)
            .await?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        info!(
            organization_id = %outcome.organization.id,
            status = %outcome.state.status(),
            decided_by = %decider_id,
            cascaded = outcome.cascaded.len(),
            "Organization decided"
        );

        self.notify_cascade(&outcome);
        Ok(outcome)
    }

    /// Approve or reject a single pending account. Never cascades.
    ///
    /// Approval needs the account's organization to be approved already.
    pub async fn decide_account(
        &self,
        account_id: &str,
        action: DecisionAction,
        decider_id: &str,
        notes: Option<String>,
    ) -> AppResult<AccountDecision> {
        let decision = Self::new_decision(decider_id, notes);

        // Organization membership never changes, so it can be read unlocked
        // to take the organization lock before the account lock.
        let snapshot = self.accounts.get_by_id(account_id).await?;

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let organization = match snapshot.organization_id.as_deref() {
            Some(organization_id) => Some(
                self.organizations
                    .lock_by_id(&txn, organization_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::Internal(format!(
                            "account {account_id} references missing organization {organization_id}"
                        ))
                    })?,
            ),
            None => None,
        };

        let mut account = self
            .accounts
            .lock_by_id(&txn, account_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("account {account_id}")))?;

        let subject = format!("account {account_id}");
        let current = ApprovalState::from_columns(account.approval_columns())?;
        let next = current.decide(&subject, action, decision)?;

        let undecided_organization = organization
            .as_ref()
            .filter(|o| o.approval_status != ApprovalStatus::Approved);
        if let (DecisionAction::Approve, Some(blocking)) = (action, undecided_organization) {
            return Err(AppError::InvalidStateTransition(format!(
                "{subject} cannot be approved: organization {} is {}",
                blocking.id, blocking.approval_status
            )));
        }

        let columns = next.to_columns();
        let changed = self
            .accounts
            .apply_decision(&txn, std::slice::from_ref(&account.id), &columns)
            .await?;
        if changed == 0 {
            return Err(AppError::InvalidStateTransition(format!(
                "{subject} was decided concurrently"
            )));
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        account.updated_at = columns.approved_at;
        account.set_approval_columns(columns);

        info!(
            account_id = %account.id,
            role = %account.role,
            status = %next.status(),
            decided_by = %decider_id,
            "Account decided"
        );

        self.dispatch(Notice::account_decided(&account.id, &next));
        Ok(AccountDecision {
            account,
            state: next,
        })
    }

    /// Decide every listed organization that is still pending.
    ///
    /// Non-pending and unknown ids are skipped. One transaction; rows are
    /// locked in ascending id order.
    pub async fn bulk_decide_organizations(
        &self,
        organization_ids: &[String],
        action: DecisionAction,
        decider_id: &str,
        notes: Option<String>,
    ) -> AppResult<BulkDecision> {
        if organization_ids.is_empty() || organization_ids.len() > MAX_BULK_SIZE {
            return Err(AppError::Validation(format!(
                "organizationIds must contain 1 to {MAX_BULK_SIZE} ids"
            )));
        }

        let mut ids = organization_ids.to_vec();
        ids.sort();
        ids.dedup();

        let decision = Self::new_decision(decider_id, notes);

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let locked = self.organizations.lock_by_ids(&txn, &ids).await?;

        let mut outcomes = Vec::new();
        for organization in locked {
            if organization.approval_status != ApprovalStatus::Pending {
                continue;
            }
            let outcome = self
                .transition_organization(&txn, organization, action, decision.clone())
                .await?;
            outcomes.push(outcome);
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let result = BulkDecision {
            transitioned: outcomes.len() as u64,
            organization_ids: outcomes.iter().map(|o| o.organization.id.clone()).collect(),
            cascaded: outcomes.iter().map(|o| o.cascaded.len() as u64).sum(),
        };

        info!(
            requested = ids.len(),
            transitioned = result.transitioned,
            cascaded = result.cascaded,
            status = %action.outcome(),
            decided_by = %decider_id,
            "Organizations bulk decided"
        );

        for outcome in &outcomes {
            self.notify_cascade(outcome);
        }
        Ok(result)
    }

    /// Pending organizations and accounts, newest first.
    ///
    /// With a university scope, only that university's own accounts and the
    /// companies recruiting there (and their accounts).
    pub async fn list_pending(
        &self,
        university_scope: Option<&str>,
        limit: u64,
        offset: u64,
    ) -> AppResult<PendingApprovals> {
        let organizations = self
            .organizations
            .find_pending(university_scope, limit, offset)
            .await?;

        let accounts = match university_scope {
            Some(university_id) => {
                let scope_ids = self.scope_organization_ids(university_id).await?;
                self.accounts
                    .find_pending(Some(&scope_ids), limit, offset)
                    .await?
            }
            None => self.accounts.find_pending(None, limit, offset).await?,
        };

        Ok(PendingApprovals {
            organizations,
            accounts,
        })
    }

    /// Approval counts, optionally limited to one university's scope.
    pub async fn statistics(&self, university_scope: Option<&str>) -> AppResult<ApprovalStatistics> {
        let organization_counts = self
            .organizations
            .count_by_kind_and_status(university_scope)
            .await?;

        let account_counts = match university_scope {
            Some(university_id) => {
                let scope_ids = self.scope_organization_ids(university_id).await?;
                self.accounts
                    .count_by_role_and_status(Some(&scope_ids))
                    .await?
            }
            None => self.accounts.count_by_role_and_status(None).await?,
        };

        Ok(ApprovalStatistics::from_counts(
            &organization_counts,
            &account_counts,
        ))
    }

    async fn scope_organization_ids(&self, university_id: &str) -> AppResult<Vec<String>> {
        let mut ids = self.organizations.partner_company_ids(university_id).await?;
        ids.push(university_id.to_string());
        Ok(ids)
    }

    /// Move a locked organization out of `pending` and cascade to its
    /// pending members. Caller owns the transaction.
    async fn transition_organization<C: ConnectionTrait>(
        &self,
        txn: &C,
        mut organization: organization::Model,
        action: DecisionAction,
        decision: Decision,
    ) -> AppResult<OrganizationDecision> {
        let subject = format!("organization {}", organization.id);
        let current = ApprovalState::from_columns(organization.approval_columns())?;
        let next = current.decide(&subject, action, decision)?;
        let columns = next.to_columns();

        let changed = self
            .organizations
            .apply_decision(txn, &organization.id, &columns)
            .await?;
        if changed == 0 {
            return Err(AppError::InvalidStateTransition(format!(
                "{subject} was decided concurrently"
            )));
        }

        let members = self
            .accounts
            .lock_pending_members(txn, &organization.id)
            .await?;
        let member_ids: Vec<String> = members.iter().map(|a| a.id.clone()).collect();

        let cascaded_rows = self
            .accounts
            .apply_decision(txn, &member_ids, &columns)
            .await?;
        if cascaded_rows != member_ids.len() as u64 {
            return Err(AppError::Internal(format!(
                "{subject}: cascade changed {cascaded_rows} of {} locked members",
                member_ids.len()
            )));
        }

        let cascaded = members
            .into_iter()
            .map(|mut member| {
                member.updated_at = columns.approved_at;
                member.set_approval_columns(columns.clone());
                member
            })
            .collect();

        organization.is_verified = next.status() == ApprovalStatus::Approved;
        organization.updated_at = columns.approved_at;
        organization.set_approval_columns(columns);

        Ok(OrganizationDecision {
            organization,
            state: next,
            cascaded,
        })
    }

    fn new_decision(decider_id: &str, notes: Option<String>) -> Decision {
        Decision {
            by: decider_id.to_string(),
            at: Utc::now().into(),
            notes: notes.filter(|n| !n.trim().is_empty()),
        }
    }

    fn notify_cascade(&self, outcome: &OrganizationDecision) {
        for member in &outcome.cascaded {
            self.dispatch(Notice::member_cascaded(
                &member.id,
                &outcome.organization.id,
                &outcome.organization.name,
                &outcome.state,
            ));
        }
    }

    /// Hand a notice to the notifier. Failures are logged and dropped.
    fn dispatch(&self, notice: Notice) {
        let account_id = notice.account_id.clone();
        if let Err(e) = self.notifier.notify(notice) {
            warn!(account_id = %account_id, error = %e, "Failed to hand off notification");
        }
    }
}
