//! Authorization guard.
//!
//! [`AuthorizationGuard::resolve`] turns a bearer token into a
//! [`CallerContext`] by reading the account and its organization fresh on
//! every call. [`authorize`] is a pure function of caller, action and target.

use placement_common::{AppError, AppResult};
use placement_db::{
    entities::{
        ApprovalStatus,
        account::{self, AccountRole},
        organization,
    },
    repositories::{AccountRepository, OrganizationRepository},
};

use super::credentials::CredentialService;

/// The resolved identity of whoever is making a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    pub account_id: String,
    pub role: AccountRole,
    pub organization_id: Option<String>,
    pub approval_status: ApprovalStatus,
    /// Status of the caller's organization. `None` when there is none.
    pub organization_status: Option<ApprovalStatus>,
}

impl CallerContext {
    /// Build a caller from an account and the organization it belongs to.
    #[must_use]
    pub fn new(account: &account::Model, organization: Option<&organization::Model>) -> Self {
        Self {
            account_id: account.id.clone(),
            role: account.role,
            organization_id: account.organization_id.clone(),
            approval_status: account.approval_status,
            organization_status: organization.map(|o| o.approval_status),
        }
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == AccountRole::Admin
    }

    /// Approved account in an approved organization. Admins have no
    /// organization; everyone else without one is never approved.
    #[must_use]
    pub fn is_approved(&self) -> bool {
        if self.approval_status != ApprovalStatus::Approved {
            return false;
        }
        match self.organization_status {
            Some(status) => status == ApprovalStatus::Approved,
            None => self.is_admin(),
        }
    }

    /// University whose review queue this caller works on.
    ///
    /// `None` for admins, who see everything.
    #[must_use]
    pub fn review_scope(&self) -> Option<&str> {
        if self.is_admin() {
            None
        } else {
            self.organization_id.as_deref()
        }
    }
}

/// A named operation and who may perform it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Action {
    pub name: &'static str,
    pub allowed_roles: &'static [AccountRole],
    /// Refused unless both the caller and their organization are approved.
    pub requires_approval: bool,
}

const ALL_ROLES: &[AccountRole] = &[
    AccountRole::Student,
    AccountRole::Recruiter,
    AccountRole::Tpo,
    AccountRole::Admin,
];
const REVIEWERS: &[AccountRole] = &[AccountRole::Tpo, AccountRole::Admin];
const ADMINS: &[AccountRole] = &[AccountRole::Admin];

pub mod actions {
    use super::{ADMINS, ALL_ROLES, Action, REVIEWERS};

    pub const LIST_PENDING: Action = Action {
        name: "approvals.list_pending",
        allowed_roles: REVIEWERS,
        requires_approval: true,
    };
    pub const VIEW_STATISTICS: Action = Action {
        name: "approvals.statistics",
        allowed_roles: REVIEWERS,
        requires_approval: true,
    };
    pub const DECIDE_ORGANIZATION: Action = Action {
        name: "approvals.decide_organization",
        allowed_roles: REVIEWERS,
        requires_approval: true,
    };
    pub const DECIDE_ACCOUNT: Action = Action {
        name: "approvals.decide_account",
        allowed_roles: REVIEWERS,
        requires_approval: true,
    };
    /// Universities are only ever decided by admins.
    pub const DECIDE_UNIVERSITY: Action = Action {
        name: "approvals.decide_university",
        allowed_roles: ADMINS,
        requires_approval: true,
    };
    pub const BULK_DECIDE_ORGANIZATIONS: Action = Action {
        name: "approvals.bulk_decide_organizations",
        allowed_roles: REVIEWERS,
        requires_approval: true,
    };
    pub const CREATE_APPROVED: Action = Action {
        name: "admin.create",
        allowed_roles: ADMINS,
        requires_approval: true,
    };
    pub const MANAGE_ACCOUNTS: Action = Action {
        name: "admin.manage_accounts",
        allowed_roles: ADMINS,
        requires_approval: true,
    };
    pub const VIEW_ACCOUNT: Action = Action {
        name: "accounts.view",
        allowed_roles: ALL_ROLES,
        requires_approval: false,
    };
    pub const READ_NOTIFICATIONS: Action = Action {
        name: "notifications.read",
        allowed_roles: ALL_ROLES,
        requires_approval: false,
    };
}

/// What an action is aimed at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Target<'a> {
    organization: Option<Option<&'a str>>,
    owner: Option<&'a str>,
}

impl<'a> Target<'a> {
    /// No organization or owner constraint.
    #[must_use]
    pub const fn any() -> Self {
        Self {
            organization: None,
            owner: None,
        }
    }

    /// The target belongs to an organization scope. `None` means a scope no
    /// non-admin caller can be in.
    #[must_use]
    pub const fn in_organization(scope: Option<&'a str>) -> Self {
        Self {
            organization: Some(scope),
            owner: None,
        }
    }

    /// The target is owned by one account.
    #[must_use]
    pub const fn owned_by(owner: &'a str) -> Self {
        Self {
            organization: None,
            owner: Some(owner),
        }
    }
}

/// Decide whether `caller` may perform `action` on `target`.
///
/// Checks, in order: role, approval, organization scope, ownership.
/// Admins pass the last two unconditionally.
pub fn authorize(caller: &CallerContext, action: &Action, target: &Target<'_>) -> AppResult<()> {
    if !action.allowed_roles.contains(&caller.role) {
        return Err(AppError::InsufficientRole(format!(
            "{} may not perform {}",
            caller.role, action.name
        )));
    }

    if action.requires_approval && !caller.is_approved() {
        return Err(AppError::AccountNotApproved);
    }

    if caller.is_admin() {
        return Ok(());
    }

    if target
        .organization
        .is_some_and(|scope| scope != caller.organization_id.as_deref())
    {
        return Err(AppError::CrossOrganizationAccess);
    }

    if target.owner.is_some_and(|owner| owner != caller.account_id) {
        return Err(AppError::NotOwner);
    }

    Ok(())
}

/// Resolves bearer tokens into callers.
#[derive(Clone)]
pub struct AuthorizationGuard {
    accounts: AccountRepository,
    organizations: OrganizationRepository,
    credentials: CredentialService,
}

impl AuthorizationGuard {
    #[must_use]
    pub const fn new(
        accounts: AccountRepository,
        organizations: OrganizationRepository,
        credentials: CredentialService,
    ) -> Self {
        Self {
            accounts,
            organizations,
            credentials,
        }
    }

    /// Verify an access token and load its account and organization.
    pub async fn resolve(&self, token: &str) -> AppResult<CallerContext> {
        let account_id = self.credentials.verify_access_token(token)?;

        let account = self
            .accounts
            .find_by_id(&account_id)
            .await?
            .ok_or(AppError::UnknownAccount)?;

        if !account.is_active {
            return Err(AppError::AccountDisabled);
        }

        let organization = match account.organization_id.as_deref() {
            Some(organization_id) => self.organizations.find_by_id(organization_id).await?,
            None => None,
        };

        Ok(CallerContext::new(&account, organization.as_ref()))
    }
}
