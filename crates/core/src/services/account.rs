//! Account service: sign-in and account lifecycle.

use std::sync::Arc;

use placement_common::{AppError, AppResult};
use placement_db::{entities::account, repositories::AccountRepository};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use super::{
    credentials::{CredentialService, TokenPair},
    guard::{CallerContext, Target, actions, authorize},
    notifier::{Notice, Notifier},
};

/// Login request body.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginInput {
    #[validate(length(min = 1, max = 256))]
    pub email: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// Account service for business logic.
#[derive(Clone)]
pub struct AccountService {
    account_repo: AccountRepository,
    credentials: CredentialService,
    notifier: Arc<dyn Notifier>,
}

impl AccountService {
    /// Create a new account service.
    #[must_use]
    pub fn new(
        account_repo: AccountRepository,
        credentials: CredentialService,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            account_repo,
            credentials,
            notifier,
        }
    }

    /// Exchange email and password for a token pair.
    ///
    /// Unknown email and wrong password fail the same way.
    pub async fn login(&self, input: LoginInput) -> AppResult<TokenPair> {
        input.validate()?;

        let Some(account) = self.account_repo.find_by_email(&input.email).await? else {
            self.credentials.verify_absent(&input.password);
            return Err(AppError::InvalidCredential(
                "invalid email or password".to_string(),
            ));
        };

        if !self.credentials.verify(&input.password, &account.password_hash)? {
            return Err(AppError::InvalidCredential(
                "invalid email or password".to_string(),
            ));
        }
        if !account.is_active {
            return Err(AppError::AccountDisabled);
        }

        info!(account_id = %account.id, role = %account.role, "Account signed in");
        self.credentials.issue_tokens(&account.id)
    }

    /// Exchange a refresh token for a fresh pair.
    pub async fn refresh(&self, refresh_token: &str) -> AppResult<TokenPair> {
        let account_id = self.credentials.verify_refresh_token(refresh_token)?;
        let account = self
            .account_repo
            .find_by_id(&account_id)
            .await?
            .ok_or(AppError::UnknownAccount)?;

        if !account.is_active {
            return Err(AppError::AccountDisabled);
        }

        self.credentials.issue_tokens(&account.id)
    }

    /// The caller's own account.
    pub async fn me(&self, caller: &CallerContext) -> AppResult<account::Model> {
        self.account_repo.get_by_id(&caller.account_id).await
    }

    /// Get an account. Owner or admin only.
    pub async fn get(&self, caller: &CallerContext, id: &str) -> AppResult<account::Model> {
        authorize(caller, &actions::VIEW_ACCOUNT, &Target::owned_by(id))?;
        self.account_repo.get_by_id(id).await
    }

    /// Switch an account off. Admins cannot deactivate themselves.
    pub async fn deactivate(&self, admin: &CallerContext, id: &str) -> AppResult<account::Model> {
        authorize(admin, &actions::MANAGE_ACCOUNTS, &Target::any())?;
        if admin.account_id == id {
            return Err(AppError::Validation(
                "admins cannot deactivate their own account".to_string(),
            ));
        }
        self.set_active(admin, id, false).await
    }

    /// Switch an account back on.
    pub async fn reactivate(&self, admin: &CallerContext, id: &str) -> AppResult<account::Model> {
        authorize(admin, &actions::MANAGE_ACCOUNTS, &Target::any())?;
        self.set_active(admin, id, true).await
    }

    /// Hard-delete an account. Admins cannot delete themselves.
    pub async fn delete(&self, admin: &CallerContext, id: &str) -> AppResult<()> {
        authorize(admin, &actions::MANAGE_ACCOUNTS, &Target::any())?;
        if admin.account_id == id {
            return Err(AppError::Validation(
                "admins cannot delete their own account".to_string(),
            ));
        }

        if !self.account_repo.delete(id).await? {
            return Err(AppError::NotFound(format!("account {id}")));
        }

        info!(account_id = %id, deleted_by = %admin.account_id, "Account deleted");
        Ok(())
    }

    async fn set_active(
        &self,
        admin: &CallerContext,
        id: &str,
        active: bool,
    ) -> AppResult<account::Model> {
        let account = self.account_repo.set_active(id, active).await?;

        info!(
            account_id = %account.id,
            is_active = active,
            changed_by = %admin.account_id,
            "Account activation changed"
        );

        if let Err(e) = self
            .notifier
            .notify(Notice::account_status_changed(&account.id, active))
        {
            tracing::warn!(account_id = %account.id, error = %e, "Failed to hand off notice");
        }

        Ok(account)
    }
}
