//! Notification service: inbox persistence and delivery.

use placement_common::{AppResult, IdGenerator};
use placement_db::{
    entities::notification,
    repositories::{AccountRepository, NotificationRepository},
};
use sea_orm::Set;

use super::{
    email::EmailService,
    guard::{CallerContext, Target, actions, authorize},
    notifier::Notice,
};

/// Upper bound for a single inbox page.
pub const MAX_PAGE_SIZE: u64 = 100;

/// Notification service for business logic.
#[derive(Clone)]
pub struct NotificationService {
    notification_repo: NotificationRepository,
    account_repo: AccountRepository,
    email: Option<EmailService>,
    id_gen: IdGenerator,
}

impl NotificationService {
    /// Create a new notification service.
    #[must_use]
    pub const fn new(
        notification_repo: NotificationRepository,
        account_repo: AccountRepository,
    ) -> Self {
        Self {
            notification_repo,
            account_repo,
            email: None,
            id_gen: IdGenerator::new(),
        }
    }

    /// Also send every delivered notice by mail.
    pub fn set_email_service(&mut self, email: EmailService) {
        self.email = Some(email);
    }

    /// Store a notice in the recipient's inbox, then mail it if mail is configured.
    ///
    /// A mail failure is logged; the stored row is still returned.
    pub async fn deliver(&self, notice: Notice) -> AppResult<notification::Model> {
        let model = notification::ActiveModel {
            id: Set(self.id_gen.generate()),
            account_id: Set(notice.account_id.clone()),
            title: Set(notice.title.clone()),
            body: Set(notice.body.clone()),
            kind: Set(notice.kind),
            metadata: Set(notice.metadata.clone()),
            priority: Set(notice.priority),
            is_read: Set(false),
            created_at: Set(chrono::Utc::now().into()),
        };

        let stored = self.notification_repo.create(model).await?;

        if let Some(ref email) = self.email {
            match self.account_repo.find_by_id(&notice.account_id).await {
                Ok(Some(account)) => {
                    if let Err(e) = email.send(&account.email, &notice.title, &notice.body).await {
                        tracing::warn!(
                            account_id = %notice.account_id,
                            error = %e,
                            "Failed to mail notification"
                        );
                    }
                }
                Ok(None) => {
                    tracing::debug!(account_id = %notice.account_id, "Recipient gone, not mailing");
                }
                Err(e) => {
                    tracing::warn!(account_id = %notice.account_id, error = %e, "Failed to look up recipient");
                }
            }
        }

        Ok(stored)
    }

    /// The caller's inbox, newest first.
    pub async fn list(
        &self,
        caller: &CallerContext,
        limit: u64,
        until_id: Option<&str>,
        unread_only: bool,
    ) -> AppResult<Vec<notification::Model>> {
        authorize(caller, &actions::READ_NOTIFICATIONS, &Target::any())?;

        self.notification_repo
            .find_by_account(
                &caller.account_id,
                limit.clamp(1, MAX_PAGE_SIZE),
                until_id,
                unread_only,
            )
            .await
    }

    /// Mark one notification as read. Owner or admin only.
    pub async fn mark_read(
        &self,
        caller: &CallerContext,
        notification_id: &str,
    ) -> AppResult<notification::Model> {
        let notification = self.notification_repo.get_by_id(notification_id).await?;
        authorize(
            caller,
            &actions::READ_NOTIFICATIONS,
            &Target::owned_by(&notification.account_id),
        )?;

        self.notification_repo.mark_as_read(notification).await
    }

    /// Mark all of the caller's notifications as read.
    pub async fn mark_all_read(&self, caller: &CallerContext) -> AppResult<u64> {
        authorize(caller, &actions::READ_NOTIFICATIONS, &Target::any())?;
        self.notification_repo.mark_all_as_read(&caller.account_id).await
    }

    /// Count the caller's unread notifications.
    pub async fn count_unread(&self, caller: &CallerContext) -> AppResult<u64> {
        authorize(caller, &actions::READ_NOTIFICATIONS, &Target::any())?;
        self.notification_repo.count_unread(&caller.account_id).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use placement_common::AppError;
    use placement_db::entities::{
        ApprovalStatus,
        account::AccountRole,
        notification::{NotificationKind, NotificationPriority},
    };
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase};
    use std::sync::Arc;

    fn service(db: Arc<DatabaseConnection>) -> NotificationService {
        NotificationService::new(
            NotificationRepository::new(Arc::clone(&db)),
            AccountRepository::new(db),
        )
    }

    fn caller(id: &str, role: AccountRole) -> CallerContext {
        CallerContext {
            account_id: id.to_string(),
            role,
            organization_id: Some("acme".to_string()),
            approval_status: ApprovalStatus::Pending,
            organization_status: Some(ApprovalStatus::Pending),
        }
    }

    fn stored(id: &str, account_id: &str) -> notification::Model {
        notification::Model {
            id: id.to_string(),
            account_id: account_id.to_string(),
            title: "Account approved".to_string(),
            body: "Your account has been approved.".to_string(),
            kind: NotificationKind::ApprovalDecision,
            metadata: None,
            priority: NotificationPriority::High,
            is_read: false,
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_deliver_without_mail_only_inserts() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[stored("n1", "r1")]])
                .into_connection(),
        );
        let service = service(Arc::clone(&db));

        let notice = Notice::account_status_changed("r1", true);
        let row = service.deliver(notice).await.unwrap();
        assert_eq!(row.account_id, "r1");
        drop(service);

        let log = Arc::into_inner(db).unwrap().into_transaction_log();
        assert_eq!(log.len(), 1);
        let logged = format!("{log:?}");
        assert!(logged.contains("INSERT INTO"));
        assert!(logged.contains("notification"));
    }

    #[tokio::test]
    async fn test_pending_account_can_read_own_inbox() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![stored("n2", "r1"), stored("n1", "r1")]])
                .into_connection(),
        );
        let service = service(db);

        let inbox = service
            .list(&caller("r1", AccountRole::Recruiter), 500, None, false)
            .await
            .unwrap();
        assert_eq!(inbox.len(), 2);
    }

    #[tokio::test]
    async fn test_mark_read_requires_owner() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[stored("n1", "r1")]])
                .into_connection(),
        );
        let service = service(db);

        let result = service
            .mark_read(&caller("someone-else", AccountRole::Recruiter), "n1")
            .await;
        assert!(matches!(result, Err(AppError::NotOwner)));
    }

    #[tokio::test]
    async fn test_mark_read_missing() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<notification::Model>::new()])
                .into_connection(),
        );
        let service = service(db);

        let result = service.mark_read(&caller("r1", AccountRole::Recruiter), "nope").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
