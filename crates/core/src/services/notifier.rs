//! Notifier boundary.
//!
//! The approval engine hands a [`Notice`] to a [`Notifier`] and moves on.
//! Implementations only enqueue; delivery happens on a worker.

use placement_common::AppResult;
use placement_db::entities::notification::{NotificationKind, NotificationPriority};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::approval_state::ApprovalState;

/// A message for one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub account_id: String,
    pub title: String,
    pub body: String,
    pub kind: NotificationKind,
    pub metadata: Option<serde_json::Value>,
    pub priority: NotificationPriority,
}

impl Notice {
    /// Outcome of a review of the recipient's own account.
    #[must_use]
    pub fn account_decided(account_id: &str, state: &ApprovalState) -> Self {
        let status = state.status();
        let mut body = format!("Your account has been {status}.");
        if let Some(notes) = state.decision().and_then(|d| d.notes.as_deref()) {
            body.push_str("\n\nReviewer notes: ");
            body.push_str(notes);
        }

        Self {
            account_id: account_id.to_string(),
            title: format!("Account {status}"),
            body,
            kind: NotificationKind::ApprovalDecision,
            metadata: Some(decision_metadata("account", account_id, state)),
            priority: NotificationPriority::High,
        }
    }

    /// A member's account was decided together with their organization.
    #[must_use]
    pub fn member_cascaded(
        account_id: &str,
        organization_id: &str,
        organization_name: &str,
        state: &ApprovalState,
    ) -> Self {
        let status = state.status();
        let mut body = format!(
            "{organization_name} has been {status}. Your account has been {status} with it."
        );
        if let Some(notes) = state.decision().and_then(|d| d.notes.as_deref()) {
            body.push_str("\n\nReviewer notes: ");
            body.push_str(notes);
        }

        let mut metadata = decision_metadata("organization", organization_id, state);
        metadata["accountId"] = json!(account_id);

        Self {
            account_id: account_id.to_string(),
            title: format!("Organization {status}"),
            body,
            kind: NotificationKind::ApprovalDecision,
            metadata: Some(metadata),
            priority: NotificationPriority::High,
        }
    }

    /// The recipient was deactivated or reactivated.
    #[must_use]
    pub fn account_status_changed(account_id: &str, active: bool) -> Self {
        let (title, body) = if active {
            ("Account reactivated", "Your account has been reactivated.")
        } else {
            (
                "Account deactivated",
                "Your account has been deactivated by an administrator.",
            )
        };

        Self {
            account_id: account_id.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            kind: NotificationKind::AccountStatus,
            metadata: Some(json!({ "isActive": active })),
            priority: NotificationPriority::Normal,
        }
    }
}

fn decision_metadata(entity_type: &str, entity_id: &str, state: &ApprovalState) -> serde_json::Value {
    let decision = state.decision();
    json!({
        "entityType": entity_type,
        "entityId": entity_id,
        "status": state.status(),
        "decidedBy": decision.map(|d| d.by.as_str()),
        "decidedAt": decision.map(|d| d.at.to_rfc3339()),
    })
}

/// Fire-and-forget hand-off of notices.
///
/// `notify` must return without waiting for delivery. An error means the
/// notice could not be queued.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice) -> AppResult<()>;
}

/// Notifier that drops every notice.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpNotifier;

impl Notifier for NoOpNotifier {
    fn notify(&self, notice: Notice) -> AppResult<()> {
        tracing::trace!(account_id = %notice.account_id, "Dropping notice");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::approval_state::Decision;
    use chrono::Utc;

    fn rejected_with_notes() -> ApprovalState {
        ApprovalState::Rejected(Decision {
            by: "admin1".to_string(),
            at: Utc::now().into(),
            notes: Some("domain could not be verified".to_string()),
        })
    }

    #[test]
    fn test_account_decided_notice() {
        let notice = Notice::account_decided("r1", &rejected_with_notes());

        assert_eq!(notice.title, "Account rejected");
        assert!(notice.body.contains("domain could not be verified"));
        assert_eq!(notice.kind, NotificationKind::ApprovalDecision);
        let metadata = notice.metadata.unwrap();
        assert_eq!(metadata["entityType"], "account");
        assert_eq!(metadata["decidedBy"], "admin1");
    }

    #[test]
    fn test_member_cascaded_notice() {
        let notice = Notice::member_cascaded("r1", "o1", "Acme Corp", &rejected_with_notes());

        assert_eq!(notice.account_id, "r1");
        assert!(notice.body.starts_with("Acme Corp has been rejected."));
        let metadata = notice.metadata.unwrap();
        assert_eq!(metadata["entityId"], "o1");
        assert_eq!(metadata["accountId"], "r1");
        assert_eq!(metadata["status"], "rejected");
    }

    #[test]
    fn test_notice_serializes_camel_case() {
        let json = serde_json::to_value(Notice::account_status_changed("s1", false)).unwrap();
        assert_eq!(json["accountId"], "s1");
        assert_eq!(json["kind"], "accountStatus");
        assert_eq!(json["priority"], "normal");
    }
}
