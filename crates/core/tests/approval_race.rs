//! Approval decisions against a real database.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test -p placement-core --test approval_race -- --ignored`

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use chrono::Utc;
use placement_common::{AppError, IdGenerator};
use placement_core::{ApprovalEngine, DecisionAction, NoOpNotifier};
use placement_db::entities::{
    ApprovalStatus,
    account::{self, AccountRole},
    organization::{self, OrganizationKind},
};
use placement_db::repositories::{AccountRepository, OrganizationRepository};
use placement_db::test_utils::TestDatabase;
use sea_orm::Set;

fn company(id: &str) -> organization::ActiveModel {
    organization::ActiveModel {
        id: Set(id.to_string()),
        name: Set(format!("Company {id}")),
        domain: Set(format!("{id}.example.com")),
        kind: Set(OrganizationKind::Company),
        partner_university_id: Set(None),
        is_verified: Set(false),
        approval_status: Set(ApprovalStatus::Pending),
        approved_by: Set(None),
        approved_at: Set(None),
        approval_notes: Set(None),
        created_at: Set(Utc::now().into()),
        updated_at: Set(None),
    }
}

fn recruiter(id: &str, organization_id: &str) -> account::ActiveModel {
    account::ActiveModel {
        id: Set(id.to_string()),
        email: Set(format!("{id}@example.com")),
        password_hash: Set("$argon2id$stub".to_string()),
        name: Set(None),
        role: Set(AccountRole::Recruiter),
        organization_id: Set(Some(organization_id.to_string())),
        is_active: Set(true),
        approval_status: Set(ApprovalStatus::Pending),
        approved_by: Set(None),
        approved_at: Set(None),
        approval_notes: Set(None),
        created_at: Set(Utc::now().into()),
        updated_at: Set(None),
    }
}

async fn setup() -> Arc<sea_orm::DatabaseConnection> {
    let test_db = TestDatabase::new().await.expect("connect to test database");
    Arc::new(test_db.conn)
}

/// Tests share one database, so every row gets a fresh id.
fn unique(prefix: &str) -> String {
    format!("{prefix}{}", IdGenerator::new().generate())
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_concurrent_decisions_on_one_organization() {
    let db = setup().await;
    let (o1, r1) = (unique("o"), unique("r"));
    OrganizationRepository::new(Arc::clone(&db))
        .create(company(&o1))
        .await
        .unwrap();
    AccountRepository::new(Arc::clone(&db))
        .create(recruiter(&r1, &o1))
        .await
        .unwrap();

    let engine = ApprovalEngine::new(Arc::clone(&db), Arc::new(NoOpNotifier));
    let approve = engine.decide_organization(&o1, DecisionAction::Approve, "admin1", None);
    let reject = engine.decide_organization(&o1, DecisionAction::Reject, "admin2", None);
    let (approved, rejected) = tokio::join!(approve, reject);

    let winner = match (approved, rejected) {
        (Ok(decision), Err(AppError::InvalidStateTransition(_)))
        | (Err(AppError::InvalidStateTransition(_)), Ok(decision)) => decision,
        other => panic!("expected exactly one winner, got {other:?}"),
    };

    let organization = OrganizationRepository::new(Arc::clone(&db))
        .get_by_id(&o1)
        .await
        .unwrap();
    let recruiter = AccountRepository::new(Arc::clone(&db))
        .get_by_id(&r1)
        .await
        .unwrap();

    assert_eq!(organization.approval_status, winner.state.status());
    assert_eq!(recruiter.approval_status, winner.state.status());
    assert_eq!(organization.approved_by, recruiter.approved_by);
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_cascade_leaves_decided_recruiters_alone() {
    let db = setup().await;
    let (o1, r1, r2) = (unique("o"), unique("r"), unique("r"));
    let accounts = AccountRepository::new(Arc::clone(&db));
    OrganizationRepository::new(Arc::clone(&db))
        .create(company(&o1))
        .await
        .unwrap();
    accounts.create(recruiter(&r1, &o1)).await.unwrap();
    let mut already_rejected = recruiter(&r2, &o1);
    already_rejected.approval_status = Set(ApprovalStatus::Rejected);
    already_rejected.approved_by = Set(Some("admin0".to_string()));
    already_rejected.approved_at = Set(Some(Utc::now().into()));
    accounts.create(already_rejected).await.unwrap();

    let engine = ApprovalEngine::new(Arc::clone(&db), Arc::new(NoOpNotifier));
    let decision = engine
        .decide_organization(&o1, DecisionAction::Approve, "admin1", Some("verified".to_string()))
        .await
        .unwrap();

    assert_eq!(decision.cascaded.len(), 1);
    assert_eq!(decision.cascaded[0].id, r1);

    let untouched = accounts.get_by_id(&r2).await.unwrap();
    assert_eq!(untouched.approval_status, ApprovalStatus::Rejected);
    assert_eq!(untouched.approved_by.as_deref(), Some("admin0"));

    let again = engine
        .decide_organization(&o1, DecisionAction::Reject, "admin1", None)
        .await;
    assert!(matches!(again, Err(AppError::InvalidStateTransition(_))));
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_reject_cascade_leaves_approved_recruiter_alone() {
    let db = setup().await;
    let (o1, r1, r2) = (unique("o"), unique("r"), unique("r"));
    let accounts = AccountRepository::new(Arc::clone(&db));
    let organizations = OrganizationRepository::new(Arc::clone(&db));
    organizations.create(company(&o1)).await.unwrap();
    accounts.create(recruiter(&r1, &o1)).await.unwrap();
    let mut approved_earlier = recruiter(&r2, &o1);
    approved_earlier.approval_status = Set(ApprovalStatus::Approved);
    approved_earlier.approved_by = Set(Some("admin0".to_string()));
    approved_earlier.approved_at = Set(Some(Utc::now().into()));
    accounts.create(approved_earlier).await.unwrap();

    let engine = ApprovalEngine::new(Arc::clone(&db), Arc::new(NoOpNotifier));
    let decision = engine
        .decide_organization(&o1, DecisionAction::Reject, "admin1", None)
        .await
        .unwrap();

    assert_eq!(decision.cascaded.len(), 1);
    assert_eq!(decision.cascaded[0].id, r1);

    let organization = organizations.get_by_id(&o1).await.unwrap();
    assert_eq!(organization.approval_status, ApprovalStatus::Rejected);
    assert!(!organization.is_verified);

    let rejected = accounts.get_by_id(&r1).await.unwrap();
    assert_eq!(rejected.approval_status, ApprovalStatus::Rejected);
    assert_eq!(rejected.approved_by.as_deref(), Some("admin1"));

    let untouched = accounts.get_by_id(&r2).await.unwrap();
    assert_eq!(untouched.approval_status, ApprovalStatus::Approved);
    assert_eq!(untouched.approved_by.as_deref(), Some("admin0"));
}
