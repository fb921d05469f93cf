//! Account and organization creation.
//!
//! Self-registration creates organizations and recruiters `pending`.
//! Students and TPOs joining an approved university are approved on the
//! spot; inside a pending one they wait for the university's decision.
//! Admin creation skips review entirely but only into approved
//! organizations. Every path validates shape, then affiliation, then
//! uniqueness, before it writes anything.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use placement_common::{AppError, AppResult, IdGenerator};
use placement_db::{
    entities::{
        ApprovalStatus,
        account::{self, AccountRole},
        organization::{self, OrganizationKind},
    },
    repositories::{AccountRepository, OrganizationRepository},
};
use sea_orm::{DatabaseConnection, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::{Validate, ValidationError};

use super::{
    approval_state::{ApprovalState, Decision},
    credentials::CredentialService,
    guard::{CallerContext, Target, actions, authorize},
};

/// Notes recorded on self-registered accounts that skip review.
pub const AUTO_APPROVAL_NOTE: &str = "auto-approved at registration";

/// Organization kind a role must belong to. `None` for admins.
#[must_use]
pub const fn required_kind(role: AccountRole) -> Option<OrganizationKind> {
    match role {
        AccountRole::Student | AccountRole::Tpo => Some(OrganizationKind::University),
        AccountRole::Recruiter => Some(OrganizationKind::Company),
        AccountRole::Admin => None,
    }
}

fn check_affiliation(role: AccountRole, kind: OrganizationKind) -> AppResult<()> {
    match required_kind(role) {
        Some(required) if required == kind => Ok(()),
        Some(required) => Err(AppError::Validation(format!(
            "{role} accounts must belong to a {required}, not a {kind}"
        ))),
        None => Err(AppError::Validation(
            "admin accounts do not belong to an organization".to_string(),
        )),
    }
}

fn validate_domain(domain: &str) -> Result<(), ValidationError> {
    let valid_chars = domain
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.');
    let valid_labels = domain
        .split('.')
        .all(|label| !label.is_empty() && !label.starts_with('-') && !label.ends_with('-'));

    if valid_chars && valid_labels && domain.contains('.') {
        Ok(())
    } else {
        Err(ValidationError::new("domain"))
    }
}

/// Credentials and profile of a new account.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewMemberInput {
    #[validate(email, length(max = 256))]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[validate(length(min = 1, max = 128))]
    pub name: Option<String>,
    pub role: AccountRole,
}

/// Self-service organization sign-up with its first member.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterOrganizationInput {
    #[validate(length(min = 2, max = 256))]
    pub name: String,
    #[validate(length(min = 3, max = 256), custom(function = "validate_domain"))]
    pub domain: String,
    pub kind: OrganizationKind,
    pub partner_university_id: Option<String>,
    #[validate(nested)]
    pub representative: NewMemberInput,
}

/// Self-service sign-up into an existing organization.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterAccountInput {
    #[validate(nested)]
    #[serde(flatten)]
    pub member: NewMemberInput,
    #[validate(length(min = 1, max = 32))]
    pub organization_id: String,
}

/// Organization created directly by an admin.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrganizationInput {
    #[validate(length(min = 2, max = 256))]
    pub name: String,
    #[validate(length(min = 3, max = 256), custom(function = "validate_domain"))]
    pub domain: String,
    pub kind: OrganizationKind,
    pub partner_university_id: Option<String>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

/// Account created directly by an admin.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountInput {
    #[validate(nested)]
    #[serde(flatten)]
    pub member: NewMemberInput,
    /// Required unless the role is admin.
    pub organization_id: Option<String>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

/// A registered organization and its first member.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredOrganization {
    pub organization: organization::Model,
    pub representative: account::Model,
}

/// Registration service.
#[derive(Clone)]
pub struct RegistrationService {
    db: Arc<DatabaseConnection>,
    organizations: OrganizationRepository,
    accounts: AccountRepository,
    credentials: CredentialService,
    id_gen: IdGenerator,
}

impl RegistrationService {
    /// Create a new registration service.
    #[must_use]
    pub fn new(db: Arc<DatabaseConnection>, credentials: CredentialService) -> Self {
        Self {
            organizations: OrganizationRepository::new(Arc::clone(&db)),
            accounts: AccountRepository::new(Arc::clone(&db)),
            db,
            credentials,
            id_gen: IdGenerator::new(),
        }
    }

    /// Register an organization and its representative in one transaction.
    pub async fn register_organization(
        &self,
        input: RegisterOrganizationInput,
    ) -> AppResult<RegisteredOrganization> {
        input.validate()?;
        check_affiliation(input.representative.role, input.kind)?;
        self.check_partner(input.kind, input.partner_university_id.as_deref())
            .await?;
        self.check_organization_unique(&input.name, &input.domain)
            .await?;
        self.check_email_unique(&input.representative.email).await?;

        let now: DateTime<FixedOffset> = Utc::now().into();
        let organization_id = self.id_gen.generate();
        let account_id = self.id_gen.generate();
        let password_hash = self.credentials.hash(&input.representative.password)?;
        let account_state = self_registration_state(
            input.representative.role,
            ApprovalStatus::Pending,
            &account_id,
            now,
        );

        let organization_model = Self::new_organization(
            organization_id.clone(),
            &input.name,
            &input.domain,
            input.kind,
            input.partner_university_id,
            &ApprovalState::Pending,
            now,
        );
        let account_model = Self::new_account(
            account_id,
            &input.representative,
            password_hash,
            Some(organization_id),
            &account_state,
            now,
        );

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        let organization = self
            .organizations
            .insert_in(&txn, organization_model)
            .await?;
        let representative = self.accounts.insert_in(&txn, account_model).await?;
        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        info!(
            organization_id = %organization.id,
            kind = %organization.kind,
            representative_id = %representative.id,
            representative_status = %representative.approval_status,
            "Organization registered"
        );

        Ok(RegisteredOrganization {
            organization,
            representative,
        })
    }

    /// Register a member of an existing organization.
    pub async fn register_account(&self, input: RegisterAccountInput) -> AppResult<account::Model> {
        input.validate()?;
        if input.member.role == AccountRole::Admin {
            return Err(AppError::Validation(
                "admin accounts cannot self-register".to_string(),
            ));
        }

        let organization = self
            .organizations
            .get_by_id(&input.organization_id)
            .await?;
        check_affiliation(input.member.role, organization.kind)?;
        Self::check_not_rejected(&organization)?;
        self.check_email_unique(&input.member.email).await?;

        let now: DateTime<FixedOffset> = Utc::now().into();
        let account_id = self.id_gen.generate();
        let password_hash = self.credentials.hash(&input.member.password)?;
        let state = self_registration_state(
            input.member.role,
            organization.approval_status,
            &account_id,
            now,
        );

        let account = self
            .accounts
            .create(Self::new_account(
                account_id,
                &input.member,
                password_hash,
                Some(organization.id),
                &state,
                now,
            ))
            .await?;

        info!(
            account_id = %account.id,
            role = %account.role,
            status = %account.approval_status,
            "Account registered"
        );
        Ok(account)
    }

    /// Create an already approved and verified organization.
    pub async fn create_organization(
        &self,
        admin: &CallerContext,
        input: CreateOrganizationInput,
    ) -> AppResult<organization::Model> {
        authorize(admin, &actions::CREATE_APPROVED, &Target::any())?;
        input.validate()?;
        self.check_partner(input.kind, input.partner_university_id.as_deref())
            .await?;
        self.check_organization_unique(&input.name, &input.domain)
            .await?;

        let now: DateTime<FixedOffset> = Utc::now().into();
        let state = ApprovalState::approved_at_creation(Decision {
            by: admin.account_id.clone(),
            at: now,
            notes: input.notes,
        });

        let organization = self
            .organizations
            .create(Self::new_organization(
                self.id_gen.generate(),
                &input.name,
                &input.domain,
                input.kind,
                input.partner_university_id,
                &state,
                now,
            ))
            .await?;

        info!(
            organization_id = %organization.id,
            created_by = %admin.account_id,
            "Organization created by admin"
        );
        Ok(organization)
    }

    /// Create an already approved account.
    pub async fn create_account(
        &self,
        admin: &CallerContext,
        input: CreateAccountInput,
    ) -> AppResult<account::Model> {
        authorize(admin, &actions::CREATE_APPROVED, &Target::any())?;
        input.validate()?;

        let organization_id = match (input.member.role, input.organization_id) {
            (AccountRole::Admin, None) => None,
            (AccountRole::Admin, Some(_)) => {
                return Err(AppError::Validation(
                    "admin accounts do not belong to an organization".to_string(),
                ));
            }
            (role, Some(organization_id)) => {
                let organization = self.organizations.get_by_id(&organization_id).await?;
                check_affiliation(role, organization.kind)?;
                if organization.approval_status != ApprovalStatus::Approved {
                    return Err(AppError::Validation(format!(
                        "organization {} is {}",
                        organization.id, organization.approval_status
                    )));
                }
                Some(organization.id)
            }
            (role, None) => {
                return Err(AppError::Validation(format!(
                    "{role} accounts require an organizationId"
                )));
            }
        };
        self.check_email_unique(&input.member.email).await?;

        let now: DateTime<FixedOffset> = Utc::now().into();
        let password_hash = self.credentials.hash(&input.member.password)?;
        let state = ApprovalState::approved_at_creation(Decision {
            by: admin.account_id.clone(),
            at: now,
            notes: input.notes,
        });

        let account = self
            .accounts
            .create(Self::new_account(
                self.id_gen.generate(),
                &input.member,
                password_hash,
                organization_id,
                &state,
                now,
            ))
            .await?;

        info!(
            account_id = %account.id,
            role = %account.role,
            created_by = %admin.account_id,
            "Account created by admin"
        );
        Ok(account)
    }

    async fn check_partner(
        &self,
        kind: OrganizationKind,
        partner_university_id: Option<&str>,
    ) -> AppResult<()> {
        let Some(partner_id) = partner_university_id else {
            return Ok(());
        };
        if kind == OrganizationKind::University {
            return Err(AppError::Validation(
                "universities cannot have a partner university".to_string(),
            ));
        }

        match self.organizations.find_by_id(partner_id).await? {
            Some(partner)
                if partner.kind == OrganizationKind::University
                    && partner.approval_status == ApprovalStatus::Approved =>
            {
                Ok(())
            }
            Some(partner) if partner.kind == OrganizationKind::University => {
                Err(AppError::Validation(format!(
                    "partner university {partner_id} is {}",
                    partner.approval_status
                )))
            }
            _ => Err(AppError::Validation(format!(
                "partnerUniversityId {partner_id} is not a university"
            ))),
        }
    }

    fn check_not_rejected(organization: &organization::Model) -> AppResult<()> {
        if organization.approval_status == ApprovalStatus::Rejected {
            return Err(AppError::Validation(format!(
                "organization {} is rejected",
                organization.id
            )));
        }
        Ok(())
    }

    async fn check_organization_unique(&self, name: &str, domain: &str) -> AppResult<()> {
        if self.organizations.exists_by_name(name).await? {
            return Err(AppError::Conflict(format!(
                "organization name {name} is taken"
            )));
        }
        if self.organizations.exists_by_domain(domain).await? {
            return Err(AppError::Conflict(format!("domain {domain} is taken")));
        }
        Ok(())
    }

    async fn check_email_unique(&self, email: &str) -> AppResult<()> {
        if self.accounts.exists_by_email(email).await? {
            return Err(AppError::Conflict("email is already registered".to_string()));
        }
        Ok(())
    }

    fn new_organization(
        id: String,
        name: &str,
        domain: &str,
        kind: OrganizationKind,
        partner_university_id: Option<String>,
        state: &ApprovalState,
        now: DateTime<FixedOffset>,
    ) -> organization::ActiveModel {
        let columns = state.to_columns();
        organization::ActiveModel {
            id: Set(id),
            name: Set(name.trim().to_string()),
            domain: Set(domain.to_lowercase()),
            kind: Set(kind),
            partner_university_id: Set(partner_university_id),
            is_verified: Set(columns.status == ApprovalStatus::Approved),
            approval_status: Set(columns.status),
            approved_by: Set(columns.approved_by),
            approved_at: Set(columns.approved_at),
            approval_notes: Set(columns.notes),
            created_at: Set(now),
            updated_at: Set(None),
        }
    }

    fn new_account(
        id: String,
        member: &NewMemberInput,
        password_hash: String,
        organization_id: Option<String>,
        state: &ApprovalState,
        now: DateTime<FixedOffset>,
    ) -> account::ActiveModel {
        let columns = state.to_columns();
        account::ActiveModel {
            id: Set(id),
            email: Set(member.email.to_lowercase()),
            password_hash: Set(password_hash),
            name: Set(member.name.clone()),
            role: Set(member.role),
            organization_id: Set(organization_id),
            is_active: Set(true),
            approval_status: Set(columns.status),
            approved_by: Set(columns.approved_by),
            approved_at: Set(columns.approved_at),
            approval_notes: Set(columns.notes),
            created_at: Set(now),
            updated_at: Set(None),
        }
    }
}

/// Initial state of a self-registered account.
///
/// Students and TPOs of an approved university are approved by themselves.
/// Everyone else waits for review.
fn self_registration_state(
    role: AccountRole,
    organization_status: ApprovalStatus,
    account_id: &str,
    now: DateTime<FixedOffset>,
) -> ApprovalState {
    if organization_status != ApprovalStatus::Approved {
        return ApprovalState::Pending;
    }
    match role {
        AccountRole::Student | AccountRole::Tpo => ApprovalState::approved_at_creation(Decision {
            by: account_id.to_string(),
            at: now,
            notes: Some(AUTO_APPROVAL_NOTE.to_string()),
        }),
        AccountRole::Recruiter | AccountRole::Admin => ApprovalState::Pending,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::credentials::tests::test_auth_config;
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase, RuntimeErr, Value};

    fn count(n: i64) -> std::collections::BTreeMap<&'static str, Value> {
        maplit::btreemap! { "num_items" => Value::BigInt(Some(n)) }
    }

    fn organization(id: &str, kind: OrganizationKind, status: ApprovalStatus) -> organization::Model {
        let decided = status != ApprovalStatus::Pending;
        organization::Model {
            id: id.to_string(),
            name: format!("Org {id}"),
            domain: format!("{id}.example.edu"),
            kind,
            partner_university_id: None,
            is_verified: status == ApprovalStatus::Approved,
            approval_status: status,
            approved_by: decided.then(|| "admin1".to_string()),
            approved_at: decided.then(|| Utc::now().into()),
            approval_notes: None,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn member(email: &str, role: AccountRole) -> NewMemberInput {
        NewMemberInput {
            email: email.to_string(),
            password: "correct horse battery".to_string(),
            name: Some("Pat".to_string()),
            role,
        }
    }

    fn service(db: &Arc<DatabaseConnection>) -> RegistrationService {
        RegistrationService::new(Arc::clone(db), CredentialService::new(&test_auth_config()))
    }

    fn log_of(service: RegistrationService, db: Arc<DatabaseConnection>) -> String {
        drop(service);
        format!("{:?}", Arc::into_inner(db).unwrap().into_transaction_log())
    }

    #[test]
    fn test_required_kind() {
        assert_eq!(required_kind(AccountRole::Student), Some(OrganizationKind::University));
        assert_eq!(required_kind(AccountRole::Tpo), Some(OrganizationKind::University));
        assert_eq!(required_kind(AccountRole::Recruiter), Some(OrganizationKind::Company));
        assert_eq!(required_kind(AccountRole::Admin), None);
    }

    #[test]
    fn test_self_registration_state() {
        let now: DateTime<FixedOffset> = Utc::now().into();

        let student =
            self_registration_state(AccountRole::Student, ApprovalStatus::Approved, "s1", now);
        let decision = student.decision().unwrap();
        assert_eq!(student.status(), ApprovalStatus::Approved);
        assert_eq!(decision.by, "s1");
        assert_eq!(decision.notes.as_deref(), Some(AUTO_APPROVAL_NOTE));

        assert_eq!(
            self_registration_state(AccountRole::Recruiter, ApprovalStatus::Approved, "r1", now),
            ApprovalState::Pending
        );
        assert_eq!(
            self_registration_state(AccountRole::Tpo, ApprovalStatus::Pending, "t1", now),
            ApprovalState::Pending
        );
    }

    #[test]
    fn test_validate_domain() {
        assert!(validate_domain("acme.com").is_ok());
        assert!(validate_domain("cs.state-uni.edu").is_ok());
        assert!(validate_domain("localhost").is_err());
        assert!(validate_domain("acme..com").is_err());
        assert!(validate_domain("-acme.com").is_err());
        assert!(validate_domain("ac me.com").is_err());
    }

    #[tokio::test]
    async fn test_recruiter_into_university_fails_before_any_write() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[organization("uni1", OrganizationKind::University, ApprovalStatus::Approved)]])
                .into_connection(),
        );
        let service = service(&db);

        let result = service
            .register_account(RegisterAccountInput {
                member: member("recruiter@acme.com", AccountRole::Recruiter),
                organization_id: "uni1".to_string(),
            })
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let logged = log_of(service, db);
        assert!(!logged.contains("INSERT"));
    }

    #[tokio::test]
    async fn test_register_organization_kind_mismatch_touches_nothing() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let service = service(&db);

        let result = service
            .register_organization(RegisterOrganizationInput {
                name: "State University".to_string(),
                domain: "state.edu".to_string(),
                kind: OrganizationKind::University,
                partner_university_id: None,
                representative: member("hr@state.edu", AccountRole::Recruiter),
            })
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        drop(service);
        assert!(Arc::into_inner(db).unwrap().into_transaction_log().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_shape_is_rejected_first() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let service = service(&db);

        let mut rep = member("not-an-email", AccountRole::Recruiter);
        rep.password = "short".to_string();
        let result = service
            .register_organization(RegisterOrganizationInput {
                name: "Acme".to_string(),
                domain: "acme.com".to_string(),
                kind: OrganizationKind::Company,
                partner_university_id: None,
                representative: rep,
            })
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_duplicate_domain_is_conflict() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[count(0)], [count(1)]])
                .into_connection(),
        );
        let service = service(&db);

        let result = service
            .register_organization(RegisterOrganizationInput {
                name: "Acme".to_string(),
                domain: "ACME.com".to_string(),
                kind: OrganizationKind::Company,
                partner_university_id: None,
                representative: member("hr@acme.com", AccountRole::Recruiter),
            })
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert!(!log_of(service, db).contains("INSERT"));
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[organization("uni1", OrganizationKind::University, ApprovalStatus::Approved)]])
                .append_query_results([[count(1)]])
                .into_connection(),
        );
        let service = service(&db);

        let result = service
            .register_account(RegisterAccountInput {
                member: member("Student@Uni.edu", AccountRole::Student),
                organization_id: "uni1".to_string(),
            })
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_register_organization_writes_both_rows_in_one_transaction() {
        let created = organization("acme", OrganizationKind::Company, ApprovalStatus::Pending);
        let representative = account::Model {
            id: "r1".to_string(),
            email: "hr@acme.com".to_string(),
            password_hash: "$argon2id$stub".to_string(),
            name: Some("Pat".to_string()),
            role: AccountRole::Recruiter,
            organization_id: Some("acme".to_string()),
            is_active: true,
            approval_status: ApprovalStatus::Pending,
            approved_by: None,
            approved_at: None,
            approval_notes: None,
            created_at: Utc::now().into(),
            updated_at: None,
        };
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[organization("uni1", OrganizationKind::University, ApprovalStatus::Approved)]])
                .append_query_results([[count(0)], [count(0)], [count(0)]])
                .append_query_results([[created]])
                .append_query_results([[representative]])
                .into_connection(),
        );
        let service = service(&db);

        let registered = service
            .register_organization(RegisterOrganizationInput {
                name: "Acme".to_string(),
                domain: "acme.com".to_string(),
                kind: OrganizationKind::Company,
                partner_university_id: Some("uni1".to_string()),
                representative: member("hr@acme.com", AccountRole::Recruiter),
            })
            .await
            .unwrap();
        assert_eq!(registered.organization.id, "acme");
        assert_eq!(registered.representative.organization_id.as_deref(), Some("acme"));

        let logged = log_of(service, db);
        assert_eq!(logged.matches("INSERT INTO").count(), 2);
        assert!(logged.contains("COMMIT"));
    }

    #[tokio::test]
    async fn test_admin_role_cannot_self_register() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let service = service(&db);

        let result = service
            .register_account(RegisterAccountInput {
                member: member("root@uni.edu", AccountRole::Admin),
                organization_id: "uni1".to_string(),
            })
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_account_requires_admin() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let service = service(&db);
        let tpo = CallerContext {
            account_id: "tpo1".to_string(),
            role: AccountRole::Tpo,
            organization_id: Some("uni1".to_string()),
            approval_status: ApprovalStatus::Approved,
            organization_status: Some(ApprovalStatus::Approved),
        };

        let result = service
            .create_account(
                &tpo,
                CreateAccountInput {
                    member: member("new@uni.edu", AccountRole::Student),
                    organization_id: Some("uni1".to_string()),
                    notes: None,
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::InsufficientRole(_))));
    }

    #[tokio::test]
    async fn test_create_account_non_admin_needs_organization() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let service = service(&db);
        let admin = CallerContext {
            account_id: "admin1".to_string(),
            role: AccountRole::Admin,
            organization_id: None,
            approval_status: ApprovalStatus::Approved,
            organization_status: None,
        };

        let result = service
            .create_account(
                &admin,
                CreateAccountInput {
                    member: member("hr@acme.com", AccountRole::Recruiter),
                    organization_id: None,
                    notes: None,
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    fn admin() -> CallerContext {
        CallerContext {
            account_id: "admin1".to_string(),
            role: AccountRole::Admin,
            organization_id: None,
            approval_status: ApprovalStatus::Approved,
            organization_status: None,
        }
    }

    fn stored_account(id: &str, role: AccountRole, organization_id: &str) -> account::Model {
        account::Model {
            id: id.to_string(),
            email: format!("{id}@example.edu"),
            password_hash: "$argon2id$stub".to_string(),
            name: Some("Pat".to_string()),
            role,
            organization_id: Some(organization_id.to_string()),
            is_active: true,
            approval_status: ApprovalStatus::Pending,
            approved_by: None,
            approved_at: None,
            approval_notes: None,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_pending_partner_university_is_refused() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[organization("uni9", OrganizationKind::University, ApprovalStatus::Pending)]])
                .into_connection(),
        );
        let service = service(&db);

        let result = service
            .register_organization(RegisterOrganizationInput {
                name: "Acme".to_string(),
                domain: "acme.com".to_string(),
                kind: OrganizationKind::Company,
                partner_university_id: Some("uni9".to_string()),
                representative: member("hr@acme.com", AccountRole::Recruiter),
            })
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(!log_of(service, db).contains("INSERT"));
    }

    #[tokio::test]
    async fn test_student_of_pending_university_waits_for_review() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[organization("uni9", OrganizationKind::University, ApprovalStatus::Pending)]])
                .append_query_results([[count(0)]])
                .append_query_results([[stored_account("s1", AccountRole::Student, "uni9")]])
                .into_connection(),
        );
        let service = service(&db);

        service
            .register_account(RegisterAccountInput {
                member: member("student@uni9.edu", AccountRole::Student),
                organization_id: "uni9".to_string(),
            })
            .await
            .unwrap();

        let logged = log_of(service, db);
        assert!(logged.contains("INSERT INTO"));
        assert!(logged.contains("\"pending\""));
        assert!(!logged.contains("\"approved\""));
        assert!(!logged.contains(AUTO_APPROVAL_NOTE));
    }

    #[tokio::test]
    async fn test_tpo_of_new_university_waits_for_review() {
        let created = organization("uni9", OrganizationKind::University, ApprovalStatus::Pending);
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[count(0)], [count(0)], [count(0)]])
                .append_query_results([[created]])
                .append_query_results([[stored_account("t1", AccountRole::Tpo, "uni9")]])
                .into_connection(),
        );
        let service = service(&db);

        service
            .register_organization(RegisterOrganizationInput {
                name: "State University".to_string(),
                domain: "state.edu".to_string(),
                kind: OrganizationKind::University,
                partner_university_id: None,
                representative: member("tpo@state.edu", AccountRole::Tpo),
            })
            .await
            .unwrap();

        let logged = log_of(service, db);
        assert_eq!(logged.matches("INSERT INTO").count(), 2);
        assert!(!logged.contains("\"approved\""));
    }

    #[tokio::test]
    async fn test_admin_creates_approved_organization() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[count(0)], [count(0)]])
                .append_query_results([[organization("uni1", OrganizationKind::University, ApprovalStatus::Approved)]])
                .into_connection(),
        );
        let service = service(&db);

        service
            .create_organization(
                &admin(),
                CreateOrganizationInput {
                    name: "State University".to_string(),
                    domain: "state.edu".to_string(),
                    kind: OrganizationKind::University,
                    partner_university_id: None,
                    notes: Some("onboarded by phone".to_string()),
                },
            )
            .await
            .unwrap();

        let logged = log_of(service, db);
        assert_eq!(logged.matches("INSERT INTO").count(), 1);
        assert!(logged.contains("\"approved\""));
        assert!(logged.contains("\"admin1\""));
        assert!(logged.contains("Bool(Some(true))"));
        assert!(logged.contains("onboarded by phone"));
    }

    #[test]
    fn test_admin_created_rows_carry_the_decision() {
        let now: DateTime<FixedOffset> = Utc::now().into();
        let state = ApprovalState::approved_at_creation(Decision {
            by: "admin1".to_string(),
            at: now,
            notes: None,
        });

        let organization = RegistrationService::new_organization(
            "uni1".to_string(),
            " State University ",
            "State.EDU",
            OrganizationKind::University,
            None,
            &state,
            now,
        );
        assert_eq!(organization.approval_status, Set(ApprovalStatus::Approved));
        assert_eq!(organization.approved_by, Set(Some("admin1".to_string())));
        assert_eq!(organization.approved_at, Set(Some(now)));
        assert_eq!(organization.is_verified, Set(true));
        assert_eq!(organization.domain, Set("state.edu".to_string()));
        assert_eq!(organization.name, Set("State University".to_string()));

        let account = RegistrationService::new_account(
            "s1".to_string(),
            &member("Student@State.edu", AccountRole::Student),
            "$argon2id$stub".to_string(),
            Some("uni1".to_string()),
            &state,
            now,
        );
        assert_eq!(account.approval_status, Set(ApprovalStatus::Approved));
        assert_eq!(account.approved_by, Set(Some("admin1".to_string())));
        assert_eq!(account.approved_at, Set(Some(now)));
        assert_eq!(account.email, Set("student@state.edu".to_string()));
    }

    #[tokio::test]
    async fn test_admin_creates_approved_account() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[organization("uni1", OrganizationKind::University, ApprovalStatus::Approved)]])
                .append_query_results([[count(0)]])
                .append_query_results([[stored_account("s1", AccountRole::Student, "uni1")]])
                .into_connection(),
        );
        let service = service(&db);

        service
            .create_account(
                &admin(),
                CreateAccountInput {
                    member: member("student@uni1.edu", AccountRole::Student),
                    organization_id: Some("uni1".to_string()),
                    notes: None,
                },
            )
            .await
            .unwrap();

        let logged = log_of(service, db);
        assert_eq!(logged.matches("INSERT INTO").count(), 1);
        assert!(logged.contains("\"approved\""));
        assert!(logged.contains("\"admin1\""));
    }

    #[tokio::test]
    async fn test_admin_cannot_create_account_in_pending_organization() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[organization("acme", OrganizationKind::Company, ApprovalStatus::Pending)]])
                .into_connection(),
        );
        let service = service(&db);

        let result = service
            .create_account(
                &admin(),
                CreateAccountInput {
                    member: member("hr@acme.com", AccountRole::Recruiter),
                    organization_id: Some("acme".to_string()),
                    notes: None,
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(!log_of(service, db).contains("INSERT"));
    }

    #[tokio::test]
    async fn test_email_taken_between_check_and_insert_is_conflict() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[organization("uni1", OrganizationKind::University, ApprovalStatus::Approved)]])
                .append_query_results([[count(0)]])
                .append_query_errors([DbErr::Query(RuntimeErr::Internal(
                    "duplicate key value violates unique constraint \"account_email_key\"".to_string(),
                ))])
                .into_connection(),
        );
        let service = service(&db);

        let result = service
            .register_account(RegisterAccountInput {
                member: member("student@uni1.edu", AccountRole::Student),
                organization_id: "uni1".to_string(),
            })
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }
}
