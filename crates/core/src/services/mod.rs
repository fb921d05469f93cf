//! Business logic services.

#![allow(missing_docs)]

pub mod account;
pub mod approval;
pub mod approval_state;
pub mod credentials;
pub mod email;
pub mod guard;
pub mod jobs;
pub mod notification;
pub mod notifier;
pub mod registration;

pub use account::{AccountService, LoginInput};
pub use approval::{
    AccountDecision, ApprovalEngine, ApprovalStatistics, BulkDecision, MAX_BULK_SIZE,
    OrganizationDecision, PendingApprovals, StatusCounts,
};
pub use approval_state::{ApprovalState, Decision, DecisionAction};
pub use credentials::{Claims, CredentialService, TokenKind, TokenPair};
pub use email::EmailService;
pub use guard::{Action, AuthorizationGuard, CallerContext, Target, actions, authorize};
pub use jobs::{DEFAULT_WORKERS, Job, JobNotifier, JobSender, JobService, JobWorkerContext};
pub use notification::{MAX_PAGE_SIZE, NotificationService};
pub use notifier::{NoOpNotifier, Notice, Notifier};
pub use registration::{
    AUTO_APPROVAL_NOTE, CreateAccountInput, CreateOrganizationInput, NewMemberInput,
    RegisterAccountInput, RegisterOrganizationInput, RegisteredOrganization, RegistrationService,
    required_kind,
};
