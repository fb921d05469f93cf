//! Database entities.

#![allow(missing_docs)]

pub mod account;
pub mod approval_status;
pub mod notification;
pub mod organization;

pub use account::Entity as Account;
pub use approval_status::{ApprovalColumns, ApprovalStatus};
pub use notification::Entity as Notification;
pub use organization::Entity as Organization;
