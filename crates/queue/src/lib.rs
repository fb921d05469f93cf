//! Redis-backed notification queue for the placement service.
//!
//! - **Jobs**: [`NotifyJob`], one notice for one account
//! - **Notifier**: [`RedisNotifier`] pushes jobs without blocking the caller
//! - **Workers**: an apalis worker that stores and mails each notice

pub mod jobs;
pub mod notifier;
pub mod workers;

pub use jobs::*;
pub use notifier::{RedisNotifier, connect};
pub use workers::*;
