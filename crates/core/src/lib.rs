//! Core business logic for the placement approval service.
//!
//! Services take a [`CallerContext`] or an explicit decider id and never read
//! ambient request state. The [`ApprovalEngine`] is the only writer of
//! approval columns after creation.

pub mod services;

pub use services::*;
