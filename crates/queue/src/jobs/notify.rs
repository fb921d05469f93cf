//! Notification delivery job.

use placement_core::Notice;
use serde::{Deserialize, Serialize};

/// Job to deliver one notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyJob {
    pub notice: Notice,
}

impl NotifyJob {
    /// Create a new notify job.
    #[must_use]
    pub const fn new(notice: Notice) -> Self {
        Self { notice }
    }
}
