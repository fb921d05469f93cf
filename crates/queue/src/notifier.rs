//! Redis-backed [`Notifier`].

use apalis::prelude::*;
use apalis_redis::RedisStorage;
use placement_common::{AppError, AppResult};
use placement_core::{Notice, Notifier};
use tokio::runtime::Handle;

use crate::jobs::NotifyJob;

/// Open a Redis connection and wrap it in job storage.
pub async fn connect(redis_url: &str) -> AppResult<RedisStorage<NotifyJob>> {
    let client = redis::Client::open(redis_url)
        .map_err(|e| AppError::Queue(format!("Invalid Redis URL: {e}")))?;
    let conn = redis::aio::ConnectionManager::new(client)
        .await
        .map_err(|e| AppError::Queue(format!("Failed to connect to Redis: {e}")))?;

    Ok(RedisStorage::new(conn))
}

/// Queues notices in Redis for the notify worker.
///
/// The push runs on a spawned task so `notify` never waits on Redis. Push
/// failures after the hand-off are logged.
#[derive(Clone)]
pub struct RedisNotifier {
    storage: RedisStorage<NotifyJob>,
}

impl RedisNotifier {
    /// Create a new Redis notifier.
    #[must_use]
    pub const fn new(storage: RedisStorage<NotifyJob>) -> Self {
        Self { storage }
    }
}

impl Notifier for RedisNotifier {
    fn notify(&self, notice: Notice) -> AppResult<()> {
        let handle = Handle::try_current()
            .map_err(|_| AppError::Queue("No async runtime to queue notice on".to_string()))?;
        let mut storage = self.storage.clone();
        let account_id = notice.account_id.clone();

        handle.spawn(async move {
            match storage.push(NotifyJob::new(notice)).await {
                Ok(_) => tracing::debug!(account_id = %account_id, "Queued notify job"),
                Err(e) => tracing::error!(
                    account_id = %account_id,
                    error = %e,
                    "Failed to queue notify job"
                ),
            }
        });

        Ok(())
    }
}
