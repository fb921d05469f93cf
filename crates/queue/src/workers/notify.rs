//! Notify worker.

use apalis::layers::retry::RetryPolicy;
use apalis::prelude::*;
use apalis_redis::RedisStorage;
use placement_common::AppResult;
use placement_core::NotificationService;
use placement_db::entities::notification;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::jobs::NotifyJob;

/// Attempts per job before apalis gives up on it.
pub const NOTIFY_RETRIES: usize = 3;

/// Context for the notify worker.
#[derive(Clone)]
pub struct NotifyContext {
    pub notifications: NotificationService,
}

/// Worker function for delivering notices.
///
/// # Errors
/// Returns an error if the notification row could not be stored. Mail
/// failures are logged by the notification service and do not fail the job.
pub async fn notify_worker(job: NotifyJob, ctx: Data<NotifyContext>) -> Result<(), Error> {
    match deliver(job, &ctx).await {
        Ok(stored) => {
            debug!(
                account_id = %stored.account_id,
                notification_id = %stored.id,
                "Notification delivered"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Failed to deliver notification");
            let e: Box<dyn std::error::Error + Send + Sync> = Box::new(e);
            Err(Error::Failed(e.into()))
        }
    }
}

async fn deliver(job: NotifyJob, ctx: &NotifyContext) -> AppResult<notification::Model> {
    ctx.notifications.deliver(job.notice).await
}

/// Run the notify worker in the background until the process exits.
pub fn spawn_notify_worker(
    storage: RedisStorage<NotifyJob>,
    context: NotifyContext,
    workers: usize,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(workers, "Starting notify worker");
        let monitor = Monitor::new().register({
            WorkerBuilder::new("notify")
                .enable_tracing()
                .retry(RetryPolicy::retries(NOTIFY_RETRIES))
                .concurrency(workers.max(1))
                .data(context)
                .backend(storage)
                .build_fn(notify_worker)
        });

        if let Err(e) = monitor.run().await {
            error!(error = %e, "Notify worker failed");
        }
    })
}
