//! Job processing service for background tasks.
//!
//! An in-memory queue drained by a bounded pool of tokio tasks. Used as the
//! default notification backend when no Redis queue is configured.

use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use placement_common::{AppError, AppResult};

use crate::services::notification::NotificationService;
use crate::services::notifier::{Notice, Notifier};

/// Default number of concurrent job workers.
pub const DEFAULT_WORKERS: usize = 4;

/// Channel buffer size for jobs.
const JOB_BUFFER_SIZE: usize = 1000;

/// Job types that can be processed.
#[derive(Debug, Clone)]
pub enum Job {
    /// Deliver a notice to its recipient's inbox (and mailbox).
    Notify(Notice),
}

/// Job sender for enqueueing jobs.
#[derive(Clone)]
pub struct JobSender {
    sender: mpsc::Sender<Job>,
}

impl JobSender {
    /// Enqueue a job, waiting for buffer space.
    pub async fn enqueue(&self, job: Job) -> AppResult<()> {
        self.sender
            .send(job)
            .await
            .map_err(|_| AppError::Queue("Job queue is closed".to_string()))
    }

    /// Enqueue a job without waiting. Fails if the buffer is full.
    pub fn try_enqueue(&self, job: Job) -> AppResult<()> {
        self.sender.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => AppError::Queue("Job queue is full".to_string()),
            mpsc::error::TrySendError::Closed(_) => {
                AppError::Queue("Job queue is closed".to_string())
            }
        })
    }
}

/// [`Notifier`] backed by the in-process job queue.
#[derive(Clone)]
pub struct JobNotifier {
    sender: JobSender,
}

impl JobNotifier {
    #[must_use]
    pub const fn new(sender: JobSender) -> Self {
        Self { sender }
    }
}

impl Notifier for JobNotifier {
    fn notify(&self, notice: Notice) -> AppResult<()> {
        self.sender.try_enqueue(Job::Notify(notice))
    }
}

/// Job worker context containing services needed for job processing.
#[derive(Clone)]
pub struct JobWorkerContext {
    pub notifications: NotificationService,
}

/// Job processing service.
pub struct JobService {
    sender: mpsc::Sender<Job>,
    receiver: mpsc::Receiver<Job>,
}

impl JobService {
    /// Create a new job service.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel(JOB_BUFFER_SIZE);
        Self { sender, receiver }
    }

    /// Get a job sender for enqueueing jobs.
    #[must_use]
    pub fn sender(&self) -> JobSender {
        JobSender {
            sender: self.sender.clone(),
        }
    }

    /// Start the job processor with the given context.
    /// This consumes the receiver and spawns worker tasks.
    ///
    /// The returned handle completes once every sender is dropped and the
    /// jobs already taken off the queue have finished.
    pub fn start(self, context: JobWorkerContext, workers: usize) -> JoinHandle<()> {
        let Self { sender, receiver } = self;
        // Only external senders keep the channel open.
        drop(sender);

        let context = Arc::new(context);
        let workers = workers.max(1);

        tokio::spawn(async move {
            info!("Job worker starting with {} workers", workers);
            run_job_processor(receiver, context, workers).await;
            info!("Job worker stopped");
        })
    }
}

impl Default for JobService {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the job processor.
async fn run_job_processor(
    mut receiver: mpsc::Receiver<Job>,
    context: Arc<JobWorkerContext>,
    workers: usize,
) {
    let semaphore = Arc::new(Semaphore::new(workers));

    while let Some(job) = receiver.recv().await {
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            break;
        };
        let ctx = context.clone();

        tokio::spawn(async move {
            process_job(job, &ctx).await;
            // Release the context before the permit so a drained pool holds
            // no references to it.
            drop(ctx);
            drop(permit);
        });
    }

    // Drain: every permit back means every spawned job is done.
    let _ = semaphore.acquire_many(workers as u32).await;
}

/// Process a single job.
async fn process_job(job: Job, context: &JobWorkerContext) {
    match job {
        Job::Notify(notice) => process_notify(context, notice).await,
    }
}

/// Process a notification job.
async fn process_notify(context: &JobWorkerContext, notice: Notice) {
    let account_id = notice.account_id.clone();

    match context.notifications.deliver(notice).await {
        Ok(stored) => {
            debug!(
                account_id = %account_id,
                notification_id = %stored.id,
                "Notification delivered"
            );
        }
        Err(e) => {
            error!(
                account_id = %account_id,
                error = %e,
                "Failed to deliver notification"
            );
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use placement_db::entities::notification::{self, NotificationKind, NotificationPriority};
    use placement_db::repositories::{AccountRepository, NotificationRepository};
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_try_enqueue_reports_full_queue() {
        let (sender, _receiver) = mpsc::channel(1);
        let notifier = JobNotifier::new(JobSender { sender });

        notifier
            .notify(Notice::account_status_changed("a1", true))
            .unwrap();
        let second = notifier.notify(Notice::account_status_changed("a1", false));
        assert!(matches!(second, Err(AppError::Queue(_))));
    }

    #[tokio::test]
    async fn test_closed_queue() {
        let (sender, receiver) = mpsc::channel(1);
        drop(receiver);
        let sender = JobSender { sender };

        let result = sender.enqueue(Job::Notify(Notice::account_status_changed("a1", true))).await;
        assert!(matches!(result, Err(AppError::Queue(_))));
    }

    #[tokio::test]
    async fn test_worker_delivers_notice() {
        let stored = notification::Model {
            id: "n1".to_string(),
            account_id: "a1".to_string(),
            title: "Account reactivated".to_string(),
            body: "Your account has been reactivated.".to_string(),
            kind: NotificationKind::AccountStatus,
            metadata: None,
            priority: NotificationPriority::Normal,
            is_read: false,
            created_at: chrono::Utc::now().into(),
        };
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[stored]])
                .into_connection(),
        );
        let notifications = NotificationService::new(
            NotificationRepository::new(Arc::clone(&db)),
            AccountRepository::new(Arc::clone(&db)),
        );

        let service = JobService::new();
        let notifier = JobNotifier::new(service.sender());
        let worker = service.start(JobWorkerContext { notifications }, 2);

        notifier
            .notify(Notice::account_status_changed("a1", true))
            .unwrap();

        // Closing the queue lets the worker drain and release the connection.
        drop(notifier);
        worker.await.unwrap();

        let log = Arc::into_inner(db).unwrap().into_transaction_log();
        assert_eq!(log.len(), 1);
        assert!(format!("{log:?}").contains("INSERT INTO \\\"notification\\\""));
    }

    #[tokio::test]
    async fn test_worker_stops_when_senders_are_gone() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let notifications = NotificationService::new(
            NotificationRepository::new(Arc::clone(&db)),
            AccountRepository::new(Arc::clone(&db)),
        );

        let worker = JobService::new().start(JobWorkerContext { notifications }, 1);
        worker.await.unwrap();

        assert!(Arc::into_inner(db).unwrap().into_transaction_log().is_empty());
    }
}
