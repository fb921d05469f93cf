//! Placement server entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use placement_api::{AppState, app};
use placement_common::{
    Config,
    config::{LogFormat, NotifierBackend},
};
use placement_core::{
    AccountService, ApprovalEngine, AuthorizationGuard, CredentialService, EmailService,
    JobNotifier, JobService, JobWorkerContext, NotificationService, Notifier,
    RegistrationService,
};
use placement_db::repositories::{
    AccountRepository, NotificationRepository, OrganizationRepository,
};
use placement_queue::{NotifyContext, RedisNotifier, spawn_notify_worker};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// How long queued notices may take to drain after the server stops.
const JOB_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "placement=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Configuration first, so the log format can come from it
    let config = Config::load()?;
    init_tracing(config.logging.format);

    info!("Starting placement server...");

    let db = Arc::new(placement_db::init(&config).await?);
    info!("Connected to database");

    info!("Running database migrations...");
    placement_db::migrate(&db).await?;
    info!("Migrations completed");

    let credentials = CredentialService::new(&config.auth);
    let account_repo = AccountRepository::new(Arc::clone(&db));

    let mut notification_service = NotificationService::new(
        NotificationRepository::new(Arc::clone(&db)),
        account_repo.clone(),
    );
    if let Some(mail) = &config.mail {
        notification_service.set_email_service(EmailService::new(mail)?);
        info!(smtp_host = %mail.smtp_host, "Mail delivery enabled");
    }

    // Notices leave the request path here; workers deliver them.
    let mut job_worker = None;
    let notifier: Arc<dyn Notifier> = match config.notifier.backend {
        NotifierBackend::Memory => {
            let jobs = JobService::new();
            let notifier = JobNotifier::new(jobs.sender());
            job_worker = Some(jobs.start(
                JobWorkerContext {
                    notifications: notification_service.clone(),
                },
                config.notifier.workers,
            ));
            info!(workers = config.notifier.workers, "In-process notifier started");
            Arc::new(notifier)
        }
        NotifierBackend::Redis => {
            let redis_url = config.notifier.redis_url.as_deref().unwrap_or_default();
            info!("Connecting to Redis...");
            let storage = placement_queue::connect(redis_url).await?;
            spawn_notify_worker(
                storage.clone(),
                NotifyContext {
                    notifications: notification_service.clone(),
                },
                config.notifier.workers,
            );
            info!("Connected to Redis job queue");
            Arc::new(RedisNotifier::new(storage))
        }
    };

    let state = AppState {
        guard: AuthorizationGuard::new(
            account_repo.clone(),
            OrganizationRepository::new(Arc::clone(&db)),
            credentials.clone(),
        ),
        account_service: AccountService::new(
            account_repo,
            credentials.clone(),
            Arc::clone(&notifier),
        ),
        registration_service: RegistrationService::new(Arc::clone(&db), credentials),
        approval_engine: ApprovalEngine::new(Arc::clone(&db), notifier),
        notification_service,
    };

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router held the last senders; the queue now drains.
    if let Some(worker) = job_worker {
        if tokio::time::timeout(JOB_DRAIN_TIMEOUT, worker).await.is_err() {
            warn!("Timed out draining queued notifications");
        }
    }

    info!("Server shutdown complete");
    Ok(())
}
