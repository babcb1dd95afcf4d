use std::sync::Arc;

use courier_core::blocked_accounts::BlockedAccountStore;
use courier_core::clock::SystemClock;
use courier_core::queue::{Queue, SqsQueue};
use courier_core::services::{
    connect_lazy, GrpcAuthClient, GrpcDirectoryClient, GrpcExcommsClient, GrpcThreadingClient,
};
use courier_core::workers::{
    AppMessageRouter, BlockAccountWorker, ExternalMessageRouter, OnboardingDriver, SupportWorker,
};
use courier_core::{CourierConfig, EventHandler, Worker, WorkerHandle};
use tokio::task::JoinSet;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the courier workers
///
/// Resolves configuration from the environment, connects the backend service clients and
/// starts one queue consumer per configured queue URL:
/// - external-message router
/// - app-message router
/// - onboarding driver
/// - new-org support worker
/// - account-block worker
///
/// Workers run until SIGINT or SIGTERM, then get `COURIER_STOP_WAIT_SECS` to finish the
/// message in hand.
///
/// # Returns
/// * `Ok(())` - If every worker was started and stopped
/// * `Err(anyhow::Error)` - If configuration or client setup fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("courier=info".parse()?)
                .add_directive("courier_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CourierConfig::from_lookup(|key| std::env::var(key).ok())?;
    if let Some(arn) = &config.queue_kms_key_arn {
        tracing::info!(key_arn = %arn, "queue payloads are encrypted server side");
    }

    let directory = Arc::new(GrpcDirectoryClient::new(connect_lazy(&config.directory_addr)?));
    let threading = Arc::new(GrpcThreadingClient::new(connect_lazy(&config.threading_addr)?));
    let excomms = Arc::new(GrpcExcommsClient::new(connect_lazy(&config.excomms_addr)?));
    let auth = Arc::new(GrpcAuthClient::new(connect_lazy(&config.auth_addr)?));
    let clock = Arc::new(SystemClock);

    let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let sqs = aws_sdk_sqs::Client::new(&sdk_config);
    let queue = |url: &Option<String>| -> Option<Arc<dyn Queue>> {
        url.as_ref()
            .map(|url| Arc::new(SqsQueue::new(sqs.clone(), url.clone())) as Arc<dyn Queue>)
    };

    let mut handles = Vec::new();
    start(
        &mut handles,
        queue(&config.queues.external_message),
        ExternalMessageRouter::new(directory.clone(), threading.clone()),
    );
    start(
        &mut handles,
        queue(&config.queues.app_message),
        AppMessageRouter::new(directory.clone(), excomms.clone()),
    );
    start(
        &mut handles,
        queue(&config.queues.excomms_event),
        OnboardingDriver::new(threading.clone()),
    );
    start(
        &mut handles,
        queue(&config.queues.new_org),
        SupportWorker::new(
            directory.clone(),
            threading.clone(),
            clock.clone(),
            config.support_person_name.clone(),
        ),
    );
    if let Some(block_queue) = queue(&config.queues.block_account) {
        let store = BlockedAccountStore::open(&config.blocked_accounts_dir)?;
        start(
            &mut handles,
            Some(block_queue),
            BlockAccountWorker::new(
                auth,
                directory,
                excomms,
                threading,
                store,
                clock,
                config.spruce_support_org_id.clone(),
            ),
        );
    } else {
        tracing::warn!("no queue configured for block-account-worker, not starting it");
    }

    if handles.is_empty() {
        anyhow::bail!("no worker queue URLs are configured");
    }
    tracing::info!(workers = handles.len(), "++ Courier workers running");

    shutdown_signal().await;
    tracing::info!("shutting down");

    let mut stopping = JoinSet::new();
    for handle in handles {
        stopping.spawn(handle.stop(config.stop_wait));
    }
    while stopping.join_next().await.is_some() {}

    Ok(())
}

fn start<H: EventHandler>(
    handles: &mut Vec<WorkerHandle>,
    queue: Option<Arc<dyn Queue>>,
    handler: H,
) {
    match queue {
        Some(queue) => handles.push(Worker::new(queue, handler).start()),
        None => tracing::warn!(
            worker = handler.name(),
            "no queue configured, not starting it"
        ),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
