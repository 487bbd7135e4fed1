//! Meeting Reconciler
//!
//! Entry point for the meeting status reconciler. Wires the store, the push
//! gateway client and the command listener together, then runs until
//! SIGINT/SIGTERM.

use meeting_reconciler::config::Config;
use meeting_reconciler::listener::start_command_listener;
use meeting_reconciler::repositories::{self, MongoMeetingsRepository, MongoUsersRepository};
use meeting_reconciler::services::{DeviceResolver, FcmClient, Notifier, Transitioner};
use meeting_reconciler::tasks::{start_reconciler, Reconciler, ReconcilerConfig};
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    info!("Starting Meeting Reconciler");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        interval_ms = u64::try_from(config.interval.as_millis()).unwrap_or(u64::MAX),
        max_concurrent_transitions = config.max_concurrent_transitions,
        max_due_batch = config.max_due_batch,
        push_retries = config.push_retries,
        mongo_host = %config.mongo_host,
        mongo_database = %config.mongo_database,
        listener_address = %config.listener_address(),
        "Configuration loaded successfully"
    );

    // Connect to the document store
    info!("Connecting to document store...");
    let store = repositories::connect(&config).await.map_err(|e| {
        error!("Failed to connect to document store: {}", e);
        e
    })?;
    info!("Document store connection established");

    let push_client = FcmClient::new(
        config.push_endpoint.clone(),
        config.push_api_key.clone(),
        config.push_timeout,
    )?;

    // Wire the pipeline: store -> transitioner -> notifier -> push gateway
    let meetings = Arc::new(MongoMeetingsRepository::new(store.clone()));
    let users = Arc::new(MongoUsersRepository::new(store));
    let notifier = Notifier::new(
        DeviceResolver::new(users),
        Arc::new(push_client),
        config.push_retries,
    );
    let transitioner = Transitioner::new(meetings.clone(), notifier);
    let reconciler = Reconciler::new(meetings, transitioner, ReconcilerConfig::from(&config));

    let listener = tokio::net::TcpListener::bind(config.listener_address())
        .await
        .map_err(|e| {
            error!("Failed to bind command listener: {}", e);
            e
        })?;

    let cancel_token = CancellationToken::new();

    let reconciler_handle = tokio::spawn(start_reconciler(reconciler, cancel_token.clone()));
    let listener_handle = tokio::spawn(start_command_listener(listener, cancel_token.clone()));

    info!("Meeting Reconciler running");

    shutdown_signal().await;
    cancel_token.cancel();

    // The reconciler task drains in-flight transitions before returning.
    if let Err(e) = reconciler_handle.await {
        error!("Reconciler task ended abnormally: {}", e);
    }
    if let Err(e) = listener_handle.await {
        error!("Command listener task ended abnormally: {}", e);
    }

    info!("Meeting Reconciler shutdown complete");

    Ok(())
}

/// Human-readable logs by default, JSON when `LOG_FORMAT=json`.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "meeting_reconciler=info,reconciler=info".into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
