use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tailorpass_core::{
    load_config, materialize_certificates, validate_config, ApplePassGenerator, Channel, Config,
    FsArtifactSink, GoogleObjectGenerator, MailDelivery, ObjectStoreUpload, PassGenerator,
    S3ObjectStore, SanitizedConfig, SqliteProductionStore, SyncOrchestrator, SyncScheduler,
    TicketTailorClient,
};
use tailorpass_core::delivery::SmtpMailSender;

use tailorpass_server::api::create_router;
use tailorpass_server::state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("TAILORPASS_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let mut config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    let sanitized = serde_json::to_string(&SanitizedConfig::from(&config)).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(sanitized.as_bytes()));
    info!(
        config_hash = &config_hash[..16],
        event_id = %config.ticket_source.event_id,
        channels = ?config.sync.channels,
        "Configuration loaded"
    );

    // Write base64 certificate material to disk when no paths are configured
    if let Some(apple) = config.apple.as_ref() {
        let materialized =
            materialize_certificates(apple).context("Failed to materialize certificates")?;
        config.apple = Some(materialized);
    }

    // Production state
    let store = Arc::new(
        SqliteProductionStore::new(
            &config.database.path,
            Duration::from_millis(config.database.busy_timeout_ms),
        )
        .context("Failed to open production store")?,
    );
    info!("Production store initialized at {:?}", config.database.path);

    // Ticket source
    let source = Arc::new(
        TicketTailorClient::new(config.ticket_source.clone())
            .context("Failed to create ticket source client")?,
    );

    // Artifact sink
    let sink = Arc::new(FsArtifactSink::new(&config.storage.root));
    info!("Artifacts will be written under {:?}", config.storage.root);

    let mut orchestrator = SyncOrchestrator::new(
        source,
        store,
        sink,
        config.ticket_source.status.clone(),
    );

    // Pass generators, one per target channel
    for generator in build_generators(&config)? {
        info!(channel = %generator.channel(), "Registered pass generator");
        orchestrator = orchestrator.with_generator(generator);
    }

    // Deliveries
    if let Some(object_store) = &config.storage.object_store {
        info!(bucket = %object_store.bucket, "Uploading passes to object storage");
        let s3 = Arc::new(S3ObjectStore::from_config(object_store).await);
        orchestrator = orchestrator.with_delivery(Arc::new(
            ObjectStoreUpload::new(s3, object_store.prefix.clone())
                .with_presign_ttl(Duration::from_secs(object_store.presign_ttl_secs)),
        ));
    }
    if let Some(mailer) = &config.mailer {
        info!(host = %mailer.host, port = mailer.port, "Mailing passes to purchasers");
        let sender = SmtpMailSender::new(mailer).context("Failed to create SMTP transport")?;
        orchestrator = orchestrator.with_delivery(Arc::new(MailDelivery::new(
            Arc::new(sender),
            mailer.from.clone(),
            mailer.subject.clone(),
        )));
    }

    let orchestrator = Arc::new(orchestrator);
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Scheduled runs
    let scheduler_handle = if config.sync.enabled {
        let scheduler = SyncScheduler::new(
            Arc::clone(&orchestrator),
            Duration::from_secs(config.sync.interval_secs),
            Duration::from_secs(config.sync.run_timeout_secs),
        );
        info!(
            interval_secs = config.sync.interval_secs,
            "Sync scheduler started"
        );
        Some(scheduler.spawn(shutdown_tx.subscribe()))
    } else {
        info!("Scheduled sync disabled in config");
        None
    };

    // Create app state and router
    let addr = SocketAddr::new(config.server.host, config.server.port);
    let state = Arc::new(AppState::new(config, Arc::clone(&orchestrator)));
    let app = create_router(state);

    // Start server
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Stop the scheduler and cancel the in-flight run on shutdown
    let shutdown = {
        let orchestrator = Arc::clone(&orchestrator);
        let shutdown_tx = shutdown_tx.clone();
        async move {
            shutdown_signal().await;
            info!("Server shutting down...");
            let _ = shutdown_tx.send(());
            if orchestrator.cancel_current() {
                warn!("Cancelled in-flight sync run");
            }
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("Server error")?;

    if let Some(handle) = scheduler_handle {
        if let Err(e) = handle.await {
            error!("Scheduler task failed: {}", e);
        }
        info!("Sync scheduler stopped");
    }

    Ok(())
}

fn build_generators(config: &Config) -> Result<Vec<Arc<dyn PassGenerator>>> {
    let mut generators: Vec<Arc<dyn PassGenerator>> = Vec::new();
    for channel in &config.sync.channels {
        match channel {
            Channel::AppleWallet => {
                let apple = config
                    .apple
                    .clone()
                    .context("apple_wallet channel requires an [apple] section")?;
                generators.push(Arc::new(
                    ApplePassGenerator::new(apple).context("Failed to create Apple pass generator")?,
                ));
            }
            Channel::GoogleWallet => {
                let google = config
                    .google
                    .clone()
                    .context("google_wallet channel requires a [google] section")?;
                generators.push(Arc::new(GoogleObjectGenerator::new(google)));
            }
        }
    }
    Ok(generators)
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
