mod config;
mod dhcp;
mod handlers;
mod metrics;
mod models;
mod router;
mod watcher;

use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;
use metrics::PrometheusPublisher;
use watcher::{LeaseWatcher, SharedWatchState};

/// Application state shared across handlers
pub struct AppState {
    pub config: Config,
    pub publisher: Arc<PrometheusPublisher>,
    pub watch_state: SharedWatchState,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Load configuration
    let cfg = Config::load()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("lease_exporter={},tower_http=info", cfg.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting LeaseExporter");
    tracing::info!("Lease database: {}", cfg.lease_path);
    tracing::info!("Parse policy: {}", cfg.parse_policy);
    tracing::info!("Listen: {}", cfg.listen_addr);

    let publisher = Arc::new(PrometheusPublisher::new()?);

    // Initialize lease watcher
    let mut lease_watcher = LeaseWatcher::new(
        cfg.lease_path.clone(),
        cfg.parse_policy,
        cfg.resync_interval,
    );

    // Republish the whole table on every successful parse
    let publisher_clone = publisher.clone();
    lease_watcher.add_callback(Arc::new(move |db: &dhcp::LeaseDatabase| {
        metrics::publish(db, publisher_clone.as_ref());
    }));

    lease_watcher.start()?;

    // Create app state
    let state = Arc::new(AppState {
        config: cfg.clone(),
        publisher,
        watch_state: lease_watcher.state(),
    });

    // Build router
    let app = router::build(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&cfg.listen_addr).await?;
    tracing::info!("LeaseExporter listening on {}", cfg.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    lease_watcher.stop();
    tracing::info!("LeaseExporter shutting down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => { sig.recv().await; }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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
