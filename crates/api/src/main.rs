//! API server entry point.

use std::sync::Arc;

use api::Config;
use common::ProductId;
use store::{InMemoryPackageStore, PackageStore, PostgresPackageStore};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

async fn serve<S: PackageStore + Clone + 'static>(
    store: S,
    config: Config,
    metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
) {
    let state = api::create_state(store, &config);

    if config.run_jobs_on_startup {
        let runner = Arc::clone(&state.job_runner);
        tokio::spawn(async move {
            if let Err(e) = runner.run_now().await {
                tracing::error!(error = %e, "startup stale packages check failed");
            }
        });
    }
    state.job_runner.start().await;

    let app = api::create_app(Arc::clone(&state), metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    state.job_runner.stop().await;
    tracing::info!("server shut down gracefully");
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Pick the store: Postgres when configured, in-memory otherwise
    match config.database_url.clone() {
        Some(url) => {
            let store = PostgresPackageStore::connect(&url)
                .await
                .expect("failed to connect to database");
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("connected to PostgreSQL");
            serve(store, config, metrics_handle).await;
        }
        None => {
            let store = InMemoryPackageStore::new();
            for (id, name, sku) in [
                (1, "Wireless Mouse", "SKU-MOUSE-01"),
                (2, "Mechanical Keyboard", "SKU-KEYB-01"),
                (3, "USB-C Dock", "SKU-DOCK-01"),
            ] {
                store.seed_product(ProductId::new(id), name, sku).await;
            }
            tracing::warn!("DATABASE_URL not set, using in-memory store with demo products");
            serve(store, config, metrics_handle).await;
        }
    }
}
