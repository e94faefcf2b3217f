//! HTTP API server for the package tracker.
//!
//! Exposes REST endpoints for the package lifecycle and the stale-shipment
//! job, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use detector::StaleShipmentDetector;
use domain::PackageService;
use jobs::{DailySchedule, JobRunner};
use metrics_exporter_prometheus::PrometheusHandle;
use store::PackageStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use error::ApiError;

/// Shared handler state: the lifecycle service and the job runner, both
/// over the same store.
pub struct AppState<S> {
    pub package_service: PackageService<S>,
    pub job_runner: Arc<JobRunner<S>>,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: PackageStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/packages", post(routes::packages::create_package::<S>))
        .route(
            "/packages/{tracking_code}",
            get(routes::packages::get_package::<S>),
        )
        .route(
            "/packages/{tracking_code}/ready",
            post(routes::packages::mark_ready::<S>),
        )
        .route(
            "/packages/{tracking_code}/in-transit",
            post(routes::packages::mark_in_transit::<S>),
        )
        .route(
            "/packages/{tracking_code}/delivered",
            post(routes::packages::mark_delivered::<S>),
        )
        .route(
            "/packages/{tracking_code}/return",
            post(routes::packages::return_to_warehouse::<S>),
        )
        .route(
            "/jobs/stale-packages/run",
            post(routes::jobs::run_stale_check::<S>),
        )
        .route(
            "/jobs/stale-packages/summary",
            get(routes::jobs::stale_summary::<S>),
        )
        .route(
            "/jobs/scheduler/start",
            post(routes::jobs::start_scheduler::<S>),
        )
        .route(
            "/jobs/scheduler/stop",
            post(routes::jobs::stop_scheduler::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over the given store, wiring the lifecycle
/// service, the detector, and the job runner from configuration.
pub fn create_state<S: PackageStore + Clone + 'static>(
    store: S,
    config: &Config,
) -> Arc<AppState<S>> {
    let package_service = PackageService::new(store.clone());
    let detector = StaleShipmentDetector::new(store, config.stale_threshold_days);

    let schedule = DailySchedule::new(config.job_hour, config.job_minute, config.job_utc_offset_hours)
        .unwrap_or_else(|| {
            tracing::warn!(
                hour = config.job_hour,
                minute = config.job_minute,
                offset = config.job_utc_offset_hours,
                "invalid schedule configuration, falling back to 22:00 UTC"
            );
            // The fallback literals are always in range.
            DailySchedule::new(22, 0, 0).expect("default schedule is valid")
        });

    let job_runner = Arc::new(JobRunner::new(detector, schedule, config.job_log_dir.clone()));

    Arc::new(AppState {
        package_service,
        job_runner,
    })
}
