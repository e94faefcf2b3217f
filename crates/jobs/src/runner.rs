//! The job runner: scheduled and on-demand stale-shipment checks.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use detector::{StaleReport, StaleShipmentDetector};
use store::PackageStore;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::error::JobError;
use crate::log::RunLog;
use crate::schedule::DailySchedule;

const JOB_NAME: &str = "stale-packages";

/// Runs the stale-shipment check on a daily schedule and on demand.
///
/// A run guard prevents overlap: scheduled firings skip when a run is still
/// in progress, manual triggers queue behind it. The schedule loop survives
/// failed runs; only [`JobRunner::stop`] ends it.
pub struct JobRunner<S> {
    detector: StaleShipmentDetector<S>,
    schedule: DailySchedule,
    log_dir: PathBuf,
    last_report: RwLock<Option<StaleReport>>,
    run_guard: Mutex<()>,
    schedule_task: Mutex<Option<JoinHandle<()>>>,
}

impl<S: PackageStore + 'static> JobRunner<S> {
    /// Creates a runner; nothing is scheduled until [`JobRunner::start`].
    pub fn new(
        detector: StaleShipmentDetector<S>,
        schedule: DailySchedule,
        log_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            detector,
            schedule,
            log_dir: log_dir.into(),
            last_report: RwLock::new(None),
            run_guard: Mutex::new(()),
            schedule_task: Mutex::new(None),
        }
    }

    /// Runs the check synchronously, waiting for any in-flight run first.
    ///
    /// Failures propagate to the caller after the log has been flushed.
    pub async fn run_now(&self) -> Result<StaleReport, JobError> {
        let _guard = self.run_guard.lock().await;
        self.execute().await
    }

    /// The report from the most recent successful run, if any.
    pub async fn last_report(&self) -> Option<StaleReport> {
        self.last_report.read().await.clone()
    }

    /// Starts the recurring schedule. Idempotent: returns false when the
    /// schedule loop is already running.
    pub async fn start(self: &Arc<Self>) -> bool {
        let mut slot = self.schedule_task.lock().await;
        if let Some(task) = slot.as_ref()
            && !task.is_finished()
        {
            return false;
        }

        let runner = Arc::clone(self);
        *slot = Some(tokio::spawn(async move { runner.schedule_loop().await }));
        tracing::info!(
            schedule = ?self.schedule,
            "stale packages schedule started"
        );
        true
    }

    /// Stops the recurring schedule. Idempotent: returns false when nothing
    /// was running. An in-flight run is aborted at its next await point;
    /// its transaction-free reads leave nothing to roll back.
    pub async fn stop(&self) -> bool {
        let mut slot = self.schedule_task.lock().await;
        match slot.take() {
            Some(task) if !task.is_finished() => {
                task.abort();
                tracing::info!("stale packages schedule stopped");
                true
            }
            _ => false,
        }
    }

    /// True while the schedule loop is active.
    pub async fn is_running(&self) -> bool {
        self.schedule_task
            .lock()
            .await
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    async fn schedule_loop(&self) {
        loop {
            let next = self.schedule.next_occurrence(Utc::now());
            let wait = (next - Utc::now()).to_std().unwrap_or_default();
            tracing::info!(next = %next, "next stale packages check scheduled");
            tokio::time::sleep(wait).await;

            // Skip-if-running: a slow run must not stack firings behind it.
            match self.run_guard.try_lock() {
                Ok(_guard) => {
                    if let Err(e) = self.execute().await {
                        tracing::error!(error = %e, "scheduled stale packages check failed");
                    }
                }
                Err(_) => {
                    tracing::warn!("previous stale packages check still running, skipping firing");
                    metrics::counter!("stale_check_skipped_total").increment(1);
                }
            }
        }
    }

    /// One check: detector pass plus narrative log. Caller holds the run
    /// guard. The log is flushed on both outcomes before returning.
    async fn execute(&self) -> Result<StaleReport, JobError> {
        let started = std::time::Instant::now();
        let mut log = RunLog::new(&self.log_dir, JOB_NAME);
        log.line("Starting stale packages check");

        let outcome = self.detector.run().await;
        match &outcome {
            Ok(report) => {
                log.line(format!("Threshold: {} days", report.threshold_days));
                log.line(format!(
                    "Not shipped or in transit > {} days: {} packages",
                    report.threshold_days, report.not_in_transit.count
                ));
                log.line(format!(
                    "Same-day returned (not delivered): {} packages",
                    report.same_day_returned.count
                ));
                log.line(format!(
                    "Total packages needing attention: {}",
                    report.total
                ));

                for package in &report.not_in_transit.packages {
                    log.line(format!(
                        "  - {} (status: {}, created: {})",
                        package.tracking_code, package.status, package.created_at
                    ));
                }
                for package in &report.same_day_returned.packages {
                    let shipped = package
                        .shipped_at
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "never".to_string());
                    log.line(format!(
                        "  - {} (created: {}, shipped: {shipped})",
                        package.tracking_code, package.created_at
                    ));
                }

                log.line(format!(
                    "Stale packages check completed in {}ms",
                    started.elapsed().as_millis()
                ));
            }
            Err(e) => {
                log.error(format!("Error checking stale packages: {e}"));
            }
        }

        // The log always reaches disk before the outcome propagates; a
        // failed write is operational noise, not a run failure.
        if let Err(e) = log.flush().await {
            tracing::error!(error = %e, path = %log.path().display(), "failed to write job log");
        }

        let report = outcome?;
        *self.last_report.write().await = Some(report.clone());
        Ok(report)
    }
}
