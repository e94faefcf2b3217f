use chrono::{Duration, Utc};
use store::{PackageStore, Result};

use crate::report::{StaleCategory, StaleReport};

/// Default day threshold for the not-in-transit classification.
pub const DEFAULT_THRESHOLD_DAYS: u32 = 3;

/// Classifies packages into risk categories using temporal predicates over
/// the audit trail.
///
/// Two independent classifications in one pass:
/// - **not-in-transit**: stuck before shipping for more than the threshold;
/// - **same-day-returned**: shipped and bounced back to the warehouse on the
///   same calendar date, never delivered since.
pub struct StaleShipmentDetector<S> {
    store: S,
    threshold_days: u32,
}

impl<S: PackageStore> StaleShipmentDetector<S> {
    /// Creates a detector with the given day threshold.
    pub fn new(store: S, threshold_days: u32) -> Self {
        Self {
            store,
            threshold_days,
        }
    }

    /// Creates a detector with the default threshold.
    pub fn with_default_threshold(store: S) -> Self {
        Self::new(store, DEFAULT_THRESHOLD_DAYS)
    }

    /// Returns the configured threshold in days.
    pub fn threshold_days(&self) -> u32 {
        self.threshold_days
    }

    /// Runs both classifications and assembles the combined report.
    ///
    /// Any read failure is fatal to the run; the caller decides whether to
    /// propagate (manual trigger) or log and wait for the next firing.
    #[tracing::instrument(skip(self))]
    pub async fn run(&self) -> Result<StaleReport> {
        let started = std::time::Instant::now();
        let generated_at = Utc::now();
        let cutoff = generated_at - Duration::days(i64::from(self.threshold_days));

        let not_in_transit = self.store.find_packages_not_in_transit(cutoff).await?;
        let same_day_returned = self.store.find_same_day_returned().await?;

        metrics::counter!("stale_check_runs_total").increment(1);
        metrics::histogram!("stale_check_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        tracing::info!(
            not_in_transit = not_in_transit.len(),
            same_day_returned = same_day_returned.len(),
            threshold_days = self.threshold_days,
            "stale shipment scan finished"
        );

        Ok(StaleReport::new(
            StaleCategory::new(
                format!(
                    "Not shipped or in transit for more than {} days",
                    self.threshold_days
                ),
                not_in_transit,
            ),
            StaleCategory::new("Returned same day and still not delivered", same_day_returned),
            self.threshold_days,
            generated_at,
        ))
    }
}
