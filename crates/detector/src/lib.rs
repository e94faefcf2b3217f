//! Stale-shipment detector: read-only batch analysis over packages and
//! their audit trail, classifying stalled and anomalous shipments.
//!
//! The detector takes no locks and may observe an in-flight transition's
//! pre- or post-state; it is a diagnostic, not a consistency-critical read.

mod detector;
mod report;

pub use detector::{DEFAULT_THRESHOLD_DAYS, StaleShipmentDetector};
pub use report::{StaleCategory, StaleReport};
