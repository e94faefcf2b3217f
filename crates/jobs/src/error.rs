use store::StoreError;
use thiserror::Error;

/// Errors from a job run.
#[derive(Debug, Error)]
pub enum JobError {
    /// The detector's read pass failed. Fatal to this run only; the next
    /// scheduled firing starts fresh.
    #[error("stale shipment scan failed: {0}")]
    Scan(#[from] StoreError),
}
