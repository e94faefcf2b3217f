use thiserror::Error;

/// Errors from the storage layer.
///
/// [`StoreError::Transient`] is the only class eligible for automatic retry;
/// everything else is deterministic and must surface to the caller.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Lock timeout, deadlock abort, or connectivity loss. Retryable.
    #[error("transient store failure: {0}")]
    Transient(#[source] sqlx::Error),

    /// The generated tracking code already exists. The creating transaction
    /// is aborted; the caller restarts it with a fresh code.
    #[error("tracking code already exists")]
    DuplicateTrackingCode,

    /// The product is already bound to another package. Backstop for the
    /// locked availability check, raised by the unique constraint.
    #[error("product is already bound to a package")]
    ProductAlreadyBound,

    /// A status value in storage is outside the closed status set.
    #[error("unknown package status in storage: {0:?}")]
    CorruptStatus(String),

    /// Any other database error. Not retryable.
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl StoreError {
    /// Returns true if the operation may be retried with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

// PostgreSQL SQLSTATE codes for aborts worth retrying.
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";
const LOCK_NOT_AVAILABLE: &str = "55P03";

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::PoolClosed => {
                StoreError::Transient(e)
            }
            sqlx::Error::Database(db) => {
                if let Some(code) = db.code()
                    && matches!(
                        code.as_ref(),
                        SERIALIZATION_FAILURE | DEADLOCK_DETECTED | LOCK_NOT_AVAILABLE
                    )
                {
                    tracing::warn!(code = %code, "transient database abort");
                    return StoreError::Transient(e);
                }
                match db.constraint() {
                    Some("packages_tracking_code_key") => StoreError::DuplicateTrackingCode,
                    Some("package_products_product_id_key") => StoreError::ProductAlreadyBound,
                    _ => StoreError::Database(e),
                }
            }
            _ => StoreError::Database(e),
        }
    }
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;
