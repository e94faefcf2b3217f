//! State machine error taxonomy.

use common::{PackageStatus, ProductId, TrackingCode};
use store::StoreError;
use thiserror::Error;

use crate::Transition;

/// Errors from package lifecycle operations.
///
/// Everything except a transient store failure is deterministic: retrying
/// without changing the world will fail the same way, so callers must not
/// retry blindly.
#[derive(Debug, Error)]
pub enum PackageError {
    /// The product does not exist or is already reserved by a package.
    #[error("product {product_id} is not available")]
    ProductUnavailable { product_id: ProductId },

    /// No package carries the given tracking code.
    #[error("package not found: {tracking_code}")]
    PackageNotFound { tracking_code: TrackingCode },

    /// The compare-and-swap precondition failed: the package is not in the
    /// source state this edge requires.
    #[error(
        "cannot apply {edge} to package in status {actual}: requires status {required}"
    )]
    IllegalTransition {
        edge: Transition,
        required: PackageStatus,
        actual: PackageStatus,
    },

    /// Tracking-code generation kept colliding. Practically unreachable.
    #[error("could not generate a unique tracking code after {attempts} attempts")]
    TrackingCodeExhausted { attempts: u32 },

    /// Storage-layer failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PackageError {
    /// True for transient store failures, the only retryable class.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PackageError::Store(e) if e.is_transient())
    }
}
