use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{PackageId, PackageStatus, ProductId, TrackingCode, UserId};

use crate::{NewShipmentEvent, Package, PackageWithDetails, Result};

/// Operations available inside an active transaction.
///
/// Obtained from [`PackageStore::begin`]. All mutations performed through a
/// transaction become visible only after [`PackageTx::commit`]; dropping an
/// uncommitted transaction rolls everything back, so a failed transition
/// never leaves partial audit writes behind.
#[async_trait]
pub trait PackageTx: Send {
    /// Checks that the product exists and is not reserved by any package.
    ///
    /// Takes an exclusive lock on the product row as a side effect, so two
    /// concurrent creations of the same product serialize here.
    async fn find_available_product(&mut self, product_id: ProductId) -> Result<bool>;

    /// Inserts a new package row in `pending` with null lifecycle timestamps.
    ///
    /// Fails with [`crate::StoreError::DuplicateTrackingCode`] when the code
    /// is already taken.
    async fn insert_package(
        &mut self,
        tracking_code: &TrackingCode,
        user_id: UserId,
        destination_address: &str,
    ) -> Result<Package>;

    /// Loads a package by tracking code under an exclusive row lock.
    async fn find_package_for_update(
        &mut self,
        tracking_code: &TrackingCode,
    ) -> Result<Option<Package>>;

    /// Compare-and-swap on the status column.
    ///
    /// Updates the row only if its current status equals `expected`; returns
    /// `None` when the precondition fails. `shipped_at` / `delivered_at` are
    /// stamped only if currently null, so a first entry into transit sticks
    /// across a later return to warehouse.
    async fn update_status_if_matches(
        &mut self,
        package_id: PackageId,
        expected: PackageStatus,
        new_status: PackageStatus,
        shipped_at: Option<DateTime<Utc>>,
        delivered_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Package>>;

    /// Binds a product to a package.
    async fn bind_product(
        &mut self,
        package_id: PackageId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<()>;

    /// Appends one immutable audit event.
    async fn append_event(&mut self, event: NewShipmentEvent<'_>) -> Result<()>;

    /// Commits the transaction, making all staged changes visible.
    async fn commit(self: Box<Self>) -> Result<()>;
}

/// The package repository contract.
///
/// Write paths go through [`PackageStore::begin`]; the remaining methods are
/// lock-free reads used by the query side and the stale-shipment detector.
/// Reads may observe a slightly stale snapshot relative to in-flight
/// transactions, which is acceptable for diagnostics.
#[async_trait]
pub trait PackageStore: Send + Sync {
    /// Starts a new transaction.
    async fn begin(&self) -> Result<Box<dyn PackageTx>>;

    /// Loads a package row by tracking code. No lock.
    async fn find_package(&self, tracking_code: &TrackingCode) -> Result<Option<Package>>;

    /// Loads a package with its full audit history (newest event first) and
    /// bound products. No lock.
    async fn find_package_with_details(
        &self,
        tracking_code: &TrackingCode,
    ) -> Result<Option<PackageWithDetails>>;

    /// Packages stalled before shipping: `pending` created before `cutoff`,
    /// or `ready_for_shipping` whose reference timestamp (latest
    /// "Returned to Warehouse" event, else latest "Package Ready" event,
    /// else creation time) is before `cutoff`. Ordered by creation time.
    async fn find_packages_not_in_transit(&self, cutoff: DateTime<Utc>) -> Result<Vec<Package>>;

    /// Packages back in `ready_for_shipping` that shipped and bounced back
    /// on the same calendar date and were never delivered. Ordered by
    /// creation time.
    async fn find_same_day_returned(&self) -> Result<Vec<Package>>;
}
