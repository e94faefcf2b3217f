//! The package state machine.
//!
//! Every operation runs as one atomic transaction against the injected
//! store: locked read, compare-and-swap status update, audit appends,
//! commit. A failure at any step aborts the transaction, so no partial
//! audit writes survive a failed transition.

use std::time::Duration;

use chrono::Utc;
use common::{ProductId, TrackingCode, UserId};
use store::{NewShipmentEvent, Package, PackageStore, PackageWithDetails, StoreError};

use crate::error::PackageError;
use crate::tracking::generate_tracking_code;
use crate::transition::Transition;

/// Regeneration attempts when a tracking code collides at insert time.
const MAX_CODE_ATTEMPTS: u32 = 3;

/// Automatic retries for transient store failures (deadlock, lock timeout).
const MAX_TRANSIENT_RETRIES: u32 = 2;

const BACKOFF_BASE_MS: u64 = 50;

/// Orchestrates legal lifecycle transitions over a [`PackageStore`].
pub struct PackageService<S> {
    store: S,
}

impl<S: PackageStore> PackageService<S> {
    /// Creates a service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Creates a new package in `pending`, reserving the product.
    ///
    /// One transaction: availability check under an exclusive product-row
    /// lock, package insert with a fresh tracking code, reservation, and a
    /// "Label Created" audit event. A tracking-code collision aborts the
    /// transaction and restarts it with a new code.
    #[tracing::instrument(skip(self))]
    pub async fn create_package(
        &self,
        product_id: ProductId,
        destination_address: &str,
        user_id: UserId,
        notes: Option<&str>,
    ) -> Result<Package, PackageError> {
        let mut code_attempts = 0;
        let mut transient_attempts = 0;

        loop {
            match self
                .create_package_once(product_id, destination_address, user_id, notes)
                .await
            {
                Err(PackageError::Store(StoreError::DuplicateTrackingCode))
                    if code_attempts + 1 < MAX_CODE_ATTEMPTS =>
                {
                    code_attempts += 1;
                    tracing::warn!(attempt = code_attempts, "tracking code collision, regenerating");
                }
                Err(PackageError::Store(StoreError::DuplicateTrackingCode)) => {
                    return Err(PackageError::TrackingCodeExhausted {
                        attempts: code_attempts + 1,
                    });
                }
                Err(e) if e.is_retryable() && transient_attempts < MAX_TRANSIENT_RETRIES => {
                    transient_attempts += 1;
                    backoff(transient_attempts).await;
                }
                other => return other,
            }
        }
    }

    async fn create_package_once(
        &self,
        product_id: ProductId,
        destination_address: &str,
        user_id: UserId,
        notes: Option<&str>,
    ) -> Result<Package, PackageError> {
        let mut tx = self.store.begin().await?;

        if !tx.find_available_product(product_id).await? {
            return Err(PackageError::ProductUnavailable { product_id });
        }

        let tracking_code = generate_tracking_code();
        let package = tx
            .insert_package(&tracking_code, user_id, destination_address)
            .await?;

        // The unique constraint on the reservation is the backstop behind
        // the locked availability check above.
        tx.bind_product(package.id, product_id, 1)
            .await
            .map_err(|e| match e {
                StoreError::ProductAlreadyBound => PackageError::ProductUnavailable { product_id },
                other => PackageError::Store(other),
            })?;

        tx.append_event(NewShipmentEvent {
            package_id: package.id,
            user_id: Some(user_id),
            label: common::EventLabel::LabelCreated,
            location: destination_address,
            notes: notes.unwrap_or("Package created and label printed"),
        })
        .await?;

        tx.commit().await?;

        metrics::counter!("packages_created_total").increment(1);
        tracing::info!(tracking_code = %package.tracking_code, "package created");
        Ok(package)
    }

    /// Applies one lifecycle edge to the package with the given tracking
    /// code.
    ///
    /// One transaction: locked read, conditional status update that only
    /// succeeds from the edge's required source state, timestamp stamping,
    /// audit appends. Two concurrent calls on the same package serialize on
    /// the row lock; the loser fails the compare-and-swap and observes
    /// [`PackageError::IllegalTransition`].
    #[tracing::instrument(skip(self))]
    pub async fn transition(
        &self,
        tracking_code: &TrackingCode,
        user_id: UserId,
        edge: Transition,
    ) -> Result<Package, PackageError> {
        let mut transient_attempts = 0;

        loop {
            match self.transition_once(tracking_code, user_id, edge).await {
                Err(e) if e.is_retryable() && transient_attempts < MAX_TRANSIENT_RETRIES => {
                    transient_attempts += 1;
                    backoff(transient_attempts).await;
                }
                other => return other,
            }
        }
    }

    async fn transition_once(
        &self,
        tracking_code: &TrackingCode,
        user_id: UserId,
        edge: Transition,
    ) -> Result<Package, PackageError> {
        let mut tx = self.store.begin().await?;

        let package = tx
            .find_package_for_update(tracking_code)
            .await?
            .ok_or_else(|| PackageError::PackageNotFound {
                tracking_code: tracking_code.clone(),
            })?;

        let now = Utc::now();
        let shipped_at = edge.sets_shipped_at().then_some(now);
        let delivered_at = edge.sets_delivered_at().then_some(now);

        let updated = tx
            .update_status_if_matches(
                package.id,
                edge.required_source(),
                edge.target(),
                shipped_at,
                delivered_at,
            )
            .await?
            .ok_or(PackageError::IllegalTransition {
                edge,
                required: edge.required_source(),
                actual: package.status,
            })?;

        for (label, notes) in edge.events() {
            tx.append_event(NewShipmentEvent {
                package_id: updated.id,
                user_id: Some(user_id),
                label: *label,
                location: &updated.destination_address,
                notes,
            })
            .await?;
        }

        tx.commit().await?;

        metrics::counter!("package_transitions_total", "edge" => edge.as_str()).increment(1);
        tracing::info!(tracking_code = %updated.tracking_code, edge = %edge, "package transitioned");
        Ok(updated)
    }

    /// `pending → ready_for_shipping`.
    pub async fn mark_ready_for_shipping(
        &self,
        tracking_code: &TrackingCode,
        user_id: UserId,
    ) -> Result<Package, PackageError> {
        self.transition(tracking_code, user_id, Transition::ReadyForShipping)
            .await
    }

    /// `ready_for_shipping → in_transit`.
    pub async fn mark_in_transit(
        &self,
        tracking_code: &TrackingCode,
        user_id: UserId,
    ) -> Result<Package, PackageError> {
        self.transition(tracking_code, user_id, Transition::InTransit)
            .await
    }

    /// `in_transit → delivered`.
    pub async fn mark_delivered(
        &self,
        tracking_code: &TrackingCode,
        user_id: UserId,
    ) -> Result<Package, PackageError> {
        self.transition(tracking_code, user_id, Transition::Delivered)
            .await
    }

    /// `in_transit → ready_for_shipping` (the backward edge).
    pub async fn return_to_warehouse(
        &self,
        tracking_code: &TrackingCode,
        user_id: UserId,
    ) -> Result<Package, PackageError> {
        self.transition(tracking_code, user_id, Transition::ReturnedToWarehouse)
            .await
    }

    /// Loads a package with its history and product list. No lock.
    #[tracing::instrument(skip(self))]
    pub async fn get_package(
        &self,
        tracking_code: &TrackingCode,
    ) -> Result<Option<PackageWithDetails>, PackageError> {
        Ok(self.store.find_package_with_details(tracking_code).await?)
    }
}

async fn backoff(attempt: u32) {
    let delay = BACKOFF_BASE_MS * 2u64.pow(attempt - 1);
    tokio::time::sleep(Duration::from_millis(delay)).await;
}
