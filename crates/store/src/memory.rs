use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{EventLabel, PackageId, PackageStatus, ProductId, TrackingCode, UserId};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    NewShipmentEvent, Package, PackageProduct, PackageStore, PackageTx, PackageWithDetails, Result,
    ShipmentEvent, StoreError,
};

#[derive(Debug, Clone)]
struct Product {
    id: ProductId,
    #[allow(dead_code)]
    name: String,
    #[allow(dead_code)]
    sku: String,
}

#[derive(Debug, Clone, Default)]
struct State {
    packages: Vec<Package>,
    products: Vec<Product>,
    bindings: Vec<PackageProduct>,
    events: Vec<ShipmentEvent>,
    next_package_id: i64,
    next_event_id: i64,
}

impl State {
    fn next_package_id(&mut self) -> PackageId {
        self.next_package_id += 1;
        PackageId::new(self.next_package_id)
    }

    fn next_event_id(&mut self) -> i64 {
        self.next_event_id += 1;
        self.next_event_id
    }
}

/// In-memory package repository for tests and local development.
///
/// Semantics mirror the PostgreSQL adapter. Transactions take the single
/// state lock for their whole lifetime, which serializes them the way row
/// locks do in production (coarser, but observationally equivalent for the
/// state machine: concurrent transitions on one package still resolve to
/// exactly one winner). Changes are staged on a copy and written back on
/// commit; dropping an uncommitted transaction rolls back.
#[derive(Clone, Default)]
pub struct InMemoryPackageStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryPackageStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a product that packages can reserve.
    pub async fn seed_product(&self, product_id: ProductId, name: &str, sku: &str) {
        let mut state = self.state.lock().await;
        state.products.push(Product {
            id: product_id,
            name: name.to_string(),
            sku: sku.to_string(),
        });
    }

    /// Rewrites a package's creation timestamp. Test helper for exercising
    /// age-based classification.
    pub async fn set_created_at(&self, tracking_code: &TrackingCode, at: DateTime<Utc>) -> bool {
        let mut state = self.state.lock().await;
        match state
            .packages
            .iter_mut()
            .find(|p| &p.tracking_code == tracking_code)
        {
            Some(p) => {
                p.created_at = at;
                true
            }
            None => false,
        }
    }

    /// Rewrites the timestamps of all events with `label` for one package.
    /// Test helper; returns how many events were touched.
    pub async fn set_event_timestamps(
        &self,
        package_id: PackageId,
        label: EventLabel,
        at: DateTime<Utc>,
    ) -> usize {
        let mut state = self.state.lock().await;
        let mut touched = 0;
        for event in state
            .events
            .iter_mut()
            .filter(|e| e.package_id == package_id && e.label == label.as_str())
        {
            event.event_timestamp = at;
            touched += 1;
        }
        touched
    }

    /// Returns all events for a package in analysis order (oldest first).
    pub async fn events_for(&self, package_id: PackageId) -> Vec<ShipmentEvent> {
        let state = self.state.lock().await;
        let mut events: Vec<_> = state
            .events
            .iter()
            .filter(|e| e.package_id == package_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| (e.event_timestamp, e.id));
        events
    }

    /// Returns the total number of audit events stored.
    pub async fn event_count(&self) -> usize {
        self.state.lock().await.events.len()
    }

    /// Clears all rows.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        *state = State::default();
    }
}

#[async_trait]
impl PackageStore for InMemoryPackageStore {
    async fn begin(&self) -> Result<Box<dyn PackageTx>> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(InMemoryTx { guard, staged }))
    }

    async fn find_package(&self, tracking_code: &TrackingCode) -> Result<Option<Package>> {
        let state = self.state.lock().await;
        Ok(state
            .packages
            .iter()
            .find(|p| &p.tracking_code == tracking_code)
            .cloned())
    }

    async fn find_package_with_details(
        &self,
        tracking_code: &TrackingCode,
    ) -> Result<Option<PackageWithDetails>> {
        let state = self.state.lock().await;
        let Some(package) = state
            .packages
            .iter()
            .find(|p| &p.tracking_code == tracking_code)
            .cloned()
        else {
            return Ok(None);
        };

        let mut history: Vec<_> = state
            .events
            .iter()
            .filter(|e| e.package_id == package.id)
            .cloned()
            .collect();
        // Newest first for display.
        history.sort_by(|a, b| (b.event_timestamp, b.id).cmp(&(a.event_timestamp, a.id)));

        let products = state
            .bindings
            .iter()
            .filter(|b| b.package_id == package.id)
            .cloned()
            .collect();

        Ok(Some(PackageWithDetails {
            package,
            history,
            products,
        }))
    }

    async fn find_packages_not_in_transit(&self, cutoff: DateTime<Utc>) -> Result<Vec<Package>> {
        let state = self.state.lock().await;

        let latest_event = |package_id: PackageId, label: EventLabel| {
            state
                .events
                .iter()
                .filter(|e| e.package_id == package_id && e.label == label.as_str())
                .map(|e| e.event_timestamp)
                .max()
        };

        let mut stale: Vec<_> = state
            .packages
            .iter()
            .filter(|p| match p.status {
                PackageStatus::Pending => p.created_at < cutoff,
                PackageStatus::ReadyForShipping => {
                    let reference = latest_event(p.id, EventLabel::ReturnedToWarehouse)
                        .or_else(|| latest_event(p.id, EventLabel::PackageReady))
                        .unwrap_or(p.created_at);
                    reference < cutoff
                }
                _ => false,
            })
            .cloned()
            .collect();

        stale.sort_by_key(|p| p.created_at);
        Ok(stale)
    }

    async fn find_same_day_returned(&self) -> Result<Vec<Package>> {
        let state = self.state.lock().await;

        let mut bounced: Vec<_> = state
            .packages
            .iter()
            .filter(|p| {
                p.status == PackageStatus::ReadyForShipping
                    && p.shipped_at.is_some()
                    && p.delivered_at.is_none()
            })
            .filter(|p| {
                let transits: Vec<_> = state
                    .events
                    .iter()
                    .filter(|e| {
                        e.package_id == p.id && e.label == EventLabel::InTransit.as_str()
                    })
                    .collect();
                state
                    .events
                    .iter()
                    .filter(|e| {
                        e.package_id == p.id
                            && e.label == EventLabel::ReturnedToWarehouse.as_str()
                    })
                    .any(|returned| {
                        transits.iter().any(|transit| {
                            // Calendar dates, not full timestamps.
                            transit.event_timestamp.date_naive()
                                == returned.event_timestamp.date_naive()
                        })
                    })
            })
            .cloned()
            .collect();

        bounced.sort_by_key(|p| p.created_at);
        Ok(bounced)
    }
}

struct InMemoryTx {
    guard: OwnedMutexGuard<State>,
    staged: State,
}

#[async_trait]
impl PackageTx for InMemoryTx {
    async fn find_available_product(&mut self, product_id: ProductId) -> Result<bool> {
        let exists = self.staged.products.iter().any(|p| p.id == product_id);
        let reserved = self
            .staged
            .bindings
            .iter()
            .any(|b| b.product_id == product_id);
        Ok(exists && !reserved)
    }

    async fn insert_package(
        &mut self,
        tracking_code: &TrackingCode,
        user_id: UserId,
        destination_address: &str,
    ) -> Result<Package> {
        if self
            .staged
            .packages
            .iter()
            .any(|p| &p.tracking_code == tracking_code)
        {
            return Err(StoreError::DuplicateTrackingCode);
        }

        let package = Package {
            id: self.staged.next_package_id(),
            tracking_code: tracking_code.clone(),
            user_id,
            destination_address: destination_address.to_string(),
            status: PackageStatus::Pending,
            created_at: Utc::now(),
            shipped_at: None,
            delivered_at: None,
        };
        self.staged.packages.push(package.clone());
        Ok(package)
    }

    async fn find_package_for_update(
        &mut self,
        tracking_code: &TrackingCode,
    ) -> Result<Option<Package>> {
        Ok(self
            .staged
            .packages
            .iter()
            .find(|p| &p.tracking_code == tracking_code)
            .cloned())
    }

    async fn update_status_if_matches(
        &mut self,
        package_id: PackageId,
        expected: PackageStatus,
        new_status: PackageStatus,
        shipped_at: Option<DateTime<Utc>>,
        delivered_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Package>> {
        let Some(package) = self
            .staged
            .packages
            .iter_mut()
            .find(|p| p.id == package_id && p.status == expected)
        else {
            return Ok(None);
        };

        package.status = new_status;
        // First write wins, matching COALESCE in the SQL adapter.
        if package.shipped_at.is_none() {
            package.shipped_at = shipped_at;
        }
        if package.delivered_at.is_none() {
            package.delivered_at = delivered_at;
        }
        Ok(Some(package.clone()))
    }

    async fn bind_product(
        &mut self,
        package_id: PackageId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<()> {
        if self
            .staged
            .bindings
            .iter()
            .any(|b| b.product_id == product_id)
        {
            return Err(StoreError::ProductAlreadyBound);
        }

        self.staged.bindings.push(PackageProduct {
            package_id,
            product_id,
            quantity,
        });
        Ok(())
    }

    async fn append_event(&mut self, event: NewShipmentEvent<'_>) -> Result<()> {
        let id = self.staged.next_event_id();
        self.staged.events.push(ShipmentEvent {
            id,
            package_id: event.package_id,
            user_id: event.user_id,
            label: event.label.as_str().to_string(),
            location: event.location.to_string(),
            notes: event.notes.to_string(),
            event_timestamp: Utc::now(),
        });
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<()> {
        *self.guard = self.staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn uncommitted_transaction_rolls_back() {
        let store = InMemoryPackageStore::new();
        let code = TrackingCode::new("PKG-1-ROLLBACK");

        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_package(&code, UserId::new(1), "123 Main St")
                .await
                .unwrap();
            // Dropped without commit.
        }

        assert!(store.find_package(&code).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn commit_makes_changes_visible() {
        let store = InMemoryPackageStore::new();
        let code = TrackingCode::new("PKG-1-COMMIT");

        let mut tx = store.begin().await.unwrap();
        tx.insert_package(&code, UserId::new(1), "123 Main St")
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let package = store.find_package(&code).await.unwrap().unwrap();
        assert_eq!(package.status, PackageStatus::Pending);
        assert!(package.shipped_at.is_none());
        assert!(package.delivered_at.is_none());
    }

    #[tokio::test]
    async fn duplicate_tracking_code_is_rejected() {
        let store = InMemoryPackageStore::new();
        let code = TrackingCode::new("PKG-1-DUP");

        let mut tx = store.begin().await.unwrap();
        tx.insert_package(&code, UserId::new(1), "a").await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let err = tx
            .insert_package(&code, UserId::new(2), "b")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateTrackingCode));
    }

    #[tokio::test]
    async fn second_binding_of_same_product_is_rejected() {
        let store = InMemoryPackageStore::new();
        store.seed_product(ProductId::new(1), "Widget", "SKU-1").await;

        let mut tx = store.begin().await.unwrap();
        let a = tx
            .insert_package(&TrackingCode::new("PKG-A"), UserId::new(1), "a")
            .await
            .unwrap();
        tx.bind_product(a.id, ProductId::new(1), 1).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let b = tx
            .insert_package(&TrackingCode::new("PKG-B"), UserId::new(1), "b")
            .await
            .unwrap();
        let err = tx.bind_product(b.id, ProductId::new(1), 1).await.unwrap_err();
        assert!(matches!(err, StoreError::ProductAlreadyBound));
    }

    #[tokio::test]
    async fn cas_fails_when_status_does_not_match() {
        let store = InMemoryPackageStore::new();
        let code = TrackingCode::new("PKG-CAS");

        let mut tx = store.begin().await.unwrap();
        let package = tx.insert_package(&code, UserId::new(1), "a").await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let updated = tx
            .update_status_if_matches(
                package.id,
                PackageStatus::InTransit,
                PackageStatus::Delivered,
                None,
                Some(Utc::now()),
            )
            .await
            .unwrap();
        assert!(updated.is_none());
    }

    #[tokio::test]
    async fn shipped_at_survives_a_second_stamp_attempt() {
        let store = InMemoryPackageStore::new();
        let code = TrackingCode::new("PKG-STAMP");

        let mut tx = store.begin().await.unwrap();
        let package = tx.insert_package(&code, UserId::new(1), "a").await.unwrap();
        tx.commit().await.unwrap();

        let first_ship = Utc::now();
        let mut tx = store.begin().await.unwrap();
        tx.update_status_if_matches(
            package.id,
            PackageStatus::Pending,
            PackageStatus::InTransit,
            Some(first_ship),
            None,
        )
        .await
        .unwrap()
        .unwrap();
        let updated = tx
            .update_status_if_matches(
                package.id,
                PackageStatus::InTransit,
                PackageStatus::ReadyForShipping,
                Some(Utc::now()),
                None,
            )
            .await
            .unwrap()
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(updated.shipped_at, Some(first_ship));
    }

    #[tokio::test]
    async fn history_is_returned_newest_first() {
        let store = InMemoryPackageStore::new();
        let code = TrackingCode::new("PKG-HIST");

        let mut tx = store.begin().await.unwrap();
        let package = tx.insert_package(&code, UserId::new(1), "a").await.unwrap();
        for label in [
            EventLabel::LabelCreated,
            EventLabel::PackageReady,
            EventLabel::PickedUp,
        ] {
            tx.append_event(NewShipmentEvent {
                package_id: package.id,
                user_id: Some(UserId::new(1)),
                label,
                location: "a",
                notes: "n",
            })
            .await
            .unwrap();
        }
        tx.commit().await.unwrap();

        let details = store
            .find_package_with_details(&code)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(details.history.len(), 3);
        assert_eq!(details.history[0].label, "Picked Up");
        assert_eq!(details.history[2].label, "Label Created");
    }
}
