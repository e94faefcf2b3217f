//! State machine integration tests against the in-memory store.

use std::sync::Arc;

use common::{PackageStatus, ProductId, TrackingCode, UserId};
use domain::{PackageError, PackageService, Transition};
use store::InMemoryPackageStore;

const USER: UserId = UserId::new(1);

fn make() -> (PackageService<InMemoryPackageStore>, InMemoryPackageStore) {
    let store = InMemoryPackageStore::new();
    (PackageService::new(store.clone()), store)
}

async fn seeded(product_id: i64) -> (PackageService<InMemoryPackageStore>, InMemoryPackageStore) {
    let (service, store) = make();
    store
        .seed_product(ProductId::new(product_id), "Widget", &format!("SKU-{product_id}"))
        .await;
    (service, store)
}

#[tokio::test]
async fn create_returns_pending_package_with_label_created_event() {
    let (service, store) = seeded(1).await;

    let package = service
        .create_package(ProductId::new(1), "123 Main St", USER, None)
        .await
        .unwrap();

    assert_eq!(package.status, PackageStatus::Pending);
    assert!(package.shipped_at.is_none());
    assert!(package.delivered_at.is_none());
    assert!(package.tracking_code.as_str().starts_with("PKG-"));

    let events = store.events_for(package.id).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].label, "Label Created");
    assert_eq!(events[0].location, "123 Main St");
    assert_eq!(events[0].notes, "Package created and label printed");
}

#[tokio::test]
async fn create_with_notes_puts_them_on_the_event() {
    let (service, store) = seeded(1).await;

    let package = service
        .create_package(ProductId::new(1), "123 Main St", USER, Some("fragile"))
        .await
        .unwrap();

    let events = store.events_for(package.id).await;
    assert_eq!(events[0].notes, "fragile");
}

#[tokio::test]
async fn tracking_codes_are_unique_across_creates() {
    let (service, store) = seeded(1).await;
    store.seed_product(ProductId::new(2), "Gadget", "SKU-2").await;

    let a = service
        .create_package(ProductId::new(1), "a", USER, None)
        .await
        .unwrap();
    let b = service
        .create_package(ProductId::new(2), "b", USER, None)
        .await
        .unwrap();

    assert_ne!(a.tracking_code, b.tracking_code);
}

#[tokio::test]
async fn second_create_for_same_product_is_rejected() {
    let (service, _store) = seeded(1).await;

    service
        .create_package(ProductId::new(1), "123 Main St", USER, None)
        .await
        .unwrap();

    let err = service
        .create_package(ProductId::new(1), "456 Oak Ave", USER, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PackageError::ProductUnavailable { product_id } if product_id == ProductId::new(1)
    ));
}

#[tokio::test]
async fn create_for_missing_product_is_rejected() {
    let (service, _store) = make();

    let err = service
        .create_package(ProductId::new(99), "123 Main St", USER, None)
        .await
        .unwrap_err();
    assert!(matches!(err, PackageError::ProductUnavailable { .. }));
}

#[tokio::test]
async fn rejected_create_leaves_no_audit_events() {
    let (service, store) = seeded(1).await;

    service
        .create_package(ProductId::new(1), "a", USER, None)
        .await
        .unwrap();
    let before = store.event_count().await;

    let _ = service
        .create_package(ProductId::new(1), "b", USER, None)
        .await
        .unwrap_err();

    assert_eq!(store.event_count().await, before);
}

#[tokio::test]
async fn full_round_trip_with_return_is_legal() {
    let (service, store) = seeded(1).await;

    let package = service
        .create_package(ProductId::new(1), "123 Main St", USER, None)
        .await
        .unwrap();
    let code = package.tracking_code.clone();

    let package = service.mark_ready_for_shipping(&code, USER).await.unwrap();
    assert_eq!(package.status, PackageStatus::ReadyForShipping);
    assert!(package.shipped_at.is_none());

    let package = service.mark_in_transit(&code, USER).await.unwrap();
    assert_eq!(package.status, PackageStatus::InTransit);
    let first_shipped = package.shipped_at.expect("shipped_at set on transit");

    let package = service.return_to_warehouse(&code, USER).await.unwrap();
    assert_eq!(package.status, PackageStatus::ReadyForShipping);
    assert_eq!(package.shipped_at, Some(first_shipped), "return keeps shipped_at");

    let package = service.mark_in_transit(&code, USER).await.unwrap();
    assert_eq!(
        package.shipped_at,
        Some(first_shipped),
        "re-entering transit keeps the first shipped_at"
    );

    let package = service.mark_delivered(&code, USER).await.unwrap();
    assert_eq!(package.status, PackageStatus::Delivered);
    assert!(package.delivered_at.is_some());

    let labels: Vec<String> = store
        .events_for(package.id)
        .await
        .into_iter()
        .map(|e| e.label)
        .collect();
    assert_eq!(
        labels,
        vec![
            "Label Created",
            "Package Ready",
            "Picked Up",
            "In Transit",
            "Returned to Warehouse",
            "Picked Up",
            "In Transit",
            "Delivered",
        ]
    );
}

#[tokio::test]
async fn out_of_order_transition_is_illegal() {
    let (service, _store) = seeded(1).await;

    let package = service
        .create_package(ProductId::new(1), "123 Main St", USER, None)
        .await
        .unwrap();

    let err = service
        .mark_delivered(&package.tracking_code, USER)
        .await
        .unwrap_err();
    match err {
        PackageError::IllegalTransition {
            edge,
            required,
            actual,
        } => {
            assert_eq!(edge, Transition::Delivered);
            assert_eq!(required, PackageStatus::InTransit);
            assert_eq!(actual, PackageStatus::Pending);
        }
        other => panic!("expected IllegalTransition, got {other:?}"),
    }
}

#[tokio::test]
async fn delivered_is_terminal() {
    let (service, _store) = seeded(1).await;

    let package = service
        .create_package(ProductId::new(1), "123 Main St", USER, None)
        .await
        .unwrap();
    let code = package.tracking_code.clone();

    service.mark_ready_for_shipping(&code, USER).await.unwrap();
    service.mark_in_transit(&code, USER).await.unwrap();
    service.mark_delivered(&code, USER).await.unwrap();

    for edge in [
        Transition::ReadyForShipping,
        Transition::InTransit,
        Transition::Delivered,
        Transition::ReturnedToWarehouse,
    ] {
        let err = service.transition(&code, USER, edge).await.unwrap_err();
        assert!(matches!(err, PackageError::IllegalTransition { .. }));
    }
}

#[tokio::test]
async fn unknown_tracking_code_is_not_found() {
    let (service, _store) = seeded(1).await;

    let err = service
        .mark_ready_for_shipping(&TrackingCode::new("PKG-0-NOWHERE"), USER)
        .await
        .unwrap_err();
    assert!(matches!(err, PackageError::PackageNotFound { .. }));
}

#[tokio::test]
async fn failed_transition_appends_no_events() {
    let (service, store) = seeded(1).await;

    let package = service
        .create_package(ProductId::new(1), "123 Main St", USER, None)
        .await
        .unwrap();
    let before = store.event_count().await;

    let _ = service
        .mark_delivered(&package.tracking_code, USER)
        .await
        .unwrap_err();

    assert_eq!(store.event_count().await, before);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_transitions_have_exactly_one_winner() {
    let (service, _store) = seeded(1).await;
    let service = Arc::new(service);

    let package = service
        .create_package(ProductId::new(1), "123 Main St", USER, None)
        .await
        .unwrap();
    let code = package.tracking_code.clone();

    service.mark_ready_for_shipping(&code, USER).await.unwrap();
    service.mark_in_transit(&code, USER).await.unwrap();

    // Both edges start from in_transit; the row lock serializes them and the
    // compare-and-swap fails the loser.
    let deliver = {
        let service = service.clone();
        let code = code.clone();
        tokio::spawn(async move { service.mark_delivered(&code, USER).await })
    };
    let bounce = {
        let service = service.clone();
        let code = code.clone();
        tokio::spawn(async move { service.return_to_warehouse(&code, USER).await })
    };

    let results = [deliver.await.unwrap(), bounce.await.unwrap()];
    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "exactly one concurrent transition must win");
    let loser = results.iter().find(|r| r.is_err()).unwrap();
    assert!(matches!(
        loser.as_ref().unwrap_err(),
        PackageError::IllegalTransition { .. }
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_cannot_double_reserve_a_product() {
    let (service, _store) = seeded(1).await;
    let service = Arc::new(service);

    let a = {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .create_package(ProductId::new(1), "a", USER, None)
                .await
        })
    };
    let b = {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .create_package(ProductId::new(1), "b", USER, None)
                .await
        })
    };

    let results = [a.await.unwrap(), b.await.unwrap()];
    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "a product can be reserved by exactly one package");
}

#[tokio::test]
async fn get_package_returns_details_or_none() {
    let (service, _store) = seeded(1).await;

    let package = service
        .create_package(ProductId::new(1), "123 Main St", USER, None)
        .await
        .unwrap();

    let details = service
        .get_package(&package.tracking_code)
        .await
        .unwrap()
        .expect("package exists");
    assert_eq!(details.package.id, package.id);
    assert_eq!(details.products.len(), 1);
    assert_eq!(details.products[0].product_id, ProductId::new(1));
    assert_eq!(details.history.len(), 1);

    let missing = service
        .get_package(&TrackingCode::new("PKG-0-NOWHERE"))
        .await
        .unwrap();
    assert!(missing.is_none());
}
