//! Row types for packages, reservations, and the shipment audit trail.

use chrono::{DateTime, Utc};
use common::{EventLabel, PackageId, PackageStatus, ProductId, TrackingCode, UserId};
use serde::{Deserialize, Serialize};

/// One physical shipment.
///
/// Invariants maintained by the state machine:
/// - `shipped_at` is set exactly when the package has entered `in_transit`
///   at least once, and survives a later return to warehouse;
/// - `delivered_at` is set exactly when status is `delivered`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub id: PackageId,
    pub tracking_code: TrackingCode,
    pub user_id: UserId,
    pub destination_address: String,
    pub status: PackageStatus,
    pub created_at: DateTime<Utc>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

/// Product reservation: binds a product to the one package that ships it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageProduct {
    pub package_id: PackageId,
    pub product_id: ProductId,
    pub quantity: i32,
}

/// Immutable audit record of one lifecycle step.
///
/// The label is stored as text and is deliberately looser than the status
/// enum; a single transition may append more than one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentEvent {
    pub id: i64,
    pub package_id: PackageId,
    pub user_id: Option<UserId>,
    pub label: String,
    pub location: String,
    pub notes: String,
    pub event_timestamp: DateTime<Utc>,
}

/// A package together with its full history (newest first) and product list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageWithDetails {
    #[serde(flatten)]
    pub package: Package,
    pub history: Vec<ShipmentEvent>,
    pub products: Vec<PackageProduct>,
}

/// Parameters for appending one audit event inside a transaction.
#[derive(Debug, Clone, Copy)]
pub struct NewShipmentEvent<'a> {
    pub package_id: PackageId,
    pub user_id: Option<UserId>,
    pub label: EventLabel,
    pub location: &'a str,
    pub notes: &'a str,
}
