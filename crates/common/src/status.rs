//! Package lifecycle status and audit-event labels.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a package.
///
/// Legal transitions:
/// ```text
/// Pending ──► ReadyForShipping ──► InTransit ──► Delivered
///                     ▲                │
///                     └────────────────┘  (returned to warehouse)
/// ```
///
/// `Pending` is the only initial state, `Delivered` the only terminal one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PackageStatus {
    #[default]
    Pending,
    ReadyForShipping,
    InTransit,
    Delivered,
}

impl PackageStatus {
    /// Returns the status as its storage/wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageStatus::Pending => "pending",
            PackageStatus::ReadyForShipping => "ready_for_shipping",
            PackageStatus::InTransit => "in_transit",
            PackageStatus::Delivered => "delivered",
        }
    }

    /// Parses the storage representation back into a status.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PackageStatus::Pending),
            "ready_for_shipping" => Some(PackageStatus::ReadyForShipping),
            "in_transit" => Some(PackageStatus::InTransit),
            "delivered" => Some(PackageStatus::Delivered),
            _ => None,
        }
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PackageStatus::Delivered)
    }
}

impl std::fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Label attached to a shipment audit event.
///
/// Stored as free text, deliberately not the same vocabulary as
/// [`PackageStatus`]: one transition may emit several labels (entering
/// transit emits both `PickedUp` and `InTransit`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventLabel {
    LabelCreated,
    PackageReady,
    PickedUp,
    InTransit,
    Delivered,
    ReturnedToWarehouse,
}

impl EventLabel {
    /// The human-readable text stored in the audit trail.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventLabel::LabelCreated => "Label Created",
            EventLabel::PackageReady => "Package Ready",
            EventLabel::PickedUp => "Picked Up",
            EventLabel::InTransit => "In Transit",
            EventLabel::Delivered => "Delivered",
            EventLabel::ReturnedToWarehouse => "Returned to Warehouse",
        }
    }
}

impl std::fmt::Display for EventLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrips_through_storage_representation() {
        for status in [
            PackageStatus::Pending,
            PackageStatus::ReadyForShipping,
            PackageStatus::InTransit,
            PackageStatus::Delivered,
        ] {
            assert_eq!(PackageStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn unknown_status_does_not_parse() {
        assert_eq!(PackageStatus::parse("lost"), None);
        assert_eq!(PackageStatus::parse(""), None);
    }

    #[test]
    fn only_delivered_is_terminal() {
        assert!(PackageStatus::Delivered.is_terminal());
        assert!(!PackageStatus::Pending.is_terminal());
        assert!(!PackageStatus::ReadyForShipping.is_terminal());
        assert!(!PackageStatus::InTransit.is_terminal());
    }

    #[test]
    fn default_status_is_pending() {
        assert_eq!(PackageStatus::default(), PackageStatus::Pending);
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&PackageStatus::ReadyForShipping).unwrap();
        assert_eq!(json, "\"ready_for_shipping\"");
    }

    #[test]
    fn event_labels_match_audit_trail_text() {
        assert_eq!(EventLabel::LabelCreated.as_str(), "Label Created");
        assert_eq!(
            EventLabel::ReturnedToWarehouse.as_str(),
            "Returned to Warehouse"
        );
        assert_eq!(EventLabel::InTransit.to_string(), "In Transit");
    }
}
