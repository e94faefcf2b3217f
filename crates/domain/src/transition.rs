//! The legal lifecycle edges and what each one does.

use common::{EventLabel, PackageStatus};

/// One of the four legal lifecycle edges.
///
/// Each edge names its required source state, its target state, the
/// timestamps it stamps, and the audit events it appends. The
/// required-source check doubles as the concurrency guard: the conditional
/// update only succeeds when the locked row is still in the source state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    /// `pending → ready_for_shipping`
    ReadyForShipping,
    /// `ready_for_shipping → in_transit`, stamps `shipped_at` on first entry.
    InTransit,
    /// `in_transit → delivered`, stamps `delivered_at`. Terminal.
    Delivered,
    /// `in_transit → ready_for_shipping`, the only backward edge.
    ReturnedToWarehouse,
}

impl Transition {
    /// The status the package must currently hold for this edge to apply.
    pub fn required_source(&self) -> PackageStatus {
        match self {
            Transition::ReadyForShipping => PackageStatus::Pending,
            Transition::InTransit => PackageStatus::ReadyForShipping,
            Transition::Delivered | Transition::ReturnedToWarehouse => PackageStatus::InTransit,
        }
    }

    /// The status the package holds after this edge.
    pub fn target(&self) -> PackageStatus {
        match self {
            Transition::ReadyForShipping | Transition::ReturnedToWarehouse => {
                PackageStatus::ReadyForShipping
            }
            Transition::InTransit => PackageStatus::InTransit,
            Transition::Delivered => PackageStatus::Delivered,
        }
    }

    /// True when this edge stamps `shipped_at` (first entry only).
    pub fn sets_shipped_at(&self) -> bool {
        matches!(self, Transition::InTransit)
    }

    /// True when this edge stamps `delivered_at`.
    pub fn sets_delivered_at(&self) -> bool {
        matches!(self, Transition::Delivered)
    }

    /// Audit events appended by this edge, in order, with their notes text.
    pub fn events(&self) -> &'static [(EventLabel, &'static str)] {
        match self {
            Transition::ReadyForShipping => {
                &[(EventLabel::PackageReady, "Package packed and ready for pickup")]
            }
            Transition::InTransit => &[
                (EventLabel::PickedUp, "Picked up by carrier"),
                (EventLabel::InTransit, "Package is in transit"),
            ],
            Transition::Delivered => {
                &[(EventLabel::Delivered, "Successfully delivered to recipient")]
            }
            Transition::ReturnedToWarehouse => {
                &[(EventLabel::ReturnedToWarehouse, "Package returned to warehouse")]
            }
        }
    }

    /// Stable name used in logs, metrics labels, and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::ReadyForShipping => "ready_for_shipping",
            Transition::InTransit => "in_transit",
            Transition::Delivered => "delivered",
            Transition::ReturnedToWarehouse => "returned_to_warehouse",
        }
    }
}

impl std::fmt::Display for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
