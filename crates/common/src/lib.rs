//! Shared types for the package tracker.
//!
//! Typed wrappers around the raw database identifiers, the package lifecycle
//! status enum, and the audit-event label vocabulary. Everything here is
//! plain data; behavior lives in the `domain` and `store` crates.

mod status;
mod types;

pub use status::{EventLabel, PackageStatus};
pub use types::{PackageId, ProductId, TrackingCode, UserId};
