//! Package repository: locked read/write primitives over package rows.
//!
//! The `domain` crate depends only on the [`PackageStore`] / [`PackageTx`]
//! abstraction. Two adapters are provided: [`PostgresPackageStore`] for
//! production and [`InMemoryPackageStore`] for tests and local development.

mod error;
mod memory;
mod package;
mod postgres;
mod repository;

pub use error::{Result, StoreError};
pub use memory::InMemoryPackageStore;
pub use package::{NewShipmentEvent, Package, PackageProduct, PackageWithDetails, ShipmentEvent};
pub use postgres::PostgresPackageStore;
pub use repository::{PackageStore, PackageTx};
