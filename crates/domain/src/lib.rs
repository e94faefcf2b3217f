//! Package state machine: legal lifecycle transitions, product reservation,
//! and the append-only audit trail, executed inside store transactions.

mod error;
mod service;
mod tracking;
mod transition;

pub use error::PackageError;
pub use service::PackageService;
pub use tracking::generate_tracking_code;
pub use transition::Transition;
