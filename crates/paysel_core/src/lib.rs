//! Core domain logic for PaySel, a bulk payment-selection engine.
//!
//! A selection is a short-lived, owner-scoped session describing a virtual
//! choice over a filtered payment set (`ALL` minus exclusions, or `NONE`
//! plus inclusions). It is mutated with optimistic concurrency and consumed
//! by exactly one batch action. This crate is the single source of truth
//! for those invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::payment::{NewPayment, Payment, PaymentId, PaymentStatus};
pub use model::selection::{
    Action, FilterSpec, Mode, OwnerId, Selection, SelectionDelta, SelectionId,
    SelectionValidationError, SELECTION_TTL_MS,
};
pub use repo::payment_repo::{PaymentListQuery, PaymentRepository, SqlitePaymentRepository};
pub use repo::selection_repo::{SelectionRepository, SqliteSelectionRepository};
pub use repo::{RepoError, RepoResult};
pub use service::payment_service::PaymentService;
pub use service::selection_service::{SelectionError, SelectionService, SelectionSummary};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
