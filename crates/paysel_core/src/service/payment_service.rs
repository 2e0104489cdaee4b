//! Payment browsing use-case service.
//!
//! # Responsibility
//! - Provide stable registration and filtered-search entry points.
//! - Delegate persistence to repository implementations.
//!
//! # Invariants
//! - Service APIs never bypass repository contracts.
//! - Filters are normalized before querying so blank fields mean "any".

use crate::model::payment::{NewPayment, Payment, PaymentId};
use crate::model::selection::FilterSpec;
use crate::repo::payment_repo::{PaymentListQuery, PaymentRepository};
use crate::repo::RepoResult;

/// Use-case service wrapper for payment queries.
pub struct PaymentService<R: PaymentRepository> {
    repo: R,
}

impl<R: PaymentRepository> PaymentService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Registers one payment and returns its assigned id.
    pub fn register_payment(&self, payment: &NewPayment) -> RepoResult<PaymentId> {
        self.repo.create_payment(payment)
    }

    /// Gets one payment by id.
    pub fn get_payment(&self, id: PaymentId) -> RepoResult<Option<Payment>> {
        self.repo.get_payment(id)
    }

    /// Lists payments matching the query's filter with pagination.
    pub fn search_payments(&self, query: &PaymentListQuery) -> RepoResult<Vec<Payment>> {
        let normalized = PaymentListQuery {
            filter: query.filter.normalized(),
            ..query.clone()
        };
        self.repo.list_payments(&normalized)
    }

    /// Counts payments matching the filter.
    pub fn count_payments(&self, filter: &FilterSpec) -> RepoResult<u64> {
        self.repo.count_matching(&filter.normalized())
    }
}
