//! Selection lifecycle service: create, update, apply, reap.
//!
//! # Responsibility
//! - Own the full lifecycle of selection sessions.
//! - Enforce ownership scoping, optimistic concurrency and one-shot apply.
//! - Delegate counting and bulk transitions to the payment repository.
//!
//! # Invariants
//! - `owner_id` is an explicit parameter on every operation; a foreign
//!   owner is indistinguishable from a missing selection.
//! - Updates are serialized per selection via compare-and-swap on `version`.
//! - A selection is consumed by exactly one successful `apply`; afterwards
//!   every operation on its id reports `SelectionNotFound`.

use crate::model::selection::{
    Action, FilterSpec, Mode, OwnerId, Selection, SelectionDelta, SelectionId,
    SelectionValidationError,
};
use crate::repo::payment_repo::PaymentRepository;
use crate::repo::selection_repo::SelectionRepository;
use crate::repo::RepoError;
use log::{info, warn};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

/// Service error for selection lifecycle use-cases.
#[derive(Debug)]
pub enum SelectionError {
    /// Missing id, foreign owner, or already-consumed selection. One kind
    /// on purpose: callers must not learn which of the three happened.
    SelectionNotFound(SelectionId),
    /// Stale version on write; retryable after reloading.
    ConcurrencyConflict(SelectionId),
    /// Malformed action or filter input.
    Validation(String),
    /// Persistence-layer failure, propagated.
    Repo(RepoError),
}

impl Display for SelectionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SelectionNotFound(id) => write!(f, "selection not found: {id}"),
            Self::ConcurrencyConflict(id) => {
                write!(f, "selection {id} was modified concurrently; reload and retry")
            }
            Self::Validation(message) => write!(f, "{message}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SelectionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for SelectionError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::SelectionNotFound(id),
            RepoError::VersionConflict { id, .. } => Self::ConcurrencyConflict(id),
            other => Self::Repo(other),
        }
    }
}

impl From<SelectionValidationError> for SelectionError {
    fn from(value: SelectionValidationError) -> Self {
        Self::Validation(value.to_string())
    }
}

/// Response envelope for create/update: the session handle plus the
/// effective selected count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionSummary {
    pub selection_id: SelectionId,
    pub count: u64,
}

/// Lifecycle manager for selection sessions.
pub struct SelectionService<S: SelectionRepository, P: PaymentRepository> {
    selections: S,
    payments: P,
}

impl<S: SelectionRepository, P: PaymentRepository> SelectionService<S, P> {
    /// Creates a service using the provided repository implementations.
    pub fn new(selections: S, payments: P) -> Self {
        Self {
            selections,
            payments,
        }
    }

    /// Creates a new selection session for `owner_id`.
    ///
    /// # Contract
    /// - The filter is normalized, then rejected with `Validation` if
    ///   malformed; it is immutable afterwards.
    /// - Returned count is the algebra formula with empty deltas: the full
    ///   filter match count under `ALL`, zero under `NONE`.
    pub fn create(
        &self,
        owner_id: OwnerId,
        mode: Mode,
        filter: FilterSpec,
    ) -> Result<SelectionSummary, SelectionError> {
        let filter = filter.normalized();
        filter.validate()?;

        let selection = Selection::new(owner_id, mode, filter, now_epoch_ms());
        self.selections.insert_selection(&selection)?;

        let count = self.effective_count(&selection)?;
        info!(
            "event=selection_create module=service status=ok selection_id={} mode={} count={count}",
            selection.id,
            selection.mode.as_str()
        );

        Ok(SelectionSummary {
            selection_id: selection.id,
            count,
        })
    }

    /// Applies a delta to an existing selection and returns the new count.
    ///
    /// The write is a compare-and-swap on the version read at load time; a
    /// losing writer gets `ConcurrencyConflict` and the stored state is left
    /// untouched.
    pub fn update(
        &self,
        id: SelectionId,
        owner_id: OwnerId,
        delta: &SelectionDelta,
    ) -> Result<SelectionSummary, SelectionError> {
        let mut selection = self
            .selections
            .get_selection(id, owner_id)?
            .ok_or(SelectionError::SelectionNotFound(id))?;

        selection.apply_delta(delta);

        match self.selections.update_selection(&selection) {
            Ok(new_version) => selection.version = new_version,
            Err(err @ RepoError::VersionConflict { .. }) => {
                warn!(
                    "event=selection_update module=service status=conflict selection_id={id} version={}",
                    selection.version
                );
                return Err(err.into());
            }
            Err(err) => return Err(err.into()),
        }

        let count = self.effective_count(&selection)?;
        info!(
            "event=selection_update module=service status=ok selection_id={id} mode={} version={} count={count}",
            selection.mode.as_str(),
            selection.version
        );

        Ok(SelectionSummary {
            selection_id: id,
            count,
        })
    }

    /// Consumes the selection and executes the batch action exactly once.
    /// Returns the number of payments actually transitioned.
    ///
    /// # Contract
    /// - An unrecognized action fails with `Validation` before any load or
    ///   mutation.
    /// - The selection row is consumed first; a concurrent or repeated apply
    ///   observes the termination as `SelectionNotFound`.
    /// - The bulk transition only touches payments still in the action's
    ///   source status, so a retry after a downstream failure cannot
    ///   double-transition anything.
    /// - `NONE` mode with an empty include set is a zero-affected success
    ///   that still consumes the selection.
    pub fn apply(
        &self,
        id: SelectionId,
        owner_id: OwnerId,
        action: &str,
    ) -> Result<usize, SelectionError> {
        let action = Action::parse(action).ok_or_else(|| {
            SelectionError::Validation(format!(
                "unsupported action `{action}`; expected PAY|CANCEL"
            ))
        })?;

        let selection = self
            .selections
            .consume_selection(id, owner_id)?
            .ok_or(SelectionError::SelectionNotFound(id))?;

        let affected = match selection.mode {
            Mode::All => self.payments.transition_matching_excluding(
                &selection.filter,
                &selection.exclude_ids,
                action.source_status(),
                action.target_status(),
            )?,
            Mode::None if selection.include_ids.is_empty() => 0,
            Mode::None => self.payments.transition_by_ids(
                &selection.include_ids,
                action.source_status(),
                action.target_status(),
            )?,
        };

        info!(
            "event=selection_apply module=service status=ok selection_id={id} action={} mode={} affected={affected}",
            action.as_str(),
            selection.mode.as_str()
        );

        Ok(affected)
    }

    /// Deletes every selection past its TTL at `now_ms`; returns the number
    /// removed. Safe to call repeatedly, deleting nothing is not an error.
    pub fn reap_expired(&self, now_ms: i64) -> Result<usize, SelectionError> {
        let removed = self.selections.delete_expired(now_ms)?;
        if removed > 0 {
            info!("event=selection_reap module=service status=ok removed={removed}");
        }
        Ok(removed)
    }

    fn effective_count(&self, selection: &Selection) -> Result<u64, SelectionError> {
        // The resolver is only consulted under ALL; NONE counts locally.
        let filter_matches = match selection.mode {
            Mode::All => self.payments.count_matching(&selection.filter)?,
            Mode::None => 0,
        };
        Ok(selection.effective_count(filter_matches))
    }
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::SelectionError;
    use crate::repo::RepoError;
    use uuid::Uuid;

    #[test]
    fn repo_errors_map_to_service_taxonomy() {
        let id = Uuid::new_v4();

        assert!(matches!(
            SelectionError::from(RepoError::NotFound(id)),
            SelectionError::SelectionNotFound(mapped) if mapped == id
        ));
        assert!(matches!(
            SelectionError::from(RepoError::VersionConflict {
                id,
                expected_version: 3
            }),
            SelectionError::ConcurrencyConflict(mapped) if mapped == id
        ));
        assert!(matches!(
            SelectionError::from(RepoError::InvalidData("broken".to_string())),
            SelectionError::Repo(_)
        ));
    }
}
