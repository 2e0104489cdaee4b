//! Selection session model and delta algebra.
//!
//! # Responsibility
//! - Define the selection entity: mode, filter, include/exclude deltas.
//! - Resolve requested deltas into new include/exclude state (pure, no I/O).
//! - Compute the effective selected count from a filter match count.
//!
//! # Invariants
//! - `include_ids` and `exclude_ids` are insertion-ordered and duplicate-free.
//! - A mode change clears both id sets before any other delta is applied.
//! - `filter` is fixed at creation; the delta algebra never touches it.

use crate::model::payment::{PaymentId, PaymentStatus};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for a selection session.
pub type SelectionId = Uuid;

/// Identity of the user owning a selection.
pub type OwnerId = Uuid;

/// Fixed time-to-live for a selection session.
pub const SELECTION_TTL_MS: i64 = 4 * 60 * 60 * 1000;

static DUE_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid due date regex"));

/// Baseline polarity of a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Mode {
    /// Everything matching the filter starts selected; `exclude_ids` carves out.
    All,
    /// Nothing starts selected; `include_ids` opts in.
    None,
}

impl Mode {
    /// Returns the canonical wire/storage string for this mode.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "ALL",
            Self::None => "NONE",
        }
    }

    /// Parses a canonical mode string.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ALL" => Some(Self::All),
            "NONE" => Some(Self::None),
            _ => None,
        }
    }
}

/// Batch action applied when a selection is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    /// Transition eligible payments to `PAID`.
    Pay,
    /// Transition eligible payments to `CANCELLED`.
    Cancel,
}

impl Action {
    /// Returns the canonical wire string for this action.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pay => "PAY",
            Self::Cancel => "CANCEL",
        }
    }

    /// Parses a canonical action string (`PAY` | `CANCEL`).
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PAY" => Some(Self::Pay),
            "CANCEL" => Some(Self::Cancel),
            _ => None,
        }
    }

    /// Status a payment must currently hold to be eligible for this action.
    pub fn source_status(self) -> PaymentStatus {
        PaymentStatus::APagar
    }

    /// Status this action transitions eligible payments into.
    pub fn target_status(self) -> PaymentStatus {
        match self {
            Self::Pay => PaymentStatus::Paid,
            Self::Cancel => PaymentStatus::Cancelled,
        }
    }
}

/// Opaque filter describing the superset of payments a selection ranges over.
///
/// Either field may be absent, meaning unconstrained on that dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSpec {
    /// Exact payment status match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Upper bound (inclusive) on `due_date`, ISO-8601 `YYYY-MM-DD`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date_on_or_before: Option<String>,
}

impl FilterSpec {
    /// Returns a copy with whitespace trimmed and empty strings dropped.
    pub fn normalized(&self) -> Self {
        Self {
            status: normalize_text(self.status.as_deref()),
            due_date_on_or_before: normalize_text(self.due_date_on_or_before.as_deref()),
        }
    }

    /// Checks the due-date bound format.
    pub fn validate(&self) -> Result<(), SelectionValidationError> {
        if let Some(due) = self.due_date_on_or_before.as_deref() {
            if !DUE_DATE_RE.is_match(due) {
                return Err(SelectionValidationError::InvalidDueDate(due.to_string()));
            }
        }
        Ok(())
    }
}

fn normalize_text(value: Option<&str>) -> Option<String> {
    let trimmed = value.map(str::trim).unwrap_or_default();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Requested mutation against a selection. Absent fields are no-ops.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionDelta {
    /// Mode switch; clears both id sets before id deltas are applied.
    #[serde(default)]
    pub mode: Option<Mode>,
    /// Ids to select. Under `ALL` this cancels previous exclusions instead.
    #[serde(default)]
    pub include_ids: Option<Vec<PaymentId>>,
    /// Ids to deselect. Under `NONE` this cancels previous inclusions instead.
    #[serde(default)]
    pub exclude_ids: Option<Vec<PaymentId>>,
}

/// Model-level validation failure for selection state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionValidationError {
    /// An id appears more than once in `include_ids` or `exclude_ids`.
    DuplicateId {
        field: &'static str,
        id: PaymentId,
    },
    /// Due-date bound is not `YYYY-MM-DD`.
    InvalidDueDate(String),
    /// `expires_at` precedes `created_at`.
    ExpiryBeforeCreation,
}

impl Display for SelectionValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateId { field, id } => {
                write!(f, "duplicate id {id} in {field}")
            }
            Self::InvalidDueDate(value) => {
                write!(f, "invalid due date `{value}`; expected YYYY-MM-DD")
            }
            Self::ExpiryBeforeCreation => write!(f, "expires_at precedes created_at"),
        }
    }
}

impl Error for SelectionValidationError {}

/// Ephemeral, owner-scoped session representing an in-progress bulk choice
/// over a filtered payment set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    /// Stable session handle, generated at creation.
    pub id: SelectionId,
    /// Creator identity; every operation is scoped to `(id, owner_id)`.
    pub owner_id: OwnerId,
    /// Baseline polarity.
    pub mode: Mode,
    /// Match-set filter, fixed at creation.
    pub filter: FilterSpec,
    /// Opted-in ids (meaningful under `NONE`).
    pub include_ids: Vec<PaymentId>,
    /// Carved-out ids (meaningful under `ALL`).
    pub exclude_ids: Vec<PaymentId>,
    /// Optimistic concurrency token, bumped on every stored write.
    pub version: i64,
    /// Creation timestamp in epoch milliseconds.
    pub created_at: i64,
    /// Reap eligibility timestamp in epoch milliseconds.
    pub expires_at: i64,
}

impl Selection {
    /// Creates a fresh selection with empty deltas and `version = 0`.
    pub fn new(owner_id: OwnerId, mode: Mode, filter: FilterSpec, now_ms: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            mode,
            filter,
            include_ids: Vec::new(),
            exclude_ids: Vec::new(),
            version: 0,
            created_at: now_ms,
            expires_at: now_ms + SELECTION_TTL_MS,
        }
    }

    /// Resolves a requested delta into new include/exclude state.
    ///
    /// # Contract
    /// - A mode change resets both id sets before id deltas apply.
    /// - `include_ids` delta: union under `NONE`; under `ALL` it removes the
    ///   ids from `exclude_ids` and never grows `include_ids`.
    /// - `exclude_ids` delta: union under `ALL`; under `NONE` it removes the
    ///   ids from `include_ids` and never grows `exclude_ids`.
    /// - Unions are idempotent and keep insertion order.
    pub fn apply_delta(&mut self, delta: &SelectionDelta) {
        if let Some(mode) = delta.mode {
            self.mode = mode;
            self.include_ids.clear();
            self.exclude_ids.clear();
        }

        if let Some(ids) = delta.include_ids.as_deref() {
            match self.mode {
                Mode::None => merge_unique(&mut self.include_ids, ids),
                Mode::All => remove_ids(&mut self.exclude_ids, ids),
            }
        }

        if let Some(ids) = delta.exclude_ids.as_deref() {
            match self.mode {
                Mode::All => merge_unique(&mut self.exclude_ids, ids),
                Mode::None => remove_ids(&mut self.include_ids, ids),
            }
        }
    }

    /// Effective selected count given the current filter match count.
    ///
    /// `ALL` subtracts the raw exclusion count without verifying that the
    /// excluded ids actually match the filter, so excluding foreign ids
    /// undercounts. Preserved deliberately: the consuming bulk transition
    /// scopes by filter and exclusion set, so the final mutation stays
    /// correct either way.
    pub fn effective_count(&self, filter_matches: u64) -> u64 {
        match self.mode {
            Mode::All => filter_matches.saturating_sub(self.exclude_ids.len() as u64),
            Mode::None => self.include_ids.len() as u64,
        }
    }

    /// Whether this selection is eligible for reaping at `now_ms`.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at
    }

    /// Validates internal uniqueness, filter shape and timestamp ordering.
    pub fn validate(&self) -> Result<(), SelectionValidationError> {
        if let Some(id) = first_duplicate(&self.include_ids) {
            return Err(SelectionValidationError::DuplicateId {
                field: "include_ids",
                id,
            });
        }
        if let Some(id) = first_duplicate(&self.exclude_ids) {
            return Err(SelectionValidationError::DuplicateId {
                field: "exclude_ids",
                id,
            });
        }
        self.filter.validate()?;
        if self.expires_at < self.created_at {
            return Err(SelectionValidationError::ExpiryBeforeCreation);
        }
        Ok(())
    }
}

/// Appends ids not already present, preserving insertion order.
fn merge_unique(existing: &mut Vec<PaymentId>, added: &[PaymentId]) {
    for id in added {
        if !existing.contains(id) {
            existing.push(*id);
        }
    }
}

/// Drops every listed id, keeping the relative order of survivors.
fn remove_ids(existing: &mut Vec<PaymentId>, removed: &[PaymentId]) {
    existing.retain(|id| !removed.contains(id));
}

fn first_duplicate(ids: &[PaymentId]) -> Option<PaymentId> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().find(|id| !seen.insert(**id)).copied()
}
