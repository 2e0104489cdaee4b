//! Payment domain model.
//!
//! # Responsibility
//! - Define the payment record shape shared by query and bulk-mutation paths.
//! - Pin down the status vocabulary used by filters and transitions.
//!
//! # Invariants
//! - `id` is the storage rowid and never reused for another payment.
//! - `due_date` is an ISO-8601 `YYYY-MM-DD` string when present.

use serde::{Deserialize, Serialize};

/// Stable identifier for a payment record.
pub type PaymentId = i64;

/// Payment lifecycle status.
///
/// `APagar` ("to pay") is the only status eligible for bulk transitions;
/// `Paid` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Open, awaiting payment.
    APagar,
    /// Settled by a bulk or individual pay action.
    Paid,
    /// Cancelled, no longer payable.
    Cancelled,
}

impl PaymentStatus {
    /// Returns the canonical wire/storage string for this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::APagar => "A_PAGAR",
            Self::Paid => "PAID",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Parses a canonical status string.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "A_PAGAR" => Some(Self::APagar),
            "PAID" => Some(Self::Paid),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Canonical payment read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Storage rowid.
    pub id: PaymentId,
    /// Current lifecycle status.
    pub status: PaymentStatus,
    /// Due date as ISO-8601 `YYYY-MM-DD`.
    pub due_date: Option<String>,
    /// Amount in integer cents to avoid float rounding.
    pub amount_cents: Option<i64>,
    pub description: Option<String>,
    /// Creation timestamp in epoch milliseconds.
    pub created_at: i64,
    /// Last mutation timestamp in epoch milliseconds.
    pub updated_at: i64,
}

/// Insert shape for new payments; the storage layer assigns id and timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayment {
    pub status: PaymentStatus,
    pub due_date: Option<String>,
    pub amount_cents: Option<i64>,
    pub description: Option<String>,
}

impl Default for NewPayment {
    fn default() -> Self {
        Self {
            status: PaymentStatus::APagar,
            due_date: None,
            amount_cents: None,
            description: None,
        }
    }
}
