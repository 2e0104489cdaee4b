//! Domain model for payments and selection sessions.
//!
//! # Responsibility
//! - Define the canonical data structures used by core business logic.
//! - Keep the selection algebra pure and free of storage concerns.
//!
//! # Invariants
//! - Selections are identified by a stable `SelectionId` and scoped to one owner.
//! - Include/exclude id sets stay insertion-ordered and duplicate-free.

pub mod payment;
pub mod selection;
