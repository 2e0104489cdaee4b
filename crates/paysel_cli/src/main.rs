//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `paysel_core` linkage.
//! - Keep output deterministic for quick local sanity checks.

fn main() {
    println!("paysel_core version={}", paysel_core::core_version());
}
