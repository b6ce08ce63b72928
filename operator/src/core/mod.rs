//! Deterministic, pure logic shared by the reconciliation passes.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod fingerprint;
pub mod invariants;
pub mod ownership;
pub mod plan;
pub mod selector;
pub mod types;
