//! Desired-state reconciliation for scope templates.
//!
//! A [`ScopeTemplate`](core::types::ScopeTemplate) declares a list of cluster
//! role descriptors. Reconciling a template drives the object store toward the
//! roles it implies, while leaving roles owned by other templates untouched.
//! The crate keeps the same split the reconciliation passes depend on:
//!
//! - **[`core`]**: Pure, deterministic logic (fingerprints, ownership labels,
//!   label selectors, per-descriptor decisions). No I/O, fully testable in
//!   isolation.
//! - **[`io`]**: The [`ObjectStore`](io::store::ObjectStore) seam and its
//!   in-memory and file-backed implementations, plus configuration.
//!
//! Orchestration modules ([`sync`], [`reap`], [`reconcile`]) coordinate core
//! logic with the store to implement one reconciliation pass.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod reap;
pub mod reconcile;
pub mod sync;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
