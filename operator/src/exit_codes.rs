//! Stable exit codes for scope-operator CLI commands.

/// Command succeeded (including a reconcile of a template that no longer exists).
pub const OK: i32 = 0;
/// Command failed due to invalid arguments, config, or store snapshot.
pub const INVALID: i32 = 1;
/// At least one reconciliation pass returned an error.
pub const RECONCILE_FAILED: i32 = 2;
