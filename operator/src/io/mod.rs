//! I/O seams for reconciliation: the object store and configuration.

pub mod config;
pub mod file_store;
pub mod memory_store;
pub mod store;
