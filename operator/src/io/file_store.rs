//! Store snapshot load/save with schema + invariant validation.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use jsonschema::validator_for;
use serde_json::Value;
use tracing::debug;

use crate::core::invariants::validate_templates;
use crate::io::memory_store::{MemoryStore, StoreSnapshot};

pub const STORE_SCHEMA: &str = include_str!("../../schemas/store.v1.schema.json");

/// Load and validate a store snapshot from disk (schema + invariants).
pub fn load_store(path: &Path) -> Result<MemoryStore> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read store {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("parse store {}", path.display()))?;
    validate_schema(&value).with_context(|| format!("validate store {}", path.display()))?;
    let snapshot: StoreSnapshot = serde_json::from_value(value)
        .with_context(|| format!("deserialize store {}", path.display()))?;
    validate_snapshot_invariants(&snapshot)?;
    debug!(
        path = %path.display(),
        templates = snapshot.templates.len(),
        instances = snapshot.instances.len(),
        cluster_roles = snapshot.cluster_roles.len(),
        "store loaded"
    );
    Ok(MemoryStore::from_snapshot(snapshot))
}

/// Atomically write the store contents to disk (temp file + rename).
pub fn write_store(path: &Path, store: &MemoryStore) -> Result<()> {
    write_snapshot(path, &store.snapshot())
}

pub fn write_snapshot(path: &Path, snapshot: &StoreSnapshot) -> Result<()> {
    debug!(path = %path.display(), "writing store");
    let mut buf = serde_json::to_string_pretty(snapshot).context("serialize store")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn validate_schema(value: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(STORE_SCHEMA).context("parse store schema")?;
    let compiled = validator_for(&schema).map_err(|err| anyhow!("invalid schema: {}", err))?;
    if !compiled.is_valid(value) {
        let messages = compiled
            .iter_errors(value)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(anyhow!(
            "store schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}

fn validate_snapshot_invariants(snapshot: &StoreSnapshot) -> Result<()> {
    let errors = validate_templates(&snapshot.templates);
    if errors.is_empty() {
        return Ok(());
    }
    Err(anyhow!("store invariants failed: {}", errors.join("; ")))
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("store path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp store {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace store {}", path.display()))?;
    Ok(())
}
