//! Content fingerprint of a template spec.
//!
//! The fingerprint is stamped onto every cluster role as a label and is the
//! only staleness signal the reaper uses, so it must be stable across runs
//! and releases. Every field is length-prefixed before hashing, which keeps
//! `["ab"]` and `["a", "b"]` distinct. Descriptor order is part of the input.

use sha2::{Digest, Sha256};

use crate::core::types::{PolicyRule, ScopeTemplateSpec};

/// Number of digest bytes kept. 8 bytes = 16 hex chars, well under the
/// 63-char label value limit.
const FINGERPRINT_BYTES: usize = 8;

/// Compute the fingerprint of `spec` as lowercase hex.
pub fn fingerprint(spec: &ScopeTemplateSpec) -> String {
    let mut hasher = Sha256::new();
    write_len(&mut hasher, spec.cluster_roles.len());
    for descriptor in &spec.cluster_roles {
        write_str(&mut hasher, &descriptor.generate_name);
        write_len(&mut hasher, descriptor.rules.len());
        for rule in &descriptor.rules {
            write_rule(&mut hasher, rule);
        }
    }
    let digest = hasher.finalize();
    hex::encode(&digest[..FINGERPRINT_BYTES])
}

fn write_rule(hasher: &mut Sha256, rule: &PolicyRule) {
    for list in [
        &rule.verbs,
        &rule.api_groups,
        &rule.resources,
        &rule.resource_names,
        &rule.non_resource_urls,
    ] {
        write_len(hasher, list.len());
        for item in list {
            write_str(hasher, item);
        }
    }
}

fn write_len(hasher: &mut Sha256, len: usize) {
    hasher.update((len as u64).to_be_bytes());
}

fn write_str(hasher: &mut Sha256, value: &str) {
    write_len(hasher, value.len());
    hasher.update(value.as_bytes());
}
