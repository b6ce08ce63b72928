//! Semantic invariants of a store snapshot not expressible via JSON Schema.

use std::collections::HashSet;

use crate::core::selector::validate_label_value;
use crate::core::types::ScopeTemplate;

/// Check template invariants:
/// - Descriptor generate-names are unique within the template
/// - Generate-names are valid label values (they are used as one)
/// - Templates that already carry a uid use a valid label value for it
pub fn validate_template(template: &ScopeTemplate) -> Vec<String> {
    let key = template.key();
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    if let Err(reason) = validate_label_value(template.uid()) {
        errors.push(format!("{key}: uid '{}' {reason}", template.uid()));
    }

    for descriptor in &template.spec.cluster_roles {
        let name = descriptor.generate_name.as_str();
        if !seen.insert(name) {
            errors.push(format!("{key}: duplicate generateName '{name}'"));
        }
        if name.is_empty() {
            errors.push(format!("{key}: generateName must not be empty"));
        } else if let Err(reason) = validate_label_value(name) {
            errors.push(format!("{key}: generateName '{name}' {reason}"));
        }
    }

    errors
}

/// Check every template, returning errors in template order.
pub fn validate_templates(templates: &[ScopeTemplate]) -> Vec<String> {
    let mut errors = Vec::new();
    let mut keys = HashSet::new();
    for template in templates {
        if !keys.insert(template.key()) {
            errors.push(format!("duplicate template {}", template.key()));
        }
        errors.extend(validate_template(template));
    }
    errors
}
