//! Label selectors used to list owned cluster roles.
//!
//! Only the two operators the reconciliation passes need are supported:
//! exact match and not-equals. Keys and values are validated when a
//! requirement is added, so a selector that exists is always well-formed.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

const MAX_NAME_LEN: usize = 63;
const MAX_PREFIX_LEN: usize = 253;

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9]([-A-Za-z0-9_.]*[A-Za-z0-9])?$").expect("label name regex")
});
static PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$")
        .expect("label prefix regex")
});

/// A label selector could not be built from the given key or value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("invalid label key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },
    #[error("invalid value '{value}' for label '{key}': {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equals,
    NotEquals,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub key: String,
    pub operator: Operator,
    pub value: String,
}

impl Requirement {
    /// `NotEquals` also matches objects that do not carry the label at all.
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let actual = labels.get(&self.key);
        match self.operator {
            Operator::Equals => actual == Some(&self.value),
            Operator::NotEquals => actual != Some(&self.value),
        }
    }
}

/// Conjunction of label requirements. An empty selector matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    requirements: Vec<Requirement>,
}

impl LabelSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn equals(self, key: &str, value: &str) -> Result<Self, SelectorError> {
        self.with(key, Operator::Equals, value)
    }

    pub fn not_equals(self, key: &str, value: &str) -> Result<Self, SelectorError> {
        self.with(key, Operator::NotEquals, value)
    }

    fn with(mut self, key: &str, operator: Operator, value: &str) -> Result<Self, SelectorError> {
        validate_label_key(key)?;
        validate_label_value(value).map_err(|reason| SelectorError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason,
        })?;
        self.requirements.push(Requirement {
            key: key.to_string(),
            operator,
            value: value.to_string(),
        });
        Ok(self)
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|req| req.matches(labels))
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, req) in self.requirements.iter().enumerate() {
            if idx > 0 {
                f.write_str(",")?;
            }
            let op = match req.operator {
                Operator::Equals => "=",
                Operator::NotEquals => "!=",
            };
            write!(f, "{}{}{}", req.key, op, req.value)?;
        }
        Ok(())
    }
}

/// Validate a label key: optional DNS-subdomain prefix, `/`, then a name.
pub fn validate_label_key(key: &str) -> Result<(), SelectorError> {
    let invalid = |reason: &str| SelectorError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };
    let (prefix, name) = match key.split_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, key),
    };
    if let Some(prefix) = prefix {
        if prefix.is_empty() || prefix.len() > MAX_PREFIX_LEN {
            return Err(invalid("prefix must be 1-253 characters"));
        }
        if !PREFIX_RE.is_match(prefix) {
            return Err(invalid("prefix must be a lowercase DNS subdomain"));
        }
    }
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(invalid("name must be 1-63 characters"));
    }
    if !NAME_RE.is_match(name) {
        return Err(invalid(
            "name must be alphanumeric with '-', '_' or '.' inside",
        ));
    }
    Ok(())
}

/// Validate a label value. Empty values are allowed.
pub fn validate_label_value(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Ok(());
    }
    if value.len() > MAX_NAME_LEN {
        return Err(format!("must be at most {MAX_NAME_LEN} characters"));
    }
    if !NAME_RE.is_match(value) {
        return Err("must be alphanumeric with '-', '_' or '.' inside".to_string());
    }
    Ok(())
}
