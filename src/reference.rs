//! Repository names and tags
//!
//! Names follow the distribution reference grammar: one or more `/`-separated
//! components, each made of lowercase alphanumeric runs joined by `.`, `_`,
//! `__` or any number of `-`.

use crate::error::{GcError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const NAME_TOTAL_LENGTH_MAX: usize = 255;
pub const TAG_LENGTH_MAX: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepositoryName {
    name: String,
}

impl RepositoryName {
    pub fn parse(name: &str) -> Result<Self> {
        let invalid = |reason: String| GcError::InvalidName {
            name: name.to_string(),
            reason,
        };

        if name.is_empty() {
            return Err(invalid("repository name must have at least one component".to_string()));
        }
        if name.len() > NAME_TOTAL_LENGTH_MAX {
            return Err(invalid(format!(
                "repository name must not be more than {} characters",
                NAME_TOTAL_LENGTH_MAX
            )));
        }
        for component in name.split('/') {
            if !is_valid_component(component) {
                return Err(invalid(format!(
                    "invalid path component {:?}",
                    component
                )));
            }
        }

        Ok(RepositoryName {
            name: name.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }
}

fn is_alphanumeric(b: u8) -> bool {
    b.is_ascii_lowercase() || b.is_ascii_digit()
}

fn is_valid_component(component: &str) -> bool {
    let bytes = component.as_bytes();
    let (Some(&first), Some(&last)) = (bytes.first(), bytes.last()) else {
        return false;
    };
    if !is_alphanumeric(first) || !is_alphanumeric(last) {
        return false;
    }

    let mut i = 0;
    while i < bytes.len() {
        if is_alphanumeric(bytes[i]) {
            i += 1;
            continue;
        }
        let start = i;
        while i < bytes.len() && !is_alphanumeric(bytes[i]) {
            i += 1;
        }
        let separator = &component[start..i];
        let allowed = matches!(separator, "." | "_" | "__") || separator.bytes().all(|b| b == b'-');
        if !allowed {
            return false;
        }
    }
    true
}

/// Validate a tag name: `[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}`
pub fn validate_tag(tag: &str) -> Result<()> {
    let invalid = |reason: &str| GcError::InvalidName {
        name: tag.to_string(),
        reason: reason.to_string(),
    };

    let word = |c: char| c.is_ascii_alphanumeric() || c == '_';
    let mut chars = tag.chars();
    match chars.next() {
        Some(first) if word(first) => {}
        Some(_) => return Err(invalid("tag must start with a letter, digit or underscore")),
        None => return Err(invalid("tag must not be empty")),
    }
    if tag.len() > TAG_LENGTH_MAX {
        return Err(invalid("tag must not be more than 128 characters"));
    }
    if !chars.all(|c| word(c) || c == '.' || c == '-') {
        return Err(invalid("tag contains invalid characters"));
    }
    Ok(())
}

impl fmt::Display for RepositoryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl FromStr for RepositoryName {
    type Err = GcError;

    fn from_str(s: &str) -> Result<Self> {
        RepositoryName::parse(s)
    }
}

impl TryFrom<String> for RepositoryName {
    type Error = GcError;

    fn try_from(value: String) -> Result<Self> {
        RepositoryName::parse(&value)
    }
}

impl From<RepositoryName> for String {
    fn from(name: RepositoryName) -> Self {
        name.name
    }
}
