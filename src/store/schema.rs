//! Structural validation for persisted documents.

use std::fmt;

/// A field-level shape violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Dotted path of the offending field (e.g. `members[2].id`).
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field `{}`: {}", self.field, self.message)
    }
}

/// Invariants a document must satisfy beyond what serde's shape checks cover.
///
/// Checked after every read and before every write.
pub trait Validate {
    fn validate(&self) -> Result<(), FieldError>;
}

impl<T: Validate> Validate for Vec<T> {
    fn validate(&self) -> Result<(), FieldError> {
        for (i, item) in self.iter().enumerate() {
            item.validate()
                .map_err(|e| FieldError::new(format!("[{}].{}", i, e.field), e.message))?;
        }
        Ok(())
    }
}

/// Reject empty or whitespace-only strings.
pub fn require_non_empty(field: &str, value: &str) -> Result<(), FieldError> {
    if value.trim().is_empty() {
        Err(FieldError::new(field, "must not be empty"))
    } else {
        Ok(())
    }
}
