//! Field-level validation errors
//!
//! Validators never fail fast: every problem found in an object is reported
//! as one `FieldError`, and callers decide how to surface the list.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Message used when a required field is absent
pub const FIELD_REQUIRED: &str = "Field required";

/// Message used when a field is not declared in the schema
pub const FIELD_NOT_ALLOWED: &str = "Field not allowed";

/// A single `{field, message}` validation problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Field path (e.g. `surname`)
    pub field: String,
    /// Human-readable description of the problem
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    /// The field is required but missing
    pub fn required(field: impl Into<String>) -> Self {
        Self::new(field, FIELD_REQUIRED)
    }

    /// The field is not declared in the schema
    pub fn not_allowed(field: impl Into<String>) -> Self {
        Self::new(field, FIELD_NOT_ALLOWED)
    }

    /// The value could not be cast to the declared type
    pub fn type_mismatch(field: impl Into<String>, expected: &str) -> Self {
        Self::new(field, format!("Must be a valid {}", expected))
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}
