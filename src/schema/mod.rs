//! Resource schemas and validation
//!
//! A schema declares the fields of a resource. Validators cast raw JSON
//! input to those declarations and report every problem as a field error.

mod errors;
mod types;
mod validator;

pub use errors::{FieldError, FIELD_NOT_ALLOWED, FIELD_REQUIRED};
pub use types::{
    derive_search_schema, search_validation_schema, FieldDef, FieldType, Schema, SearchField,
    SearchSchema,
};
pub use validator::{SchemaValidator, SimpleValidator, ValidateOptions, Validated};
