//! # REST Binding
//!
//! HTTP surface for stores: query-string translation, response shaping,
//! the error responder and the axum router.

pub mod errors;
pub mod parser;
pub mod response;
pub mod server;

pub use errors::{respond_error, ErrorBody, UnhandledError};
pub use parser::translate;
pub use response::{content_range, outcome_response};
pub use server::{route_patterns, RestServer};
