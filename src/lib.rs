//! # reststores
//!
//! REST resource stores: each resource maps HTTP verbs onto a pluggable
//! driver through one request lifecycle (parameter validation, schema
//! casting, permission gate, hooks, driver call, echo, response shaping).
//!
//! ```ignore
//! use std::sync::Arc;
//! use reststores::core::{RequestContext, ResourceDescriptor, Store};
//! use reststores::driver::MemoryDriver;
//!
//! let store = Store::new(ResourceDescriptor::new("people"), Arc::new(MemoryDriver::new("id")));
//! let outcome = store.post(RequestContext::local().with_body(body)).await?;
//! ```

pub mod cli;
pub mod core;
pub mod driver;
pub mod http_server;
pub mod observability;
pub mod rest_api;
pub mod schema;

pub use driver::Record;
