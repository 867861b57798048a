//! # Store Core
//!
//! The request lifecycle: descriptors, per-call context, the ordered stage
//! pipeline, hooks and the registry that owns every store.
//!
//! ## Design Principles
//!
//! - One `Store` per resource, parameterized by driver, validator and hooks
//! - Fail fast into a single error exit per call
//! - Permission is checked before validation errors are surfaced

pub mod context;
pub mod descriptor;
pub mod error;
pub mod hooks;
pub mod operation;
pub mod pipeline;
pub mod registry;

pub use context::{Range, RequestContext, RequestOptions, Transport};
pub use descriptor::{ChainErrors, EchoFlags, ResourceDescriptor, VerbFlags};
pub use error::{StoreError, StoreResult};
pub use hooks::{DefaultHooks, Permission, StoreHooks};
pub use operation::{Access, Outcome, Overwrite, Verb};
pub use pipeline::Store;
pub use registry::StoreRegistry;
