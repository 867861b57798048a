//! Request Context
//!
//! Context carried through the store pipeline. Created per call, mutated by
//! each stage and discarded afterwards.

use std::sync::Arc;
use std::time::Instant;

use axum::http::{HeaderMap, Method};
use serde_json::Value;
use uuid::Uuid;

use crate::driver::{Placement, Record, SortKey};
use crate::schema::FieldError;

use super::operation::Overwrite;
use super::registry::StoreRegistry;

/// Requested page window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub skip: usize,
    /// `None` leaves the limit to the driver
    pub limit: Option<usize>,
}

/// Options derived from the request (or supplied by a local caller)
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub sort: Vec<SortKey>,
    pub ranges: Option<Range>,
    /// Filter values keyed by search field
    pub conditions: Record,
    pub placement: Option<Placement>,
    pub overwrite: Option<Overwrite>,
    /// Restricts Get/Put to a single field
    pub field: Option<String>,
}

/// Transport details of a remote call
#[derive(Debug, Clone)]
pub struct Transport {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
}

/// Context carried through the store pipeline
#[derive(Clone)]
pub struct RequestContext {
    /// Request ID for tracing
    pub request_id: Uuid,

    /// Arrived over HTTP rather than from application code
    pub remote: bool,

    /// Identifying parameters
    pub params: Record,

    /// Body; replaced by the validated object
    pub body: Record,

    /// Body as received, before validation
    pub original_body: Record,

    pub options: RequestOptions,

    /// Existing record after `extrapolate_doc`
    pub record: Option<Record>,

    /// Existing record as returned by the driver
    pub full_doc: Option<Record>,

    /// Field errors accumulated by validation
    pub errors: Vec<FieldError>,

    pub transport: Option<Transport>,

    /// Lets hooks call other stores
    pub registry: Option<Arc<StoreRegistry>>,

    started_at: Instant,
}

impl RequestContext {
    fn new(remote: bool, transport: Option<Transport>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            remote,
            params: Record::new(),
            body: Record::new(),
            original_body: Record::new(),
            options: RequestOptions::default(),
            record: None,
            full_doc: None,
            errors: Vec::new(),
            transport,
            registry: None,
            started_at: Instant::now(),
        }
    }

    /// Context for a call made from application code
    pub fn local() -> Self {
        Self::new(false, None)
    }

    /// Context for a call that arrived over HTTP
    pub fn remote(transport: Transport) -> Self {
        Self::new(true, Some(transport))
    }

    /// Set identifying parameters from a JSON object (other values are ignored)
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = into_record(params);
        self
    }

    /// Set the body from a JSON object (other values are ignored)
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = into_record(body);
        self
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_conditions(mut self, conditions: Value) -> Self {
        self.options.conditions = into_record(conditions);
        self
    }

    pub fn with_registry(mut self, registry: Arc<StoreRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Get elapsed time in milliseconds
    pub fn elapsed_ms(&self) -> u128 {
        self.started_at.elapsed().as_millis()
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::local()
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("request_id", &self.request_id)
            .field("remote", &self.remote)
            .field("params", &self.params)
            .field("body", &self.body)
            .field("options", &self.options)
            .field("record", &self.record)
            .field("errors", &self.errors)
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}

fn into_record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_local_context() {
        let ctx = RequestContext::local()
            .with_params(json!({"id": "1"}))
            .with_body(json!({"name": "Tony"}));

        assert!(!ctx.remote);
        assert!(ctx.transport.is_none());
        assert_eq!(ctx.params["id"], "1");
        assert_eq!(ctx.body["name"], "Tony");
    }

    #[test]
    fn test_remote_context_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("range", "items=0-9".parse().unwrap());
        let ctx = RequestContext::remote(Transport {
            method: Method::GET,
            path: "/people".into(),
            headers,
        });

        assert!(ctx.remote);
        let transport = ctx.transport.as_ref().unwrap();
        assert_eq!(transport.headers["range"], "items=0-9");
    }

    #[test]
    fn test_non_object_values_are_ignored() {
        let ctx = RequestContext::local().with_body(json!([1, 2]));
        assert!(ctx.body.is_empty());
    }

    #[test]
    fn test_request_ids_are_unique() {
        assert_ne!(RequestContext::local().request_id, RequestContext::local().request_id);
    }
}
