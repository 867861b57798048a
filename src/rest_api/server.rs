//! # REST API HTTP Server
//!
//! Axum binding for every store in a registry. Each store gets:
//! - `GET|POST {collection}`
//! - `GET|PUT|DELETE|POST {item}`
//! - `GET|PUT {item}/:field`
//!
//! Routes are registered with positional parameter names so that nested
//! resources sharing a prefix never disagree on a name; the real parameter
//! names are recovered from the resource's URL pattern.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, Method, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::Value;

use crate::core::{
    RequestContext, ResourceDescriptor, Store, StoreError, StoreRegistry, StoreResult,
    Transport, Verb,
};
use crate::driver::Record;

use super::errors::{respond_error, UnhandledError};
use super::parser::translate;
use super::response::outcome_response;

type HandlerResult = Result<Response, UnhandledError>;

/// Router factory for a store registry
pub struct RestServer;

impl RestServer {
    /// Build the Axum router serving every registered store
    pub fn router(registry: Arc<StoreRegistry>) -> Router {
        registry
            .iter()
            .fold(Router::new(), |router, store| {
                router.merge(store_router(Arc::clone(store), Arc::clone(&registry)))
            })
    }
}

/// Per-store handler state
struct ResourceState {
    store: Arc<Store>,
    registry: Arc<StoreRegistry>,
}

type ServerState = Arc<ResourceState>;

fn store_router(store: Arc<Store>, registry: Arc<StoreRegistry>) -> Router {
    let descriptor = store.descriptor().clone();
    let state = Arc::new(ResourceState { store, registry });

    let collection = descriptor.collection_pattern();
    let mut router = Router::new().route(
        &route_path(&collection),
        get(collection_get).post(collection_post),
    );

    if let Some(item) = descriptor.item_pattern() {
        router = router
            .route(
                &route_path(&item),
                get(item_get)
                    .put(item_put)
                    .delete(item_delete)
                    .post(item_post_append),
            )
            .route(
                &route_path(&field_pattern(&item)),
                get(field_get).put(field_put),
            );
    }

    router.with_state(state)
}

/// Router paths a descriptor registers, in positional form
pub fn route_patterns(descriptor: &ResourceDescriptor) -> Vec<String> {
    let mut routes = vec![route_path(&descriptor.collection_pattern())];
    if let Some(item) = descriptor.item_pattern() {
        routes.push(route_path(&item));
        routes.push(route_path(&field_pattern(&item)));
    }
    routes
}

/// Item pattern extended with the field segment
fn field_pattern(item: &str) -> String {
    format!("{}/:field", item.trim_end_matches('/'))
}

/// Rewrite `:name` segments as `:p0`, `:p1`, ...
fn route_path(pattern: &str) -> String {
    let mut index = 0;
    pattern
        .split('/')
        .map(|segment| {
            if segment.starts_with(':') {
                let positional = format!(":p{}", index);
                index += 1;
                positional
            } else {
                segment.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Decoded values of the matched route parameters, in URL order
type Segments = Option<Path<Vec<String>>>;

/// Pair the `:name` segments of `pattern` with decoded route values
fn named_params(pattern: &str, values: Vec<String>) -> Record {
    pattern
        .split('/')
        .filter_map(|segment| segment.strip_prefix(':'))
        .zip(values)
        .map(|(name, value)| (name.to_string(), Value::String(value)))
        .collect()
}

/// Parse a request body; an empty body is an empty object
fn parse_body(body: &Bytes) -> StoreResult<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Record::new()));
    }
    serde_json::from_slice(body)
        .map_err(|e| StoreError::bad_request(format!("Invalid JSON body: {}", e), Vec::new()))
}

fn parse_object(body: &Bytes) -> StoreResult<Record> {
    match parse_body(body)? {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::bad_request(
            "Request body must be a JSON object",
            Vec::new(),
        )),
    }
}

impl ResourceState {
    fn descriptor(&self) -> &ResourceDescriptor {
        self.store.descriptor()
    }

    fn context(
        &self,
        pattern: &str,
        segments: Segments,
        method: Method,
        uri: &Uri,
        headers: HeaderMap,
        query: &HashMap<String, String>,
    ) -> RequestContext {
        let options = translate(self.descriptor(), &headers, query);
        let values = segments.map(|Path(values)| values).unwrap_or_default();
        let params = named_params(pattern, values);

        let mut ctx = RequestContext::remote(Transport {
            method,
            path: uri.path().to_string(),
            headers,
        })
        .with_registry(Arc::clone(&self.registry))
        .with_options(options);
        ctx.params = params;
        ctx
    }

    fn item_pattern(&self) -> String {
        self.descriptor().url_pattern()
    }

    fn item_context(
        &self,
        segments: Segments,
        method: Method,
        uri: &Uri,
        headers: HeaderMap,
    ) -> RequestContext {
        let pattern = self.item_pattern();
        self.context(&pattern, segments, method, uri, headers, &HashMap::new())
    }

    /// Errors raised before the pipeline runs
    fn reject(&self, ctx: &RequestContext, err: StoreError) -> HandlerResult {
        self.store.report_error(ctx, &err);
        respond_error(self.descriptor().chain_errors, err)
    }

    async fn run(&self, verb: Verb, ctx: RequestContext, uri: &Uri) -> HandlerResult {
        let result = self.store.execute(verb, ctx).await;
        self.respond(result.map(|outcome| outcome_response(outcome, uri.path())))
    }

    fn respond(&self, result: StoreResult<Response>) -> HandlerResult {
        match result {
            Ok(response) => Ok(response),
            Err(err) => respond_error(self.descriptor().chain_errors, err),
        }
    }
}

async fn collection_get(
    State(state): State<ServerState>,
    segments: Segments,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> HandlerResult {
    let pattern = state.descriptor().collection_pattern();
    let ctx = state.context(&pattern, segments, method, &uri, headers, &query);
    state.run(Verb::GetQuery, ctx, &uri).await
}

async fn collection_post(
    State(state): State<ServerState>,
    segments: Segments,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> HandlerResult {
    let pattern = state.descriptor().collection_pattern();
    let mut ctx = state.context(&pattern, segments, method, &uri, headers, &HashMap::new());
    match parse_object(&body) {
        Ok(body) => ctx.body = body,
        Err(err) => return state.reject(&ctx, err),
    }
    state.run(Verb::Post, ctx, &uri).await
}

async fn item_get(
    State(state): State<ServerState>,
    segments: Segments,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> HandlerResult {
    let ctx = state.item_context(segments, method, &uri, headers);
    state.run(Verb::Get, ctx, &uri).await
}

async fn item_put(
    State(state): State<ServerState>,
    segments: Segments,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> HandlerResult {
    let mut ctx = state.item_context(segments, method, &uri, headers);
    match parse_object(&body) {
        Ok(body) => ctx.body = body,
        Err(err) => return state.reject(&ctx, err),
    }
    state.run(Verb::Put, ctx, &uri).await
}

async fn item_delete(
    State(state): State<ServerState>,
    segments: Segments,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> HandlerResult {
    let ctx = state.item_context(segments, method, &uri, headers);
    state.run(Verb::Delete, ctx, &uri).await
}

async fn item_post_append(
    State(state): State<ServerState>,
    segments: Segments,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> HandlerResult {
    let mut ctx = state.item_context(segments, method, &uri, headers);
    match parse_object(&body) {
        Ok(body) => ctx.body = body,
        Err(err) => return state.reject(&ctx, err),
    }
    state.run(Verb::PostAppend, ctx, &uri).await
}

/// Split the trailing field segment off a field route path
fn field_context(
    state: &ResourceState,
    segments: Segments,
    method: Method,
    uri: &Uri,
    headers: HeaderMap,
) -> RequestContext {
    let pattern = field_pattern(&state.item_pattern());
    let mut ctx = state.context(&pattern, segments, method, uri, headers, &HashMap::new());
    let field = ctx
        .params
        .remove("field")
        .and_then(|v| v.as_str().map(str::to_string));
    ctx.options.field = field;
    ctx
}

async fn field_get(
    State(state): State<ServerState>,
    segments: Segments,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> HandlerResult {
    let ctx = field_context(&state, segments, method, &uri, headers);
    let result = state.store.get_field(ctx).await;
    state.respond(result.map(field_response))
}

async fn field_put(
    State(state): State<ServerState>,
    segments: Segments,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> HandlerResult {
    let mut ctx = field_context(&state, segments, method, &uri, headers);
    let value = match parse_body(&body) {
        Ok(value) => value,
        Err(err) => return state.reject(&ctx, err),
    };
    if let Some(field) = ctx.options.field.clone() {
        ctx.body.insert(field, value);
    }
    let field = ctx.options.field.clone();

    let result = state.store.execute(Verb::Put, ctx).await;
    state.respond(result.map(|outcome| {
        let value = field
            .and_then(|f| outcome.record().and_then(|r| r.get(&f)).cloned())
            .unwrap_or(Value::Null);
        field_response(value)
    }))
}

fn field_response(value: Value) -> Response {
    Json(value).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_route_path_is_positional() {
        assert_eq!(route_path("/people/:id"), "/people/:p0");
        assert_eq!(
            route_path("/workspaces/:workspaceId/users/:id/:field"),
            "/workspaces/:p0/users/:p1/:p2"
        );
        assert_eq!(route_path("/status"), "/status");
    }

    #[test]
    fn test_route_patterns() {
        let descriptor = ResourceDescriptor::new("people");
        assert_eq!(
            route_patterns(&descriptor),
            vec!["/people", "/people/:p0", "/people/:p0/:p1"]
        );
        let status = ResourceDescriptor::new("status").with_url("/status");
        assert_eq!(route_patterns(&status), vec!["/status"]);
    }

    #[test]
    fn test_named_params() {
        let params = named_params(
            "/workspaces/:workspaceId/users/:id",
            vec!["w1".to_string(), "a-b".to_string()],
        );
        assert_eq!(params.len(), 2);
        assert_eq!(params["workspaceId"], json!("w1"));
        assert_eq!(params["id"], json!("a-b"));

        assert!(named_params("/status", Vec::new()).is_empty());
    }

    #[test]
    fn test_parse_body() {
        assert!(parse_object(&Bytes::from_static(b"")).unwrap().is_empty());
        assert!(parse_object(&Bytes::from_static(b"[1]")).is_err());
        assert!(parse_object(&Bytes::from_static(b"{oops")).is_err());
        assert_eq!(parse_body(&Bytes::from_static(b"42")).unwrap(), json!(42));
    }

    #[test]
    fn test_router_builds_for_nested_resources() {
        let mut registry = StoreRegistry::new();
        for descriptor in [
            ResourceDescriptor::new("workspaces"),
            ResourceDescriptor::new("users").with_url("/workspaces/:workspaceId/users/:id"),
            ResourceDescriptor::new("status").with_url("/status"),
        ] {
            registry
                .register(Store::new(
                    descriptor,
                    Arc::new(crate::driver::MemoryDriver::new("id")),
                ))
                .unwrap();
        }
        let _router = RestServer::router(Arc::new(registry));
    }
}
