//! Store pipeline lifecycle tests
//!
//! Drives `Store` directly (local and remote contexts) over the memory
//! driver and checks stage ordering as seen from the outside.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::http::{HeaderMap, Method};
use parking_lot::Mutex;
use serde_json::{json, Value};

use reststores::core::{
    Access, EchoFlags, Outcome, Overwrite, Permission, RequestContext, RequestOptions,
    ResourceDescriptor, Store, StoreError, StoreHooks, StoreResult, Transport, VerbFlags,
};
use reststores::driver::{Driver, FilterOperator, MemoryDriver, SortKey};
use reststores::schema::{FieldDef, FieldType, Schema, SearchField};
use reststores::Record;

fn people() -> ResourceDescriptor {
    ResourceDescriptor::new("people").with_schema(
        Schema::new()
            .field("id", FieldDef::id())
            .field("name", FieldDef::string().searchable().sortable())
            .field("surname", FieldDef::string().required().max(20.0).sortable())
            .field("age", FieldDef::number().max(99.0).searchable().filter_type(FilterOperator::Gte)),
    )
}

fn people_store() -> Store {
    Store::new(people(), Arc::new(MemoryDriver::new("id")))
}

fn remote() -> RequestContext {
    RequestContext::remote(Transport {
        method: Method::GET,
        path: "/people".to_string(),
        headers: HeaderMap::new(),
    })
}

async fn create(store: &Store, body: Value) -> Record {
    store
        .post(RequestContext::local().with_body(body))
        .await
        .unwrap()
        .into_record()
        .unwrap()
}

// =============================================================================
// POST / GET / DELETE
// =============================================================================

#[tokio::test]
async fn test_post_then_get() {
    let store = people_store();
    let created = create(&store, json!({"name": "Tony", "surname": "Mobily", "age": "37"})).await;

    let id = created["id"].clone();
    assert!(id.is_string());
    assert_eq!(created["age"], json!(37));

    let fetched = store
        .get(RequestContext::local().with_params(json!({"id": id})))
        .await
        .unwrap()
        .into_record()
        .unwrap();
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn test_post_reports_location_id() {
    let store = people_store();
    let outcome = store
        .post(RequestContext::local().with_body(json!({"surname": "Rossi"})))
        .await
        .unwrap();

    match outcome {
        Outcome::Created { record, id } => {
            let record = record.unwrap();
            assert_eq!(Some(&record["id"]), id.as_ref());
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn test_delete_then_get_is_not_found() {
    let store = people_store();
    let created = create(&store, json!({"surname": "Rossi"})).await;
    let params = json!({"id": created["id"]});

    let deleted = store
        .delete(RequestContext::local().with_params(params.clone()))
        .await
        .unwrap();
    assert_eq!(deleted.record(), Some(&created));

    let err = store
        .get(RequestContext::local().with_params(params))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[tokio::test]
async fn test_invalid_body_is_unprocessable() {
    let store = people_store();
    let err = store
        .post(RequestContext::local().with_body(json!({"age": 120, "nickname": "T"})))
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::UnprocessableEntity { .. }));
    let fields: Vec<&str> = err.field_errors().iter().map(|e| e.field.as_str()).collect();
    assert!(fields.contains(&"surname"));
    assert!(fields.contains(&"age"));
    assert!(fields.contains(&"nickname"));
}

// =============================================================================
// PUT AND OVERWRITE PRECONDITIONS
// =============================================================================

#[tokio::test]
async fn test_put_new_then_existing() {
    let store = people_store();
    let params = json!({"id": "p1"});

    let first = store
        .put(RequestContext::local().with_params(params.clone()).with_body(json!({"surname": "Rossi"})))
        .await
        .unwrap();
    assert!(matches!(first, Outcome::Written { created: true, .. }));

    let second = store
        .put(RequestContext::local().with_params(params).with_body(json!({"surname": "Verdi"})))
        .await
        .unwrap();
    assert!(matches!(second, Outcome::Written { created: false, .. }));
    assert_eq!(second.record().unwrap()["surname"], "Verdi");
    assert_eq!(second.record().unwrap()["id"], "p1");
}

#[tokio::test]
async fn test_if_none_match_on_existing_record() {
    let store = people_store();
    let created = create(&store, json!({"surname": "Rossi"})).await;

    let options = RequestOptions {
        overwrite: Some(Overwrite::New),
        ..RequestOptions::default()
    };
    let err = store
        .put(
            RequestContext::local()
                .with_params(json!({"id": created["id"]}))
                .with_body(json!({"surname": "Verdi"}))
                .with_options(options),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::PreconditionFailed(_)));
}

#[tokio::test]
async fn test_if_match_on_missing_record() {
    let store = people_store();
    let options = RequestOptions {
        overwrite: Some(Overwrite::Existing),
        ..RequestOptions::default()
    };
    let err = store
        .put(
            RequestContext::local()
                .with_params(json!({"id": "nobody"}))
                .with_body(json!({"surname": "Verdi"}))
                .with_options(options),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::PreconditionFailed(_)));

    let mut key = Record::new();
    key.insert("id".to_string(), json!("nobody"));
    assert!(store.driver().fetch_by_key(&key).await.unwrap().is_empty());
}

// =============================================================================
// PERMISSIONS
// =============================================================================

/// Denies overwrites and records each access asked for
struct ReadOnlyExisting {
    asked: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl StoreHooks for ReadOnlyExisting {
    async fn check_permissions(&self, _ctx: &RequestContext, access: Access) -> StoreResult<Permission> {
        self.asked.lock().push(access.name());
        Ok(match access {
            Access::PutExisting => Permission::denied("Record is read-only"),
            _ => Permission::granted(),
        })
    }
}

#[tokio::test]
async fn test_permission_denial_beats_validation_errors() {
    let asked = Arc::new(Mutex::new(Vec::new()));
    let store = people_store().with_hooks(ReadOnlyExisting {
        asked: Arc::clone(&asked),
    });
    let created = create(&store, json!({"surname": "Rossi"})).await;

    let err = store
        .put(
            RequestContext::local()
                .with_params(json!({"id": created["id"]}))
                .with_body(json!({"surname": "x".repeat(30)})),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::Forbidden(_)));
    assert_eq!(err.message(), "Record is read-only");
    assert_eq!(*asked.lock(), vec!["post", "putExisting"]);
}

// =============================================================================
// QUERIES
// =============================================================================

async fn seeded() -> Store {
    let store = people_store();
    for (name, surname, age) in [
        ("Tony", "Mobily", 37),
        ("Chiara", "Mobily", 24),
        ("Sara", "Rossi", 14),
        ("Luca", "Verdi", 51),
    ] {
        create(&store, json!({"name": name, "surname": surname, "age": age})).await;
    }
    store
}

#[tokio::test]
async fn test_query_filters_with_search_operator() {
    let store = seeded().await;
    let rows = store
        .get_query(remote().with_conditions(json!({"age": "30"})))
        .await
        .unwrap()
        .into_rows();

    let mut names: Vec<&str> = rows.iter().filter_map(|r| r["name"].as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["Luca", "Tony"]);
}

#[tokio::test]
async fn test_remote_query_ignores_unknown_filters() {
    let store = seeded().await;
    let outcome = store
        .get_query(remote().with_conditions(json!({"shoeSize": "44"})))
        .await
        .unwrap();

    match outcome {
        Outcome::Page { total, grand_total, .. } => {
            assert_eq!(total, 4);
            assert_eq!(grand_total, 4);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn test_invalid_filter_value_is_unprocessable() {
    let store = seeded().await;
    let err = store
        .get_query(remote().with_conditions(json!({"age": "old"})))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::UnprocessableEntity { .. }));
    assert_eq!(err.field_errors()[0].field, "age");
}

#[tokio::test]
async fn test_query_sort_and_range() {
    let store = seeded().await;
    let options = RequestOptions {
        sort: vec![SortKey::desc("name")],
        ranges: Some(reststores::core::Range { skip: 1, limit: Some(2) }),
        ..RequestOptions::default()
    };
    let outcome = store.get_query(remote().with_options(options)).await.unwrap();

    match outcome {
        Outcome::Page { rows, skip, total, grand_total } => {
            let names: Vec<&str> = rows.iter().filter_map(|r| r["name"].as_str()).collect();
            assert_eq!(names, vec!["Sara", "Luca"]);
            assert_eq!((skip, total, grand_total), (1, 2, 4));
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn test_search_target_maps_to_record_field() {
    let mut search = std::collections::BTreeMap::new();
    search.insert(
        "family".to_string(),
        SearchField::new(FieldType::String).target("surname"),
    );
    let store = Store::new(
        people().with_search_schema(search),
        Arc::new(MemoryDriver::new("id")),
    );
    create(&store, json!({"surname": "Mobily"})).await;
    create(&store, json!({"surname": "Rossi"})).await;

    let rows = store
        .get_query(remote().with_conditions(json!({"family": "Rossi"})))
        .await
        .unwrap()
        .into_rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["surname"], "Rossi");
}

// =============================================================================
// NESTED RESOURCES
// =============================================================================

#[tokio::test]
async fn test_nested_params_scope_records() {
    let pets = ResourceDescriptor::new("pets")
        .with_url("/people/:personId/pets/:id")
        .with_schema(
            Schema::new()
                .field("id", FieldDef::id())
                .field("personId", FieldDef::id())
                .field("name", FieldDef::string().required()),
        );
    let store = Store::new(pets, Arc::new(MemoryDriver::new("id")));

    for (owner, name) in [("p1", "Rex"), ("p1", "Fido"), ("p2", "Tom")] {
        store
            .post(
                RequestContext::local()
                    .with_params(json!({"personId": owner}))
                    .with_body(json!({"name": name, "personId": "ignored"})),
            )
            .await
            .unwrap();
    }

    let rows = store
        .get_query(remote().with_params(json!({"personId": "p1"})))
        .await
        .unwrap()
        .into_rows();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r["personId"] == "p1"));

    let err = store
        .post(RequestContext::local().with_body(json!({"name": "Stray"})))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::BadRequest { .. }));
    assert_eq!(err.field_errors()[0].field, "personId");
}

// =============================================================================
// VERB FLAGS
// =============================================================================

#[tokio::test]
async fn test_disabled_verb_only_blocks_remote_calls() {
    let handles = VerbFlags {
        delete: false,
        ..VerbFlags::default()
    };
    let store = Store::new(people().with_handles(handles), Arc::new(MemoryDriver::new("id")));
    let created = create(&store, json!({"surname": "Rossi"})).await;

    let err = store
        .delete(remote().with_params(json!({"id": created["id"]})))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotImplemented(_)));

    store
        .delete(RequestContext::local().with_params(json!({"id": created["id"]})))
        .await
        .unwrap();
}

// =============================================================================
// ECHO FLAGS
// =============================================================================

#[tokio::test]
async fn test_echo_off_returns_bare_acknowledgements() {
    let echo = EchoFlags {
        after_post: false,
        after_put: false,
        after_post_append: false,
    };
    let descriptor = people()
        .with_schema(people().schema.field("tags", FieldDef::array()))
        .with_handles(VerbFlags {
            post_append: true,
            ..VerbFlags::default()
        })
        .with_echo(echo);
    let store = Store::new(descriptor, Arc::new(MemoryDriver::new("id")));

    let outcome = store
        .post(RequestContext::local().with_body(json!({"surname": "Rossi", "tags": ["a"]})))
        .await
        .unwrap();
    let id = match outcome {
        Outcome::Created { record: None, id: Some(id) } => id,
        other => panic!("unexpected outcome: {:?}", other),
    };
    let params = json!({"id": id});

    let outcome = store
        .put(RequestContext::local().with_params(params.clone()).with_body(json!({"surname": "Verdi"})))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Written { record: None, created: false });

    let outcome = store
        .post_append(RequestContext::local().with_params(params.clone()).with_body(json!({"tags": ["b"]})))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Appended { record: None });

    let stored = store
        .get(RequestContext::local().with_params(params))
        .await
        .unwrap()
        .into_record()
        .unwrap();
    assert_eq!(stored["surname"], "Verdi");
    assert_eq!(stored["tags"], json!(["b"]));
}

// =============================================================================
// ERROR LOGGING HOOK
// =============================================================================

/// Records every error handed to `log_error`
struct ErrorLog {
    seen: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl StoreHooks for ErrorLog {
    fn log_error(&self, store: &str, _ctx: &RequestContext, err: &StoreError) {
        let status = err
            .status_code()
            .map(|s| s.as_u16().to_string())
            .unwrap_or_else(|| "nonhttp".to_string());
        self.seen.lock().push(format!("{}:{}", store, status));
    }
}

#[tokio::test]
async fn test_every_error_reaches_log_error() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let store = people_store().with_hooks(ErrorLog {
        seen: Arc::clone(&seen),
    });

    let _ = store.get(RequestContext::local()).await;
    let _ = store
        .get(RequestContext::local().with_params(json!({"id": "nobody"})))
        .await;
    let _ = store
        .post(RequestContext::local().with_body(json!({"age": 7})))
        .await;
    store
        .post(RequestContext::local().with_body(json!({"surname": "Rossi"})))
        .await
        .unwrap();

    assert_eq!(
        *seen.lock(),
        vec!["people:400", "people:404", "people:422"]
    );
}

// =============================================================================
// AFTER HOOK FAILURES
// =============================================================================

/// Fails every after-write hook
struct FailingAfterHooks;

#[async_trait]
impl StoreHooks for FailingAfterHooks {
    async fn after_post(&self, _ctx: &RequestContext, _record: &Record) -> StoreResult<()> {
        Err(StoreError::internal("audit trail unavailable"))
    }

    async fn after_put_new(&self, _ctx: &RequestContext, _record: &Record) -> StoreResult<()> {
        Err(StoreError::internal("audit trail unavailable"))
    }
}

#[tokio::test]
async fn test_after_hook_errors_fail_the_call() {
    let store = people_store().with_hooks(FailingAfterHooks);

    let err = store
        .post(RequestContext::local().with_body(json!({"surname": "Rossi"})))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Internal(_)));
    assert_eq!(err.message(), "audit trail unavailable");

    let err = store
        .put(
            RequestContext::local()
                .with_params(json!({"id": "p1"}))
                .with_body(json!({"surname": "Rossi"})),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Internal(_)));
}

// =============================================================================
// ARTIFICIAL DELAY
// =============================================================================

#[tokio::test]
async fn test_artificial_delay_runs_before_dispatch() {
    let store = Store::new(
        people().with_artificial_delay(40),
        Arc::new(MemoryDriver::new("id")),
    );

    let started = Instant::now();
    let err = store
        .get(RequestContext::local().with_params(json!({"id": "nobody"})))
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::NotFound(_)));
    assert!(started.elapsed() >= Duration::from_millis(40));
}
