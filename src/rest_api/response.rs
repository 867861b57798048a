//! # Response Formatting
//!
//! Status codes and `Location`/`Content-Range` headers for successful
//! store outcomes.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;

use crate::core::Outcome;
use crate::driver::Record;

/// `Content-Range` value for a query page
pub fn content_range(skip: usize, total: usize, grand_total: usize) -> String {
    if total == 0 {
        format!("items 0-0/{}", grand_total)
    } else {
        format!("items {}-{}/{}", skip, skip + total - 1, grand_total)
    }
}

/// Location of a record created under `collection_path`
pub fn created_location(collection_path: &str, id: &Value) -> String {
    let id = match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    format!("{}/{}", collection_path.trim_end_matches('/'), id)
}

fn with_location(mut response: Response, location: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(location) {
        response.headers_mut().insert(header::LOCATION, value);
    }
    response
}

fn record_response(status: StatusCode, record: Option<Record>) -> Response {
    match record {
        Some(record) => (status, Json(Value::Object(record))).into_response(),
        None => status.into_response(),
    }
}

/// Turn an outcome into a response. `path` is the request path.
pub fn outcome_response(outcome: Outcome, path: &str) -> Response {
    match outcome {
        Outcome::Created { record, id } => {
            let response = record_response(StatusCode::CREATED, record);
            match id {
                Some(id) => with_location(response, &created_location(path, &id)),
                None => response,
            }
        }
        Outcome::Written {
            record,
            created: true,
        } => with_location(record_response(StatusCode::CREATED, record), path),
        Outcome::Written {
            record,
            created: false,
        } => record_response(StatusCode::OK, record),
        Outcome::Appended { record } => record_response(StatusCode::OK, record),
        Outcome::Fetched { record } | Outcome::Deleted { record } => {
            record_response(StatusCode::OK, Some(record))
        }
        Outcome::Page {
            rows,
            skip,
            total,
            grand_total,
        } => {
            let rows: Vec<Value> = rows.into_iter().map(Value::Object).collect();
            let mut response = (StatusCode::OK, Json(rows)).into_response();
            if let Ok(value) = HeaderValue::from_str(&content_range(skip, total, grand_total)) {
                response.headers_mut().insert(header::CONTENT_RANGE, value);
            }
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_content_range() {
        assert_eq!(content_range(0, 4, 4), "items 0-3/4");
        assert_eq!(content_range(10, 5, 100), "items 10-14/100");
        assert_eq!(content_range(0, 0, 0), "items 0-0/0");
        assert_eq!(content_range(20, 0, 7), "items 0-0/7");
    }

    #[test]
    fn test_created_location() {
        assert_eq!(created_location("/people", &json!("abc")), "/people/abc");
        assert_eq!(created_location("/people/", &json!(7)), "/people/7");
    }

    #[test]
    fn test_post_response() {
        let response = outcome_response(
            Outcome::Created {
                record: Some(record(json!({"id": "abc"}))),
                id: Some(json!("abc")),
            },
            "/people",
        );
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[header::LOCATION], "/people/abc");
    }

    #[test]
    fn test_put_responses() {
        let created = outcome_response(
            Outcome::Written {
                record: None,
                created: true,
            },
            "/people/abc",
        );
        assert_eq!(created.status(), StatusCode::CREATED);
        assert_eq!(created.headers()[header::LOCATION], "/people/abc");

        let replaced = outcome_response(
            Outcome::Written {
                record: None,
                created: false,
            },
            "/people/abc",
        );
        assert_eq!(replaced.status(), StatusCode::OK);
        assert!(replaced.headers().get(header::LOCATION).is_none());
    }

    #[test]
    fn test_page_response() {
        let response = outcome_response(
            Outcome::Page {
                rows: vec![],
                skip: 0,
                total: 0,
                grand_total: 0,
            },
            "/people",
        );
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "items 0-0/0");
    }
}
