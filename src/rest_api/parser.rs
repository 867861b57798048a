//! # Query-String Translator
//!
//! Turns the `Range`, `If-Match`/`If-None-Match` and placement headers plus
//! the `sortBy` and filter query parameters into [`RequestOptions`].
//! Malformed input is ignored rather than rejected.

use std::collections::HashMap;

use axum::http::HeaderMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::core::{Overwrite, Range, RequestOptions, ResourceDescriptor};
use crate::driver::{Placement, Record, SortKey};
use crate::schema::{Schema, SearchSchema};

/// Query parameter carrying the sort specification
pub const SORT_PARAM: &str = "sortBy";

static RANGE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*items=(\d+)-(\d*)\s*$").expect("range pattern is valid"));

/// Parse a `Range: items=a-b` header. `items=N-` has no limit.
pub fn parse_range(value: &str) -> Option<Range> {
    let captures = RANGE_PATTERN.captures(value)?;
    let from: usize = captures.get(1)?.as_str().parse().ok()?;
    let to = captures.get(2).map(|m| m.as_str()).unwrap_or("");

    if to.is_empty() {
        return Some(Range {
            skip: from,
            limit: None,
        });
    }

    let to: usize = to.parse().ok()?;
    let limit = to.checked_sub(from)?.checked_add(1)?;
    Some(Range {
        skip: from,
        limit: Some(limit),
    })
}

/// Parse `sortBy=+a,-b`. Tokens naming unsortable fields are dropped.
pub fn parse_sort_by(value: &str, schema: &Schema) -> Vec<SortKey> {
    value
        .split(',')
        .filter_map(|token| {
            // '+' arrives as a space after URL decoding
            let token = token.trim();
            let key = match token.strip_prefix('-') {
                Some(field) => SortKey::desc(field.trim()),
                None => SortKey::asc(token.trim_start_matches('+').trim()),
            };
            if key.field.is_empty() || !schema.is_sortable(&key.field) {
                None
            } else {
                Some(key)
            }
        })
        .collect()
}

/// Keep the query parameters that name search fields
pub fn parse_conditions(query: &HashMap<String, String>, search: &SearchSchema) -> Record {
    query
        .iter()
        .filter(|(name, _)| name.as_str() != SORT_PARAM && search.contains_key(name.as_str()))
        .map(|(name, value)| (name.clone(), Value::String(value.clone())))
        .collect()
}

/// `If-Match: *` / `If-None-Match: *`
pub fn parse_overwrite(headers: &HeaderMap) -> Option<Overwrite> {
    let is_star = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim() == "*")
    };

    if is_star("if-match") {
        Some(Overwrite::Existing)
    } else if is_star("if-none-match") {
        Some(Overwrite::New)
    } else {
        None
    }
}

/// `placement: first|last|after` with `placement-after: <id>`
pub fn parse_placement(headers: &HeaderMap) -> Option<Placement> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
    };

    match header("placement")?.to_ascii_lowercase().as_str() {
        "first" => Some(Placement::First),
        "last" => Some(Placement::Last),
        "after" => match header("placement-after") {
            Some(id) if !id.is_empty() => Some(Placement::After(id)),
            _ => Some(Placement::Last),
        },
        _ => None,
    }
}

/// Build the options of a remote call
pub fn translate(
    descriptor: &ResourceDescriptor,
    headers: &HeaderMap,
    query: &HashMap<String, String>,
) -> RequestOptions {
    let sort = query
        .get(SORT_PARAM)
        .map(|value| parse_sort_by(value, &descriptor.schema))
        .unwrap_or_default();

    let ranges = headers
        .get("range")
        .and_then(|v| v.to_str().ok())
        .and_then(parse_range);

    RequestOptions {
        sort,
        ranges,
        conditions: parse_conditions(query, &descriptor.effective_search_schema()),
        placement: parse_placement(headers),
        overwrite: parse_overwrite(headers),
        field: None,
    }
}
