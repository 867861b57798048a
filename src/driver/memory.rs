//! In-memory driver
//!
//! Rows live in a vector so stored order is meaningful and placement can be
//! honoured. Suitable for tests, demos and single-process deployments.

use std::cmp::Ordering;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use super::{
    compare_json_values, Driver, DriverError, DriverResult, Placement, QueryPage, Record,
    Selector, SortDirection, SortKey,
};

/// Rows returned by an open-ended query
pub const DEFAULT_DRIVER_LIMIT: usize = 1000;

/// Vector-backed driver
pub struct MemoryDriver {
    id_property: Option<String>,
    rows: RwLock<Vec<Record>>,
}

impl MemoryDriver {
    /// Create a driver that generates ids for `id_property` when absent
    pub fn new(id_property: impl Into<String>) -> Self {
        Self {
            id_property: Some(id_property.into()),
            rows: RwLock::new(Vec::new()),
        }
    }

    /// Create a driver for a resource without an id property
    pub fn without_ids() -> Self {
        Self {
            id_property: None,
            rows: RwLock::new(Vec::new()),
        }
    }

    /// Seed rows in the given order
    pub fn with_rows(self, rows: impl IntoIterator<Item = Record>) -> Self {
        self.rows.write().extend(rows);
        self
    }

    fn id_of<'a>(&self, row: &'a Record) -> Option<&'a Value> {
        self.id_property.as_ref().and_then(|prop| row.get(prop))
    }

    /// Insert `row` into `rows` honouring `placement`
    fn place(&self, rows: &mut Vec<Record>, row: Record, placement: Option<&Placement>) {
        let index = match placement {
            Some(Placement::First) => 0,
            Some(Placement::After(id)) => rows
                .iter()
                .position(|r| self.id_of(r).is_some_and(|v| id_matches(v, id)))
                .map(|i| i + 1)
                .unwrap_or(rows.len()),
            Some(Placement::Last) | None => rows.len(),
        };
        rows.insert(index, row);
    }
}

fn id_matches(value: &Value, id: &str) -> bool {
    match value {
        Value::String(s) => s == id,
        Value::Number(n) => n.to_string() == id,
        _ => false,
    }
}

fn matches_key(row: &Record, key: &Record) -> bool {
    key.iter().all(|(field, expected)| row.get(field) == Some(expected))
}

fn compare_rows(a: &Record, b: &Record, sort: &[SortKey]) -> Ordering {
    for key in sort {
        let left = a.get(&key.field).unwrap_or(&Value::Null);
        let right = b.get(&key.field).unwrap_or(&Value::Null);
        let ordering = compare_json_values(left, right).unwrap_or(Ordering::Equal);
        let ordering = match key.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

#[async_trait]
impl Driver for MemoryDriver {
    async fn fetch_by_key(&self, key: &Record) -> DriverResult<Vec<Record>> {
        let rows = self.rows.read();
        Ok(rows.iter().filter(|row| matches_key(row, key)).cloned().collect())
    }

    async fn insert(&self, mut body: Record, placement: Option<&Placement>) -> DriverResult<Record> {
        let mut rows = self.rows.write();

        if let Some(prop) = &self.id_property {
            match body.get(prop) {
                Some(id) if !id.is_null() => {
                    if rows.iter().any(|row| row.get(prop) == Some(id)) {
                        return Err(DriverError::DuplicateKey(format!("{} = {}", prop, id)));
                    }
                }
                _ => {
                    let id = Uuid::new_v4().to_string();
                    debug!(id = %id, "generated id for inserted row");
                    body.insert(prop.clone(), Value::String(id));
                }
            }
        }

        self.place(&mut rows, body.clone(), placement);
        Ok(body)
    }

    async fn update(
        &self,
        key: &Record,
        mut body: Record,
        placement: Option<&Placement>,
    ) -> DriverResult<Record> {
        let mut rows = self.rows.write();

        let index = rows
            .iter()
            .position(|row| matches_key(row, key))
            .ok_or_else(|| DriverError::Backend(format!("No row matches key {}", Value::Object(key.clone()))))?;

        for (field, value) in key {
            body.insert(field.clone(), value.clone());
        }

        match placement {
            Some(placement) => {
                rows.remove(index);
                self.place(&mut rows, body.clone(), Some(placement));
            }
            None => rows[index] = body.clone(),
        }

        Ok(body)
    }

    async fn delete(&self, key: &Record) -> DriverResult<()> {
        let mut rows = self.rows.write();
        rows.retain(|row| !matches_key(row, key));
        Ok(())
    }

    async fn query(&self, selector: &Selector) -> DriverResult<QueryPage> {
        let rows = self.rows.read();

        let mut matching: Vec<Record> = rows
            .iter()
            .filter(|row| selector.conditions.iter().all(|c| c.matches(row)))
            .cloned()
            .collect();
        drop(rows);

        let grand_total = matching.len();

        if !selector.sort.is_empty() {
            matching.sort_by(|a, b| compare_rows(a, b, &selector.sort));
        }

        let limit = selector.limit.unwrap_or(DEFAULT_DRIVER_LIMIT);
        let page: Vec<Record> = matching.into_iter().skip(selector.skip).take(limit).collect();

        Ok(QueryPage {
            total: page.len(),
            grand_total,
            rows: page,
        })
    }
}
