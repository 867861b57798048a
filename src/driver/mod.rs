//! Backing store drivers
//!
//! A driver provides atomic single-record fetch/insert/update/delete and a
//! query returning one page of rows plus counts. The pipeline never assumes
//! anything else about the store behind it.

pub mod filter;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub use filter::{compare_json_values, Condition, FilterOperator};
pub use memory::MemoryDriver;

/// A stored record: a JSON object
pub type Record = Map<String, Value>;

/// Result type for driver operations
pub type DriverResult<T> = Result<T, DriverError>;

/// Driver failures. These carry no HTTP status.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),
}

/// Where an inserted or updated row is positioned in stored order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    First,
    Last,
    /// Directly after the row with this id
    After(String),
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// One sort key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    #[serde(default = "default_direction")]
    pub direction: SortDirection,
}

fn default_direction() -> SortDirection {
    SortDirection::Asc
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// What a query asks the driver for
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selector {
    /// All conditions must hold
    pub conditions: Vec<Condition>,
    /// Ordered sort keys; empty means stored order
    pub sort: Vec<SortKey>,
    pub skip: usize,
    /// `None` lets the driver apply its own default limit
    pub limit: Option<usize>,
}

/// One page of query results
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPage {
    pub rows: Vec<Record>,
    /// Rows in this page
    pub total: usize,
    /// Rows matching the conditions, ignoring skip/limit
    pub grand_total: usize,
}

/// Storage contract used by the pipeline
#[async_trait]
pub trait Driver: Send + Sync {
    /// Rows whose fields equal every entry of `key`
    async fn fetch_by_key(&self, key: &Record) -> DriverResult<Vec<Record>>;

    /// Insert a new row and return it as stored
    async fn insert(&self, body: Record, placement: Option<&Placement>) -> DriverResult<Record>;

    /// Replace the row matching `key` and return it as stored
    async fn update(
        &self,
        key: &Record,
        body: Record,
        placement: Option<&Placement>,
    ) -> DriverResult<Record>;

    /// Remove every row matching `key`
    async fn delete(&self, key: &Record) -> DriverResult<()>;

    /// Filter, sort and page rows
    async fn query(&self, selector: &Selector) -> DriverResult<QueryPage>;
}
