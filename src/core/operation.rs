//! Store operations
//!
//! Every store call is one of a fixed set of verbs. The verb selects the
//! pipeline stages; the `Outcome` is what a successful call produced.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::driver::Record;

/// Store verbs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Verb {
    Post,
    Put,
    Get,
    GetQuery,
    Delete,
    PostAppend,
}

impl Verb {
    /// Get verb name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Put => "put",
            Self::Get => "get",
            Self::GetQuery => "getQuery",
            Self::Delete => "delete",
            Self::PostAppend => "postAppend",
        }
    }

    /// Verbs that write a body to the driver
    pub fn carries_body(&self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::PostAppend)
    }

    /// Verbs that fetch the existing record before acting
    pub fn fetches_existing(&self) -> bool {
        matches!(self, Self::Put | Self::Get | Self::Delete | Self::PostAppend)
    }
}

/// The question put to the permission gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Access {
    Post,
    PutNew,
    PutExisting,
    Get,
    GetQuery,
    Delete,
    PostAppend,
}

impl Access {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::PutNew => "putNew",
            Self::PutExisting => "putExisting",
            Self::Get => "get",
            Self::GetQuery => "getQuery",
            Self::Delete => "delete",
            Self::PostAppend => "postAppend",
        }
    }
}

/// Conditional-write precondition on Put
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overwrite {
    /// `If-Match: *`: the record must already exist
    Existing,
    /// `If-None-Match: *`: the record must not exist yet
    New,
}

/// Result of a successful store call
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Post inserted a record. `record` is `None` when echo is off.
    Created { record: Option<Record>, id: Option<Value> },

    /// Put wrote a record; `created` is true when it did not exist
    Written { record: Option<Record>, created: bool },

    /// Get found a record
    Fetched { record: Record },

    /// Delete removed a record
    Deleted { record: Record },

    /// PostAppend extended a record
    Appended { record: Option<Record> },

    /// GetQuery returned a page
    Page {
        rows: Vec<Record>,
        skip: usize,
        total: usize,
        grand_total: usize,
    },
}

impl Outcome {
    /// The single record carried by the outcome, if any
    pub fn record(&self) -> Option<&Record> {
        match self {
            Self::Created { record, .. } | Self::Written { record, .. } | Self::Appended { record } => {
                record.as_ref()
            }
            Self::Fetched { record } | Self::Deleted { record } => Some(record),
            Self::Page { .. } => None,
        }
    }

    pub fn into_record(self) -> Option<Record> {
        match self {
            Self::Created { record, .. } | Self::Written { record, .. } | Self::Appended { record } => {
                record
            }
            Self::Fetched { record } | Self::Deleted { record } => Some(record),
            Self::Page { .. } => None,
        }
    }

    /// Rows of a query page; empty for single-record outcomes
    pub fn into_rows(self) -> Vec<Record> {
        match self {
            Self::Page { rows, .. } => rows,
            _ => Vec::new(),
        }
    }
}
