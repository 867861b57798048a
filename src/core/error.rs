//! Store Error Types
//!
//! Every pipeline stage fails with a `StoreError`. HTTP kinds map to a
//! status code and carry a message plus optional field errors; `Driver` and
//! `Internal` have no status and are subject to the error chaining policy.

use axum::http::StatusCode;
use thiserror::Error;

use crate::driver::DriverError;
use crate::schema::FieldError;

/// Store result type
pub type StoreResult<T> = Result<T, StoreError>;

/// Store error type
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Bad request: {message}")]
    BadRequest {
        message: String,
        errors: Vec<FieldError>,
    },

    #[error("Unprocessable entity: {message}")]
    UnprocessableEntity {
        message: String,
        errors: Vec<FieldError>,
    },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn bad_request(message: impl Into<String>, errors: Vec<FieldError>) -> Self {
        Self::BadRequest {
            message: message.into(),
            errors,
        }
    }

    pub fn unprocessable(message: impl Into<String>, errors: Vec<FieldError>) -> Self {
        Self::UnprocessableEntity {
            message: message.into(),
            errors,
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn precondition_failed(message: impl Into<String>) -> Self {
        Self::PreconditionFailed(message.into())
    }

    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::NotImplemented(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable(message.into())
    }

    /// Runtime failure raised by a hook
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// HTTP status, or `None` for driver and internal failures
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Self::BadRequest { .. } => Some(StatusCode::BAD_REQUEST),
            Self::UnprocessableEntity { .. } => Some(StatusCode::UNPROCESSABLE_ENTITY),
            Self::Forbidden(_) => Some(StatusCode::FORBIDDEN),
            Self::NotFound(_) => Some(StatusCode::NOT_FOUND),
            Self::PreconditionFailed(_) => Some(StatusCode::PRECONDITION_FAILED),
            Self::NotImplemented(_) => Some(StatusCode::NOT_IMPLEMENTED),
            Self::ServiceUnavailable(_) => Some(StatusCode::SERVICE_UNAVAILABLE),
            Self::Driver(_) | Self::Internal(_) => None,
        }
    }

    pub fn is_http(&self) -> bool {
        self.status_code().is_some()
    }

    /// Message without the kind prefix
    pub fn message(&self) -> String {
        match self {
            Self::BadRequest { message, .. } | Self::UnprocessableEntity { message, .. } => {
                message.clone()
            }
            Self::Forbidden(m)
            | Self::NotFound(m)
            | Self::PreconditionFailed(m)
            | Self::NotImplemented(m)
            | Self::ServiceUnavailable(m)
            | Self::Internal(m) => m.clone(),
            Self::Driver(e) => e.to_string(),
        }
    }

    /// Field errors attached to the error, if any
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            Self::BadRequest { errors, .. } | Self::UnprocessableEntity { errors, .. } => errors,
            _ => &[],
        }
    }
}
