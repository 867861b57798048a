//! # Error Responder
//!
//! Shapes store errors into HTTP responses under the resource's chaining
//! policy. Errors the policy forwards become an [`UnhandledError`], which
//! the binding turns into a plain 500.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use crate::core::{ChainErrors, StoreError};
use crate::schema::FieldError;

/// Error response body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

impl From<&StoreError> for ErrorBody {
    fn from(err: &StoreError) -> Self {
        Self {
            message: err.message(),
            errors: err.field_errors().to_vec(),
        }
    }
}

/// An error forwarded to the transport's generic error channel
#[derive(Debug)]
pub struct UnhandledError(pub StoreError);

impl IntoResponse for UnhandledError {
    fn into_response(self) -> Response {
        error!(error = %self.0, "unhandled store error");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
    }
}

/// Shape `err` into a response, or forward it when the policy says so
pub fn respond_error(policy: ChainErrors, err: StoreError) -> Result<Response, UnhandledError> {
    match (policy, err.status_code()) {
        (ChainErrors::All, _) => Err(UnhandledError(err)),
        (ChainErrors::NonHttp, None) => Err(UnhandledError(err)),
        (_, Some(status)) => Ok(shape(status, &err)),
        (ChainErrors::None, None) => Ok(shape(StatusCode::SERVICE_UNAVAILABLE, &err)),
    }
}

fn shape(status: StatusCode, err: &StoreError) -> Response {
    (status, Json(ErrorBody::from(err))).into_response()
}
