//! Store hooks
//!
//! The capability trait through which a resource adds domain behaviour to
//! the pipeline. Every method has a default, so a resource only overrides
//! what it needs.

use async_trait::async_trait;
use tracing::{error, warn};

use crate::driver::Record;
use crate::schema::FieldError;

use super::context::RequestContext;
use super::error::{StoreError, StoreResult};
use super::operation::Access;

/// Answer of the permission gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permission {
    pub granted: bool,
    /// Reported in the 403 body when denied
    pub message: Option<String>,
}

impl Permission {
    pub fn granted() -> Self {
        Self {
            granted: true,
            message: None,
        }
    }

    pub fn denied(message: impl Into<String>) -> Self {
        Self {
            granted: false,
            message: Some(message.into()),
        }
    }
}

/// Domain hooks invoked by the pipeline
#[async_trait]
pub trait StoreHooks: Send + Sync {
    /// Runs before schema validation; may rewrite the context
    async fn before_validate(&self, _ctx: &mut RequestContext) -> StoreResult<()> {
        Ok(())
    }

    /// Domain validation; errors are added to the schema errors
    async fn validate(&self, _ctx: &RequestContext) -> StoreResult<Vec<FieldError>> {
        Ok(Vec::new())
    }

    /// Permission gate, asked exactly once per call
    async fn check_permissions(
        &self,
        _ctx: &RequestContext,
        _access: Access,
    ) -> StoreResult<Permission> {
        Ok(Permission::granted())
    }

    /// Derive the public record from a raw driver row
    async fn extrapolate_doc(&self, _ctx: &RequestContext, doc: Record) -> StoreResult<Record> {
        Ok(doc)
    }

    /// Last chance to reshape a record before it is returned
    async fn prepare_before_send(&self, _ctx: &RequestContext, doc: Record) -> StoreResult<Record> {
        Ok(doc)
    }

    async fn after_post(&self, _ctx: &RequestContext, _record: &Record) -> StoreResult<()> {
        Ok(())
    }

    async fn after_put_new(&self, _ctx: &RequestContext, _record: &Record) -> StoreResult<()> {
        Ok(())
    }

    async fn after_put_existing(
        &self,
        _ctx: &RequestContext,
        _before: &Record,
        _after: &Record,
    ) -> StoreResult<()> {
        Ok(())
    }

    async fn after_get(&self, _ctx: &RequestContext, _record: &Record) -> StoreResult<()> {
        Ok(())
    }

    async fn after_get_query(&self, _ctx: &RequestContext, _rows: &[Record]) -> StoreResult<()> {
        Ok(())
    }

    async fn after_delete(&self, _ctx: &RequestContext, _record: &Record) -> StoreResult<()> {
        Ok(())
    }

    async fn after_post_append(
        &self,
        _ctx: &RequestContext,
        _before: &Record,
        _after: &Record,
    ) -> StoreResult<()> {
        Ok(())
    }

    /// Called with every error leaving the pipeline
    fn log_error(&self, store: &str, ctx: &RequestContext, err: &StoreError) {
        match err.status_code() {
            Some(status) => warn!(
                store,
                request_id = %ctx.request_id,
                status = status.as_u16(),
                error = %err,
                "store call failed"
            ),
            None => error!(
                store,
                request_id = %ctx.request_id,
                error = %err,
                "store call failed"
            ),
        }
    }
}

/// Hooks with every default in place
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHooks;

impl StoreHooks for DefaultHooks {}
