//! Store Pipeline
//!
//! One `Store` per resource. Every verb runs the same ordered stages:
//! VerbEnabled → params → body enrichment → fetch existing → overwrite
//! precondition → before-validate hook → schema validation → permission →
//! surface validation errors → cleanup → driver → re-extrapolate → after
//! hook → prepare/echo. The first failing stage ends the call, and every
//! failure leaves through [`Store::execute`].

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::try_join_all;
use serde_json::Value;
use tracing::debug;

use crate::driver::{Condition, Driver, Record, Selector, SortKey};
use crate::schema::{
    search_validation_schema, FieldError, FieldType, SchemaValidator, SimpleValidator,
    ValidateOptions,
};

use super::context::{Range, RequestContext};
use super::descriptor::ResourceDescriptor;
use super::error::{StoreError, StoreResult};
use super::hooks::{DefaultHooks, StoreHooks};
use super::operation::{Access, Outcome, Overwrite, Verb};

/// A resource bound to its driver, validator and hooks
pub struct Store {
    descriptor: ResourceDescriptor,
    driver: Arc<dyn Driver>,
    validator: Arc<dyn SchemaValidator>,
    hooks: Arc<dyn StoreHooks>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    /// Create a store with the simple validator and default hooks
    pub fn new(descriptor: ResourceDescriptor, driver: Arc<dyn Driver>) -> Self {
        Self {
            descriptor,
            driver,
            validator: Arc::new(SimpleValidator),
            hooks: Arc::new(DefaultHooks),
        }
    }

    pub fn with_hooks(mut self, hooks: impl StoreHooks + 'static) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    pub fn with_validator(mut self, validator: impl SchemaValidator + 'static) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    pub async fn post(&self, ctx: RequestContext) -> StoreResult<Outcome> {
        self.execute(Verb::Post, ctx).await
    }

    pub async fn put(&self, ctx: RequestContext) -> StoreResult<Outcome> {
        self.execute(Verb::Put, ctx).await
    }

    pub async fn get(&self, ctx: RequestContext) -> StoreResult<Outcome> {
        self.execute(Verb::Get, ctx).await
    }

    pub async fn get_query(&self, ctx: RequestContext) -> StoreResult<Outcome> {
        self.execute(Verb::GetQuery, ctx).await
    }

    pub async fn delete(&self, ctx: RequestContext) -> StoreResult<Outcome> {
        self.execute(Verb::Delete, ctx).await
    }

    pub async fn post_append(&self, ctx: RequestContext) -> StoreResult<Outcome> {
        self.execute(Verb::PostAppend, ctx).await
    }

    /// Get a single field of a record. `ctx.options.field` names the field.
    pub async fn get_field(&self, ctx: RequestContext) -> StoreResult<Value> {
        let field = ctx
            .options
            .field
            .clone()
            .ok_or_else(|| StoreError::not_found("No field requested"))?;
        let outcome = self.execute(Verb::Get, ctx).await?;
        Ok(outcome
            .into_record()
            .and_then(|mut record| record.remove(&field))
            .unwrap_or(Value::Null))
    }

    /// Run `verb` through the pipeline. The single exit for every call.
    pub async fn execute(&self, verb: Verb, mut ctx: RequestContext) -> StoreResult<Outcome> {
        if let Some(ms) = self.descriptor.artificial_delay_ms {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }

        let result = self.run(verb, &mut ctx).await;

        match &result {
            Ok(_) => debug!(
                store = %self.descriptor.name,
                verb = verb.name(),
                request_id = %ctx.request_id,
                remote = ctx.remote,
                elapsed_ms = ctx.elapsed_ms() as u64,
                "store call completed"
            ),
            Err(err) => self.report_error(&ctx, err),
        }

        result
    }

    /// Hand an error to the `log_error` hook. Errors raised by the
    /// transport before the pipeline runs go through here as well.
    pub fn report_error(&self, ctx: &RequestContext, err: &StoreError) {
        self.hooks.log_error(&self.descriptor.name, ctx, err);
    }

    async fn run(&self, verb: Verb, ctx: &mut RequestContext) -> StoreResult<Outcome> {
        self.check_enabled(verb, ctx)?;
        self.check_field_scope(verb, ctx)?;
        self.validate_params(verb, ctx).await?;

        if verb.carries_body() {
            self.enrich_body(verb, ctx);
        }

        // Put branches on absence; every other fetching verb needs the record
        if verb.fetches_existing() && !self.fetch_existing(ctx).await? && verb != Verb::Put {
            return Err(self.not_found(ctx));
        }

        match verb {
            Verb::Post => self.run_post(ctx).await,
            Verb::Put => self.run_put(ctx).await,
            Verb::Get => self.run_get(ctx).await,
            Verb::GetQuery => self.run_get_query(ctx).await,
            Verb::Delete => self.run_delete(ctx).await,
            Verb::PostAppend => self.run_post_append(ctx).await,
        }
    }

    // ---- shared stages ----

    fn check_enabled(&self, verb: Verb, ctx: &RequestContext) -> StoreResult<()> {
        let handles = &self.descriptor.handles;
        let enabled = match verb {
            Verb::Post => handles.post,
            Verb::Put => handles.put,
            Verb::Get => handles.get,
            Verb::GetQuery => handles.get_query,
            Verb::Delete => handles.delete,
            Verb::PostAppend => handles.post_append,
        };

        if !enabled && ctx.remote {
            return Err(StoreError::not_implemented(format!(
                "Store '{}' does not handle {}",
                self.descriptor.name,
                verb.name()
            )));
        }
        Ok(())
    }

    fn check_field_scope(&self, verb: Verb, ctx: &RequestContext) -> StoreResult<()> {
        match &ctx.options.field {
            Some(field) if matches!(verb, Verb::Get | Verb::Put) => {
                if self.descriptor.schema.contains(field) {
                    Ok(())
                } else {
                    Err(StoreError::not_found(format!(
                        "Field '{}' not found in store '{}'",
                        field, self.descriptor.name
                    )))
                }
            }
            _ => Ok(()),
        }
    }

    /// Param ids checked for `verb`: Post and GetQuery skip the last one
    fn checked_param_ids(&self, verb: Verb) -> Vec<String> {
        let mut ids = self.descriptor.param_ids();
        if matches!(verb, Verb::Post | Verb::GetQuery) {
            ids.pop();
        }
        ids
    }

    async fn validate_params(&self, verb: Verb, ctx: &mut RequestContext) -> StoreResult<()> {
        let ids = self.checked_param_ids(verb);
        if ids.is_empty() {
            return Ok(());
        }

        let mut errors = Vec::new();
        let mut supplied = Record::new();
        for id in &ids {
            match ctx.params.get(id) {
                Some(value) if !value.is_null() => {
                    supplied.insert(id.clone(), value.clone());
                }
                _ => errors.push(FieldError::required(id.clone())),
            }
        }

        let schema = self.descriptor.schema.id_subset(&ids);
        let validated = self
            .validator
            .validate(&schema, supplied, &ValidateOptions::partial())
            .await;
        errors.extend(validated.errors);

        if !errors.is_empty() {
            return Err(StoreError::bad_request("Bad parameters", errors));
        }

        ctx.params.extend(validated.object);
        Ok(())
    }

    /// Validated param values overwrite the body's values for those keys
    fn enrich_body(&self, verb: Verb, ctx: &mut RequestContext) {
        for id in self.checked_param_ids(verb) {
            if let Some(value) = ctx.params.get(&id) {
                ctx.body.insert(id, value.clone());
            }
        }
    }

    /// Equality key built from every param id
    fn key(&self, ctx: &RequestContext) -> Record {
        self.descriptor
            .param_ids()
            .into_iter()
            .filter_map(|id| ctx.params.get(&id).cloned().map(|v| (id, v)))
            .collect()
    }

    /// Fetch the record addressed by the params. Returns whether it exists.
    async fn fetch_existing(&self, ctx: &mut RequestContext) -> StoreResult<bool> {
        let key = self.key(ctx);
        let mut rows = self.driver.fetch_by_key(&key).await?;

        if rows.len() > 1 {
            return Err(StoreError::service_unavailable(format!(
                "Multiple records found in store '{}' for selector {}",
                self.descriptor.name,
                Value::Object(key)
            )));
        }

        match rows.pop() {
            Some(row) => {
                ctx.full_doc = Some(row.clone());
                let record = self.hooks.extrapolate_doc(ctx, row).await?;
                ctx.record = Some(record);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn not_found(&self, ctx: &RequestContext) -> StoreError {
        StoreError::not_found(format!(
            "Record not found in store '{}' for selector {}",
            self.descriptor.name,
            Value::Object(self.key(ctx))
        ))
    }

    /// Param ids the schema does not declare; copied through validation
    fn undeclared_param_ids(&self) -> Vec<String> {
        self.descriptor
            .param_ids()
            .into_iter()
            .filter(|id| !self.descriptor.schema.contains(id))
            .collect()
    }

    async fn validate_body(&self, ctx: &mut RequestContext, options: ValidateOptions) -> StoreResult<()> {
        ctx.original_body = ctx.body.clone();
        let body = std::mem::take(&mut ctx.body);

        let validated = self
            .validator
            .validate(&self.descriptor.schema, body, &options)
            .await;
        ctx.body = validated.object;
        ctx.errors.extend(validated.errors);

        let domain_errors = self.hooks.validate(ctx).await?;
        ctx.errors.extend(domain_errors);
        Ok(())
    }

    async fn check_permissions(&self, ctx: &RequestContext, access: Access) -> StoreResult<()> {
        let permission = self.hooks.check_permissions(ctx, access).await?;
        if !permission.granted {
            return Err(StoreError::forbidden(
                permission.message.unwrap_or_else(|| "Forbidden".to_string()),
            ));
        }
        Ok(())
    }

    fn surface_errors(&self, ctx: &RequestContext) -> StoreResult<()> {
        if ctx.errors.is_empty() {
            return Ok(());
        }
        Err(StoreError::unprocessable(
            "Unprocessable entity",
            ctx.errors.clone(),
        ))
    }

    /// Strip fields that must never reach the driver
    fn cleanup(&self, ctx: &mut RequestContext) {
        for field in self.descriptor.schema.unsaved_fields() {
            ctx.body.remove(field);
        }
    }

    async fn echo(&self, ctx: &RequestContext, record: Record, enabled: bool) -> StoreResult<Option<Record>> {
        if !enabled {
            return Ok(None);
        }
        Ok(Some(self.hooks.prepare_before_send(ctx, record).await?))
    }

    // ---- verbs ----

    async fn run_post(&self, ctx: &mut RequestContext) -> StoreResult<Outcome> {
        self.hooks.before_validate(ctx).await?;

        let mut skip_fields = self.undeclared_param_ids();
        skip_fields.extend(self.descriptor.id_property());
        let options = ValidateOptions {
            skip_fields,
            ..ValidateOptions::default()
        };
        self.validate_body(ctx, options).await?;

        self.check_permissions(ctx, Access::Post).await?;
        self.surface_errors(ctx)?;
        self.cleanup(ctx);

        // Inserted ids always come from the driver
        if let Some(prop) = self.descriptor.id_property() {
            ctx.body.remove(&prop);
        }

        let stored = self
            .driver
            .insert(ctx.body.clone(), ctx.options.placement.as_ref())
            .await?;
        let record = self.hooks.extrapolate_doc(ctx, stored).await?;

        self.hooks.after_post(ctx, &record).await?;

        let id = self
            .descriptor
            .id_property()
            .and_then(|prop| record.get(&prop).cloned());
        let record = self.echo(ctx, record, self.descriptor.echo.after_post).await?;
        Ok(Outcome::Created { record, id })
    }

    async fn run_put(&self, ctx: &mut RequestContext) -> StoreResult<Outcome> {
        let exists = ctx.full_doc.is_some();
        let field_scoped = ctx.options.field.is_some();

        if !exists && field_scoped {
            return Err(self.not_found(ctx));
        }

        match (ctx.options.overwrite, exists) {
            (Some(Overwrite::Existing), false) => {
                return Err(StoreError::precondition_failed(
                    "If-Match: * given but the record does not exist",
                ))
            }
            (Some(Overwrite::New), true) => {
                return Err(StoreError::precondition_failed(
                    "If-None-Match: * given but the record already exists",
                ))
            }
            _ => {}
        }

        self.hooks.before_validate(ctx).await?;

        let options = ValidateOptions {
            only_object_values: field_scoped,
            skip_fields: self.undeclared_param_ids(),
            record: ctx.record.clone(),
            ..ValidateOptions::default()
        };
        self.validate_body(ctx, options).await?;

        let access = if exists {
            Access::PutExisting
        } else {
            Access::PutNew
        };
        self.check_permissions(ctx, access).await?;
        self.surface_errors(ctx)?;
        self.cleanup(ctx);

        let placement = ctx.options.placement.clone();

        if !exists {
            let stored = self.driver.insert(ctx.body.clone(), placement.as_ref()).await?;
            let record = self.hooks.extrapolate_doc(ctx, stored).await?;
            self.hooks.after_put_new(ctx, &record).await?;
            let record = self.echo(ctx, record, self.descriptor.echo.after_put).await?;
            return Ok(Outcome::Written {
                record,
                created: true,
            });
        }

        let existing = ctx.full_doc.clone().unwrap_or_default();
        let body = if field_scoped {
            let mut merged = existing;
            merged.extend(ctx.body.clone());
            merged
        } else {
            self.carry_over_required(ctx.body.clone(), &existing)
        };

        let key = self.key(ctx);
        let stored = self.driver.update(&key, body, placement.as_ref()).await?;
        let record = self.hooks.extrapolate_doc(ctx, stored).await?;

        let before = ctx.record.clone().unwrap_or_default();
        self.hooks.after_put_existing(ctx, &before, &record).await?;

        let record = self.echo(ctx, record, self.descriptor.echo.after_put).await?;
        Ok(Outcome::Written {
            record,
            created: false,
        })
    }

    /// Required fields the body omits keep their stored value
    fn carry_over_required(&self, mut body: Record, existing: &Record) -> Record {
        for (name, def) in self.descriptor.schema.fields() {
            if def.required && !def.do_not_save && !body.contains_key(name) {
                if let Some(value) = existing.get(name) {
                    body.insert(name.clone(), value.clone());
                }
            }
        }
        body
    }

    async fn run_get(&self, ctx: &mut RequestContext) -> StoreResult<Outcome> {
        self.hooks.before_validate(ctx).await?;
        self.check_permissions(ctx, Access::Get).await?;

        let record = ctx.record.clone().unwrap_or_default();
        self.hooks.after_get(ctx, &record).await?;

        let record = self.hooks.prepare_before_send(ctx, record).await?;
        Ok(Outcome::Fetched { record })
    }

    async fn run_delete(&self, ctx: &mut RequestContext) -> StoreResult<Outcome> {
        self.hooks.before_validate(ctx).await?;
        self.check_permissions(ctx, Access::Delete).await?;

        let key = self.key(ctx);
        self.driver.delete(&key).await?;

        let record = ctx.record.clone().unwrap_or_default();
        self.hooks.after_delete(ctx, &record).await?;

        let record = self.hooks.prepare_before_send(ctx, record).await?;
        Ok(Outcome::Deleted { record })
    }

    async fn run_post_append(&self, ctx: &mut RequestContext) -> StoreResult<Outcome> {
        self.hooks.before_validate(ctx).await?;

        let options = ValidateOptions {
            skip_fields: self.undeclared_param_ids(),
            ..ValidateOptions::partial()
        };
        self.validate_body(ctx, options).await?;

        self.check_permissions(ctx, Access::PostAppend).await?;
        self.surface_errors(ctx)?;
        self.cleanup(ctx);

        let mut merged = ctx.full_doc.clone().unwrap_or_default();
        for (name, value) in ctx.body.clone() {
            let is_array_field = self
                .descriptor
                .schema
                .get(&name)
                .is_some_and(|def| def.field_type == FieldType::Array);

            match (merged.get_mut(&name), value) {
                (Some(Value::Array(existing)), Value::Array(items)) if is_array_field => {
                    existing.extend(items);
                }
                (_, value) => {
                    merged.insert(name, value);
                }
            }
        }

        let key = self.key(ctx);
        let stored = self
            .driver
            .update(&key, merged, ctx.options.placement.as_ref())
            .await?;
        let record = self.hooks.extrapolate_doc(ctx, stored).await?;

        let before = ctx.record.clone().unwrap_or_default();
        self.hooks.after_post_append(ctx, &before, &record).await?;

        let record = self
            .echo(ctx, record, self.descriptor.echo.after_post_append)
            .await?;
        Ok(Outcome::Appended { record })
    }

    async fn run_get_query(&self, ctx: &mut RequestContext) -> StoreResult<Outcome> {
        self.hooks.before_validate(ctx).await?;

        let search = self.descriptor.effective_search_schema();

        if ctx.remote {
            ctx.options.conditions.retain(|name, _| search.contains_key(name));
        }

        let unknown: Vec<String> = ctx
            .options
            .conditions
            .keys()
            .filter(|name| !search.contains_key(*name))
            .cloned()
            .collect();
        let options = ValidateOptions {
            skip_fields: unknown,
            ..ValidateOptions::partial()
        };
        let conditions = std::mem::take(&mut ctx.options.conditions);
        let validated = self
            .validator
            .validate(&search_validation_schema(&search), conditions, &options)
            .await;
        ctx.options.conditions = validated.object;
        ctx.errors.extend(validated.errors);

        let domain_errors = self.hooks.validate(ctx).await?;
        ctx.errors.extend(domain_errors);

        self.check_permissions(ctx, Access::GetQuery).await?;
        self.surface_errors(ctx)?;

        let selector = self.selector(ctx);
        let skip = selector.skip;
        let page = self.driver.query(&selector).await?;

        let ctx_ref: &RequestContext = ctx;
        let rows = try_join_all(
            page.rows
                .into_iter()
                .map(|row| self.hooks.extrapolate_doc(ctx_ref, row)),
        )
        .await?;

        self.hooks.after_get_query(ctx_ref, &rows).await?;

        let rows = try_join_all(
            rows.into_iter()
                .map(|row| self.hooks.prepare_before_send(ctx_ref, row)),
        )
        .await?;

        Ok(Outcome::Page {
            total: rows.len(),
            skip,
            grand_total: page.grand_total,
            rows,
        })
    }

    /// Build the driver selector for a query
    fn selector(&self, ctx: &RequestContext) -> Selector {
        let search = self.descriptor.effective_search_schema();

        let mut conditions: Vec<Condition> = ctx
            .options
            .conditions
            .iter()
            .map(|(name, value)| match search.get(name) {
                Some(field) => Condition::new(
                    field.target.clone().unwrap_or_else(|| name.clone()),
                    field.operator,
                    value.clone(),
                ),
                None => Condition::eq(name.clone(), value.clone()),
            })
            .collect();

        for id in self.checked_param_ids(Verb::GetQuery) {
            if let Some(value) = ctx.params.get(&id) {
                conditions.push(Condition::eq(id, value.clone()));
            }
        }

        let requested = if ctx.options.sort.is_empty() {
            &self.descriptor.default_sort
        } else {
            &ctx.options.sort
        };
        let sort: Vec<SortKey> = requested
            .iter()
            .filter(|key| self.descriptor.schema.is_sortable(&key.field))
            .cloned()
            .collect();

        let range = ctx.options.ranges.unwrap_or(Range {
            skip: 0,
            limit: Some(self.descriptor.default_limit_on_queries),
        });
        let limit = range
            .limit
            .map(|limit| limit.min(self.descriptor.hard_limit_on_queries));

        Selector {
            conditions,
            sort,
            skip: range.skip,
            limit,
        }
    }
}
