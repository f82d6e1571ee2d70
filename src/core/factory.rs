//! Generic resource access
//!
//! [`ResourceFactory`] implements the six operations every resource is served
//! through: `create_one`, `get_all`, `get_one`, `update_one`, `delete_one`
//! and `get_all_aggregate`. It is stateless between calls; the store owns the
//! documents and the descriptor owns the per-resource behavior.
//!
//! Every operation takes the [`RequestContext`] of the call, so the caller's
//! privileges and language are explicit inputs rather than request globals.

use crate::core::context::{RequestContext, Scope};
use crate::core::document::{CREATED_AT, ID_KEY, UPDATED_AT, json_eq};
use crate::core::error::{ApiError, ApiResult, ResourceError, ValidationError};
use crate::core::filter::{FilterPredicate, Scalar, compile};
use crate::core::hooks::{run_cleanups, run_side_effects};
use crate::core::locale::Language;
use crate::core::pipeline::{Projection, Stage};
use crate::core::populate::{populate, populate_all};
use crate::core::query::{PaginationMeta, QueryParams};
use crate::core::resource::{Resource, ResourceDescriptor, ResourceField, WritePhase};
use crate::core::store::{DocumentStore, FindOptions};
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use validator::Validate;

/// Success envelope
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub status: &'static str,
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationMeta>,
}

impl Envelope {
    pub fn data(data: Value) -> Self {
        Self {
            status: "success",
            data,
            pagination: None,
        }
    }

    pub fn page(data: Vec<Value>, pagination: PaginationMeta) -> Self {
        Self {
            status: "success",
            data: Value::Array(data),
            pagination: Some(pagination),
        }
    }
}

/// Envelope plus the HTTP status it is sent with
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: StatusCode,
    pub body: Envelope,
}

impl Reply {
    pub fn ok(body: Envelope) -> Self {
        Self {
            status: StatusCode::OK,
            body,
        }
    }

    pub fn created(body: Envelope) -> Self {
        Self {
            status: StatusCode::CREATED,
            body,
        }
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Which document `get_one` looks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    pub field: String,
    pub value: String,
}

impl Lookup {
    /// By storage id
    pub fn id(value: impl Into<String>) -> Self {
        Self::by(ID_KEY, value)
    }

    /// By another unique field (username, slug, ...)
    pub fn by(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Builds the final projection of an aggregation for a language
pub type ProjectionBuilder = Arc<dyn Fn(Option<Language>) -> Projection + Send + Sync>;

/// Stages of an aggregated listing
///
/// The final pipeline is `leading`, then the compiled search/filter match,
/// then `stages`, then the projection for the caller's language.
#[derive(Clone)]
pub struct AggregatePlan {
    pub leading: Vec<Stage>,
    pub stages: Vec<Stage>,
    pub projection: ProjectionBuilder,
}

impl AggregatePlan {
    pub fn new(projection: impl Fn(Option<Language>) -> Projection + Send + Sync + 'static) -> Self {
        Self {
            leading: Vec::new(),
            stages: Vec::new(),
            projection: Arc::new(projection),
        }
    }

    /// Stage run before the match (builder style)
    pub fn lead(mut self, stage: Stage) -> Self {
        self.leading.push(stage);
        self
    }

    /// Stage run after the match (builder style)
    pub fn then(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Full pipeline for a match and a language
    pub fn pipeline(&self, filter: FilterPredicate, language: Option<Language>) -> Vec<Stage> {
        let mut stages = self.leading.clone();
        stages.push(Stage::Match(filter));
        stages.extend(self.stages.iter().cloned());
        stages.push(Stage::Project((self.projection)(language)));
        stages
    }
}

/// Serves one resource type over a document store
pub struct ResourceFactory<R: Resource> {
    store: Arc<dyn DocumentStore>,
    descriptor: ResourceDescriptor<R>,
}

impl<R: Resource> Clone for ResourceFactory<R> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            descriptor: self.descriptor.clone(),
        }
    }
}

impl<R: Resource> ResourceFactory<R> {
    pub fn new(store: Arc<dyn DocumentStore>, descriptor: ResourceDescriptor<R>) -> Self {
        Self { store, descriptor }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn descriptor(&self) -> &ResourceDescriptor<R> {
        &self.descriptor
    }

    /// Declare the descriptor's unique fields to the store
    pub async fn ensure_indexes(&self) -> ApiResult<()> {
        for field in &self.descriptor.unique_fields {
            self.store.ensure_unique(R::COLLECTION, field).await?;
        }
        Ok(())
    }

    /// Create a document from a request body (201)
    pub async fn create_one(
        &self,
        context: &RequestContext,
        body: Map<String, Value>,
        scope: &Scope,
    ) -> ApiResult<Reply> {
        tracing::debug!(resource = R::NAME, caller = context.auth.kind_label(), "create_one");

        let mut body = self.descriptor.write_policy.filter(body, context.is_admin());
        body.extend(scope.assignments.clone());

        let resource = read_resource::<R>(Value::Object(body))?;
        let stored = self.insert(resource).await?;

        run_side_effects(R::NAME, &self.descriptor.after_create, &stored).await;

        let data = self.present(context, stored).await?;
        Ok(Reply::created(Envelope::data(data)))
    }

    /// Store a new document built by the server itself
    ///
    /// Derived fields are computed and timestamps set, but no hooks run.
    pub async fn insert(&self, mut resource: R) -> ApiResult<Value> {
        resource.prepare(WritePhase::Create);

        let now = timestamp();
        let mut document = write_document(&resource)?;
        document.insert(ID_KEY.to_string(), Value::String(resource.new_id()));
        document.insert(CREATED_AT.to_string(), Value::String(now.clone()));
        document.insert(UPDATED_AT.to_string(), Value::String(now));

        Ok(self
            .store
            .insert(R::COLLECTION, Value::Object(document))
            .await?)
    }

    /// One page of documents plus pagination metadata
    pub async fn get_all(
        &self,
        context: &RequestContext,
        params: &QueryParams,
        scope: &Scope,
    ) -> ApiResult<Reply> {
        tracing::debug!(
            resource = R::NAME,
            caller = context.auth.kind_label(),
            page = params.page,
            limit = params.limit,
            "get_all"
        );

        let filter = self.list_filter(context, params, scope);

        // page and count use the very same predicate
        let documents = self
            .store
            .find(
                R::COLLECTION,
                &filter,
                &FindOptions::page(params.skip(), params.limit),
            )
            .await?;
        let total = self.store.count(R::COLLECTION, &filter).await?;

        let documents = populate_all(self.store.as_ref(), documents, &self.descriptor.populate).await?;
        let view = context.view();
        let data = documents
            .iter()
            .map(|document| self.descriptor.projector.project(document, &view))
            .collect();

        Ok(Reply::ok(Envelope::page(
            data,
            PaginationMeta::new(params.page, params.limit, total),
        )))
    }

    /// One document by id or by another unique field
    pub async fn get_one(
        &self,
        context: &RequestContext,
        lookup: &Lookup,
        scope: &Scope,
    ) -> ApiResult<Reply> {
        tracing::debug!(
            resource = R::NAME,
            caller = context.auth.kind_label(),
            field = %lookup.field,
            "get_one"
        );

        let mut filter = FilterPredicate::eq(lookup.field.clone(), Scalar::Text(lookup.value.clone()));
        if !context.is_admin() {
            filter = and_all(filter, &self.descriptor.user_filters);
        }
        filter = and_all(filter, &scope.constraints);

        let document = self
            .store
            .find_one(R::COLLECTION, &filter)
            .await?
            .ok_or_else(|| self.not_found(&lookup.value))?;

        let data = self.present(context, document).await?;
        Ok(Reply::ok(Envelope::data(data)))
    }

    /// Apply a partial update and return the updated document
    ///
    /// The body is merged over the stored document to validate it and derive
    /// computed fields, but only the fields whose value changed are written.
    /// The write is conditioned on the same target as the read, so concurrent
    /// updates of different fields both survive and scope constraints hold at
    /// write time.
    pub async fn update_one(
        &self,
        context: &RequestContext,
        id: &str,
        body: Map<String, Value>,
        scope: &Scope,
    ) -> ApiResult<Reply> {
        tracing::debug!(resource = R::NAME, caller = context.auth.kind_label(), id, "update_one");

        let target = and_all(FilterPredicate::id(id), &scope.constraints);
        let existing = match self.store.find_one(R::COLLECTION, &target).await? {
            Some(Value::Object(map)) => map,
            Some(_) => Map::new(),
            None => return Err(self.not_found(id)),
        };

        let mut body = self.descriptor.write_policy.filter(body, context.is_admin());
        body.extend(scope.assignments.clone());

        let mut merged = existing.clone();
        merged.extend(body);

        let mut resource = read_resource::<R>(Value::Object(merged))?;
        resource.prepare(WritePhase::Update);

        let (mut set, unset) = changes::<R>(&existing, write_document(&resource)?);
        set.insert(UPDATED_AT.to_string(), Value::String(timestamp()));

        let stored = self
            .store
            .update_fields(R::COLLECTION, &target, set, &unset)
            .await?
            .ok_or_else(|| self.not_found(id))?;

        run_side_effects(R::NAME, &self.descriptor.after_update, &stored).await;

        let data = self.present(context, stored).await?;
        Ok(Reply::ok(Envelope::data(data)))
    }

    /// Remove a document, then run the cleanups
    ///
    /// Cleanup failures are logged and the deletion still succeeds.
    pub async fn delete_one(
        &self,
        context: &RequestContext,
        id: &str,
        scope: &Scope,
    ) -> ApiResult<Reply> {
        tracing::debug!(resource = R::NAME, caller = context.auth.kind_label(), id, "delete_one");

        let target = and_all(FilterPredicate::id(id), &scope.constraints);
        let removed = self
            .store
            .delete_one(R::COLLECTION, &target)
            .await?
            .ok_or_else(|| self.not_found(id))?;

        run_cleanups(R::NAME, &self.descriptor.on_delete, &removed).await;

        Ok(Reply::ok(Envelope::data(json!({}))))
    }

    /// Paginated listing through an aggregation pipeline
    ///
    /// Documents come out of the plan's projection already shaped for the
    /// caller, so the descriptor's projector is not applied.
    pub async fn get_all_aggregate(
        &self,
        context: &RequestContext,
        params: &QueryParams,
        plan: &AggregatePlan,
    ) -> ApiResult<Reply> {
        tracing::debug!(
            resource = R::NAME,
            caller = context.auth.kind_label(),
            page = params.page,
            limit = params.limit,
            "get_all_aggregate"
        );

        let filter = self.list_filter(context, params, &Scope::new());
        let stages = plan.pipeline(filter, context.view().language);

        let page = self
            .store
            .aggregate_page(R::COLLECTION, &stages, params.skip(), params.limit)
            .await?;

        Ok(Reply::ok(Envelope::page(
            page.documents,
            PaginationMeta::new(params.page, params.limit, page.total),
        )))
    }

    fn list_filter(&self, context: &RequestContext, params: &QueryParams, scope: &Scope) -> FilterPredicate {
        let mut compiled = compile(params, &self.descriptor.search_fields);
        if !context.is_admin() {
            compiled = compiled.with_user_filters(&self.descriptor.user_filters);
        }
        compiled.with_user_filters(&scope.constraints).into_predicate()
    }

    async fn present(&self, context: &RequestContext, document: Value) -> ApiResult<Value> {
        let document = populate(self.store.as_ref(), document, &self.descriptor.populate).await?;
        Ok(self.descriptor.projector.project(&document, &context.view()))
    }

    fn not_found(&self, key: &str) -> ApiError {
        ResourceError::NotFound {
            resource: R::NAME.to_string(),
            key: key.to_string(),
        }
        .into()
    }
}

fn and_all(filter: FilterPredicate, constraints: &[(String, Scalar)]) -> FilterPredicate {
    constraints.iter().fold(filter, |acc, (field, value)| {
        acc.and(FilterPredicate::eq(field.clone(), value.clone()))
    })
}

/// Fields of `updated` that differ from `existing`, and resource fields it dropped
fn changes<R: Resource>(
    existing: &Map<String, Value>,
    updated: Map<String, Value>,
) -> (Map<String, Value>, Vec<String>) {
    let unset = existing
        .keys()
        .filter(|key| R::Field::from_name(key).is_some() && !updated.contains_key(*key))
        .cloned()
        .collect();

    let set = updated
        .into_iter()
        .filter(|(key, value)| !existing.get(key).is_some_and(|old| json_eq(old, value)))
        .collect();

    (set, unset)
}

/// Deserialize and validate a body as a resource
fn read_resource<R: Resource>(body: Value) -> ApiResult<R> {
    let resource: R = serde_json::from_value(body)?;
    resource.validate()?;
    Ok(resource)
}

fn write_document<R: Resource>(resource: &R) -> ApiResult<Map<String, Value>> {
    match serde_json::to_value(resource)? {
        Value::Object(map) => Ok(map),
        _ => Err(ValidationError::Malformed {
            message: format!("{} does not serialize to an object", R::NAME),
        }
        .into()),
    }
}

/// Current time as stored in `createdAt`/`updatedAt`
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
