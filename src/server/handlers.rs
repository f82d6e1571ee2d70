//! Handler builders
//!
//! [`Handlers`] wraps the factory operations of one resource into axum
//! [`MethodRouter`]s. Routes pick the operation they need and may bind the
//! calling user into the request ([`CallerBinding`]), narrow it with a fixed
//! [`Scope`], or rewrite the body first with a [`BodyResolver`].
//!
//! Every handler extracts the [`RequestContext`] set by the authentication
//! middleware, and every failure is rendered in the caller's language.

use crate::config::PaginationConfig;
use crate::core::context::{CallerBinding, JsonBody, RequestContext, Scope};
use crate::core::error::{ApiResult, LocalizedError};
use crate::core::factory::{AggregatePlan, Lookup, Reply, ResourceFactory};
use crate::core::query::QueryParams;
use crate::core::resource::Resource;
use async_trait::async_trait;
use axum::extract::{Path, Query};
use axum::routing::{MethodRouter, delete, get, patch, post};
use serde_json::{Map, Value};
use std::sync::Arc;

type Pairs = Query<Vec<(String, String)>>;
type HandlerResult = Result<Reply, LocalizedError>;

/// Rewrites a request body before it reaches the factory
///
/// Used by routes whose body names a related document indirectly, such as an
/// appointment addressed to an employee's username.
#[async_trait]
pub trait BodyResolver: Send + Sync {
    async fn resolve(
        &self,
        context: &RequestContext,
        body: Map<String, Value>,
    ) -> ApiResult<Map<String, Value>>;
}

/// Builds the HTTP handlers of one resource
pub struct Handlers<R: Resource> {
    factory: ResourceFactory<R>,
    pagination: PaginationConfig,
    binding: Option<CallerBinding>,
    scope: Scope,
    resolver: Option<Arc<dyn BodyResolver>>,
}

impl<R: Resource> Clone for Handlers<R> {
    fn clone(&self) -> Self {
        Self {
            factory: self.factory.clone(),
            pagination: self.pagination.clone(),
            binding: self.binding,
            scope: self.scope.clone(),
            resolver: self.resolver.clone(),
        }
    }
}

impl<R: Resource> Handlers<R> {
    pub fn new(factory: ResourceFactory<R>, pagination: PaginationConfig) -> Self {
        Self {
            factory,
            pagination,
            binding: None,
            scope: Scope::new(),
            resolver: None,
        }
    }

    pub fn factory(&self) -> &ResourceFactory<R> {
        &self.factory
    }

    /// Same handlers, with the caller bound into every request
    pub fn bound(&self, binding: CallerBinding) -> Self {
        let mut handlers = self.clone();
        handlers.binding = Some(binding);
        handlers
    }

    /// Same handlers, with fixed constraints and assignments
    pub fn scoped(&self, scope: Scope) -> Self {
        let mut handlers = self.clone();
        handlers.scope = scope;
        handlers
    }

    /// Same handlers, with bodies rewritten before creates and updates
    pub fn resolving(&self, resolver: Arc<dyn BodyResolver>) -> Self {
        let mut handlers = self.clone();
        handlers.resolver = Some(resolver);
        handlers
    }

    // ===== Route builders =====

    /// `POST`: create a document (201)
    pub fn create_one(&self) -> MethodRouter {
        let handlers = self.clone();
        post(move |context: RequestContext, JsonBody(body): JsonBody| {
            let handlers = handlers.clone();
            async move { handlers.create(context, body).await }
        })
    }

    /// `GET`: list documents
    pub fn get_all(&self) -> MethodRouter {
        let handlers = self.clone();
        get(move |context: RequestContext, Query(pairs): Pairs| {
            let handlers = handlers.clone();
            async move { handlers.list(context, pairs).await }
        })
    }

    /// `GET /{value}`: list documents whose `field` is the path segment
    pub fn get_all_matching(&self, field: &'static str) -> MethodRouter {
        let handlers = self.clone();
        get(
            move |context: RequestContext, Path(value): Path<String>, Query(pairs): Pairs| {
                let handlers = handlers.scoped(handlers.scope.clone().constrain(field, value));
                async move { handlers.list(context, pairs).await }
            },
        )
    }

    /// `GET`: list documents through an aggregation plan
    pub fn get_all_aggregate(&self, plan: AggregatePlan) -> MethodRouter {
        let handlers = self.clone();
        get(move |context: RequestContext, Query(pairs): Pairs| {
            let handlers = handlers.clone();
            let plan = plan.clone();
            async move { handlers.aggregate(context, pairs, &plan).await }
        })
    }

    /// `GET /{id}`: one document by storage id
    pub fn get_one(&self) -> MethodRouter {
        let handlers = self.clone();
        get(move |context: RequestContext, Path(id): Path<String>| {
            let handlers = handlers.clone();
            async move { handlers.show(context, Lookup::id(id)).await }
        })
    }

    /// `GET /{value}`: one document by another unique field
    pub fn get_one_by(&self, field: &'static str) -> MethodRouter {
        let handlers = self.clone();
        get(move |context: RequestContext, Path(value): Path<String>| {
            let handlers = handlers.clone();
            async move { handlers.show(context, Lookup::by(field, value)).await }
        })
    }

    /// `GET`: the caller's own document
    pub fn get_own(&self) -> MethodRouter {
        let handlers = self.clone();
        get(move |context: RequestContext| {
            let handlers = handlers.clone();
            async move {
                let id = own_id(&context)?;
                handlers.show(context, Lookup::id(id)).await
            }
        })
    }

    /// `PATCH /{id}`: partial update
    pub fn update_one(&self) -> MethodRouter {
        let handlers = self.clone();
        patch(
            move |context: RequestContext, Path(id): Path<String>, JsonBody(body): JsonBody| {
                let handlers = handlers.clone();
                async move { handlers.update(context, id, body).await }
            },
        )
    }

    /// `PATCH`: partial update of the caller's own document
    pub fn update_own(&self) -> MethodRouter {
        let handlers = self.clone();
        patch(move |context: RequestContext, JsonBody(body): JsonBody| {
            let handlers = handlers.clone();
            async move {
                let id = own_id(&context)?;
                handlers.update(context, id, body).await
            }
        })
    }

    /// `GET`: the document stored under a fixed id
    pub fn get_fixed(&self, id: &'static str) -> MethodRouter {
        let handlers = self.clone();
        get(move |context: RequestContext| {
            let handlers = handlers.clone();
            async move { handlers.show(context, Lookup::id(id)).await }
        })
    }

    /// `PATCH`: partial update of the document stored under a fixed id
    pub fn update_fixed(&self, id: &'static str) -> MethodRouter {
        let handlers = self.clone();
        patch(move |context: RequestContext, JsonBody(body): JsonBody| {
            let handlers = handlers.clone();
            async move { handlers.update(context, id.to_string(), body).await }
        })
    }

    /// `DELETE /{id}`
    pub fn delete_one(&self) -> MethodRouter {
        let handlers = self.clone();
        delete(move |context: RequestContext, Path(id): Path<String>| {
            let handlers = handlers.clone();
            async move { handlers.remove(context, id).await }
        })
    }

    // ===== Operations =====

    async fn create(&self, context: RequestContext, body: Map<String, Value>) -> HandlerResult {
        let scope = self.scope_for(&context)?;
        let body = self.resolve_body(&context, body).await?;
        self.factory
            .create_one(&context, body, &scope)
            .await
            .map_err(|e| context.localize(e))
    }

    async fn list(&self, context: RequestContext, pairs: Vec<(String, String)>) -> HandlerResult {
        let params = self.params(&context, pairs)?;
        let scope = self.scope_for(&context)?;
        self.factory
            .get_all(&context, &params, &scope)
            .await
            .map_err(|e| context.localize(e))
    }

    async fn aggregate(
        &self,
        context: RequestContext,
        pairs: Vec<(String, String)>,
        plan: &AggregatePlan,
    ) -> HandlerResult {
        let params = self.params(&context, pairs)?;
        self.factory
            .get_all_aggregate(&context, &params, plan)
            .await
            .map_err(|e| context.localize(e))
    }

    async fn show(&self, context: RequestContext, lookup: Lookup) -> HandlerResult {
        let scope = self.scope_for(&context)?;
        self.factory
            .get_one(&context, &lookup, &scope)
            .await
            .map_err(|e| context.localize(e))
    }

    async fn update(
        &self,
        context: RequestContext,
        id: String,
        body: Map<String, Value>,
    ) -> HandlerResult {
        let scope = self.scope_for(&context)?;
        let body = self.resolve_body(&context, body).await?;
        self.factory
            .update_one(&context, &id, body, &scope)
            .await
            .map_err(|e| context.localize(e))
    }

    async fn remove(&self, context: RequestContext, id: String) -> HandlerResult {
        let scope = self.scope_for(&context)?;
        self.factory
            .delete_one(&context, &id, &scope)
            .await
            .map_err(|e| context.localize(e))
    }

    // ===== Helpers =====

    fn scope_for(&self, context: &RequestContext) -> Result<Scope, LocalizedError> {
        match self.binding {
            Some(binding) => binding
                .bind(&context.auth, self.scope.clone())
                .map_err(|e| context.localize(e)),
            None => Ok(self.scope.clone()),
        }
    }

    fn params(
        &self,
        context: &RequestContext,
        pairs: Vec<(String, String)>,
    ) -> Result<QueryParams, LocalizedError> {
        QueryParams::from_pairs(pairs, &self.pagination).map_err(|e| context.localize(e))
    }

    async fn resolve_body(
        &self,
        context: &RequestContext,
        body: Map<String, Value>,
    ) -> Result<Map<String, Value>, LocalizedError> {
        match &self.resolver {
            Some(resolver) => resolver
                .resolve(context, body)
                .await
                .map_err(|e| context.localize(e)),
            None => Ok(body),
        }
    }
}

/// Id of the calling end user
fn own_id(context: &RequestContext) -> Result<String, LocalizedError> {
    CallerBinding::caller(&context.auth)
        .map(|(id, _)| id.to_string())
        .map_err(|e| context.localize(e))
}
