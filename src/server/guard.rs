//! Authentication middleware and route guards
//!
//! [`authenticate`] runs once per request: it asks the [`AuthProvider`] who
//! is calling, resolves the language from `Accept-Language`, and stores the
//! resulting [`RequestContext`] as a request extension. Guards then check an
//! [`AuthPolicy`] against that context before the handler runs.

use crate::core::auth::{AuthPolicy, AuthProvider};
use crate::core::context::RequestContext;
use crate::core::error::ApiError;
use crate::core::locale::{Language, resolve_language};
use axum::Router;
use axum::extract::{Request, State};
use axum::http::header::ACCEPT_LANGUAGE;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::MethodRouter;
use std::sync::Arc;

/// State of the [`authenticate`] middleware
#[derive(Clone)]
pub struct Authenticator {
    provider: Arc<dyn AuthProvider>,
    default_language: Language,
}

impl Authenticator {
    pub fn new(provider: Arc<dyn AuthProvider>, default_language: Language) -> Self {
        Self {
            provider,
            default_language,
        }
    }
}

/// Build the request context and store it as an extension
///
/// Unknown or missing credentials make an anonymous caller; only a failing
/// provider aborts the request.
pub async fn authenticate(
    State(authenticator): State<Authenticator>,
    mut request: Request,
    next: Next,
) -> Response {
    let language = resolve_language(
        request
            .headers()
            .get(ACCEPT_LANGUAGE)
            .and_then(|value| value.to_str().ok()),
    );

    let auth = match authenticator.provider.authenticate(request.headers()).await {
        Ok(auth) => auth,
        Err(error) => {
            tracing::error!(%error, "auth provider failed");
            return ApiError::Internal(format!("authentication failed: {}", error))
                .localize(language, false)
                .into_response();
        }
    };

    tracing::trace!(caller = auth.kind_label(), "request authenticated");
    request.extensions_mut().insert(RequestContext::new(
        auth,
        language,
        authenticator.default_language,
    ));

    next.run(request).await
}

/// Reject callers that do not satisfy the policy
async fn require(
    State(policy): State<Arc<AuthPolicy>>,
    context: RequestContext,
    request: Request,
    next: Next,
) -> Response {
    match policy.authorize(&context.auth) {
        Ok(()) => next.run(request).await,
        Err(error) => {
            tracing::debug!(caller = context.auth.kind_label(), %error, "guard rejected request");
            context.localize(error).into_response()
        }
    }
}

/// Guard every route of a router
///
/// The router must already have its routes.
pub fn guarded(router: Router, policy: AuthPolicy) -> Router {
    router.route_layer(middleware::from_fn_with_state(Arc::new(policy), require))
}

/// Guard the methods of a single route
///
/// Lets one path mix public and protected methods:
/// `handlers.get_all().merge(guard(handlers.create_one(), admins))`.
pub fn guard(route: MethodRouter, policy: AuthPolicy) -> MethodRouter {
    route.route_layer(middleware::from_fn_with_state(Arc::new(policy), require))
}
