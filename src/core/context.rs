//! Per-request context passed into every factory call
//!
//! The authentication middleware builds one [`RequestContext`] per request
//! (caller plus resolved language) and stores it as a request extension.
//! Handlers extract it and hand it down by reference; nothing reads request
//! globals.

use crate::core::auth::{AuthContext, UserKind};
use crate::core::error::{ApiError, LocalizedError, RequestError};
use crate::core::filter::Scalar;
use crate::core::locale::{Language, resolve_language};
use crate::core::projection::View;
use axum::Json;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::header::ACCEPT_LANGUAGE;
use axum::http::request::Parts;
use serde_json::{Map, Value};
use std::convert::Infallible;

/// Caller and language of the current request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub auth: AuthContext,
    /// Language named by the request, if any
    pub language: Option<Language>,
    /// Language non-admins get when the request names none
    pub default_language: Language,
}

impl RequestContext {
    pub fn new(auth: AuthContext, language: Option<Language>, default_language: Language) -> Self {
        Self {
            auth,
            language,
            default_language,
        }
    }

    pub fn anonymous(language: Option<Language>) -> Self {
        Self::new(AuthContext::Anonymous, language, Language::Fr)
    }

    pub fn is_admin(&self) -> bool {
        self.auth.is_admin()
    }

    /// How documents are shaped for this caller
    ///
    /// Admins without a preference see both language variants; everyone else
    /// always gets a single language.
    pub fn view(&self) -> View {
        if self.is_admin() {
            View::admin(self.language)
        } else {
            View::public(self.language.unwrap_or(self.default_language))
        }
    }

    /// Bind an error to this caller for rendering
    pub fn localize(&self, error: impl Into<ApiError>) -> LocalizedError {
        error.into().localize(self.language, self.is_admin())
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(context) = parts.extensions.get::<RequestContext>() {
            return Ok(context.clone());
        }

        // routes mounted without the auth layer still get a language
        let header = parts
            .headers
            .get(ACCEPT_LANGUAGE)
            .and_then(|value| value.to_str().ok());
        Ok(RequestContext::anonymous(resolve_language(header)))
    }
}

/// JSON object request body
///
/// Anything that is not a JSON object is rejected with a localized
/// `INVALID_BODY` error.
#[derive(Debug, Clone, Default)]
pub struct JsonBody(pub Map<String, Value>);

impl<S> FromRequest<S> for JsonBody
where
    S: Send + Sync,
{
    type Rejection = LocalizedError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let (mut parts, body) = req.into_parts();
        let context = match RequestContext::from_request_parts(&mut parts, state).await {
            Ok(context) => context,
            Err(never) => match never {},
        };

        let req = Request::from_parts(parts, body);
        match Json::<Value>::from_request(req, state).await {
            Ok(Json(Value::Object(map))) => Ok(JsonBody(map)),
            Ok(Json(_)) => Err(context.localize(RequestError::InvalidBody {
                message: "expected a JSON object".to_string(),
            })),
            Err(rejection) => Err(context.localize(RequestError::InvalidBody {
                message: rejection.body_text(),
            })),
        }
    }
}

/// Extra constraints and assignments a route adds to a factory call
///
/// Constraints narrow which documents a read, update or delete may touch.
/// Assignments are written into the body after the write policy ran, so a
/// route can set fields the caller may not set themselves.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    pub constraints: Vec<(String, Scalar)>,
    pub assignments: Map<String, Value>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn constrain(mut self, field: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.constraints.push((field.into(), value.into()));
        self
    }

    pub fn assign(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.assignments.insert(field.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty() && self.assignments.is_empty()
    }
}

/// How a route binds the calling user into the request
///
/// Only end users can be bound: anonymous callers get `Unauthorized`,
/// administrators get `Forbidden`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerBinding {
    /// The caller's id replaces the path id (`/users/me`)
    Path,

    /// The caller's id is written as `employee` or `client`, by kind
    BodyByKind,

    /// Reads are restricted to `employee` or `client` equal to the caller, by kind
    QueryByKind,

    /// The caller's id is written into this field
    Body(&'static str),

    /// Reads are restricted to documents whose field is the caller
    Query(&'static str),
}

impl CallerBinding {
    /// Id and kind of the calling user
    pub fn caller(auth: &AuthContext) -> Result<(&str, UserKind), RequestError> {
        match auth {
            AuthContext::User { user_id, kind } => Ok((user_id.as_str(), *kind)),
            AuthContext::Anonymous => Err(RequestError::Unauthorized),
            AuthContext::Admin { .. } => Err(RequestError::Forbidden),
        }
    }

    /// Add this binding to a scope
    ///
    /// `Path` leaves the scope untouched; the caller's id is the target id.
    pub fn bind(&self, auth: &AuthContext, scope: Scope) -> Result<Scope, RequestError> {
        let (user_id, kind) = Self::caller(auth)?;
        Ok(match self {
            CallerBinding::Path => scope,
            CallerBinding::BodyByKind => scope.assign(kind.field(), user_id),
            CallerBinding::QueryByKind => scope.constrain(kind.field(), user_id),
            CallerBinding::Body(field) => scope.assign(*field, user_id),
            CallerBinding::Query(field) => scope.constrain(*field, user_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::AdminRole;
    use serde_json::json;

    fn client() -> AuthContext {
        AuthContext::User {
            user_id: "c-1".to_string(),
            kind: UserKind::Client,
        }
    }

    fn admin() -> AuthContext {
        AuthContext::Admin {
            admin_id: "a-1".to_string(),
            role: AdminRole::Admin,
        }
    }

    #[test]
    fn test_view_for_users_always_has_a_language() {
        let context = RequestContext::new(client(), None, Language::Ar);
        assert_eq!(context.view(), View::public(Language::Ar));

        let context = RequestContext::new(client(), Some(Language::Fr), Language::Ar);
        assert_eq!(context.view(), View::public(Language::Fr));
    }

    #[test]
    fn test_view_for_admins_keeps_missing_language() {
        let context = RequestContext::new(admin(), None, Language::Fr);
        assert_eq!(context.view(), View::admin(None));
    }

    #[test]
    fn test_binding_by_kind() {
        let scope = CallerBinding::BodyByKind.bind(&client(), Scope::new()).unwrap();
        assert_eq!(scope.assignments.get("client"), Some(&json!("c-1")));

        let scope = CallerBinding::QueryByKind.bind(&client(), Scope::new()).unwrap();
        assert_eq!(
            scope.constraints,
            vec![("client".to_string(), Scalar::from("c-1"))]
        );
    }

    #[test]
    fn test_binding_named_field() {
        let scope = CallerBinding::Body("rater")
            .bind(&client(), Scope::new())
            .unwrap();
        assert_eq!(scope.assignments.get("rater"), Some(&json!("c-1")));
    }

    #[test]
    fn test_binding_rejects_non_users() {
        assert!(matches!(
            CallerBinding::Path.bind(&AuthContext::Anonymous, Scope::new()),
            Err(RequestError::Unauthorized)
        ));
        assert!(matches!(
            CallerBinding::Query("notifiable").bind(&admin(), Scope::new()),
            Err(RequestError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn test_extractor_without_middleware_is_anonymous() {
        let request = axum::http::Request::builder()
            .header(ACCEPT_LANGUAGE, "ar")
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();
        let context = RequestContext::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(context.auth, AuthContext::Anonymous);
        assert_eq!(context.language, Some(Language::Ar));
    }
}
