//! Authorization for the marketplace
//!
//! Credentials are verified by an [`AuthProvider`] once per request. The
//! resulting [`AuthContext`] is the only thing the rest of the system looks
//! at: route guards evaluate an [`AuthPolicy`] against it and the factory
//! asks it a single question, [`AuthContext::is_admin`].

use crate::core::error::RequestError;
use anyhow::Result;
use async_trait::async_trait;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Administrator roles of the admin panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminRole {
    SuperAdmin,
    Admin,
}

/// Kind of end-user account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserKind {
    Employee,
    Client,
}

impl UserKind {
    /// Field name used when a caller is bound into a body or query
    pub fn field(&self) -> &'static str {
        match self {
            UserKind::Employee => "employee",
            UserKind::Client => "client",
        }
    }
}

/// Authorization context extracted from a request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthContext {
    /// Admin panel operator
    Admin { admin_id: String, role: AdminRole },

    /// Marketplace user (employee or client)
    User { user_id: String, kind: UserKind },

    /// No authentication (public access)
    #[default]
    Anonymous,
}

impl AuthContext {
    /// Check if context represents an admin
    pub fn is_admin(&self) -> bool {
        matches!(self, AuthContext::Admin { .. })
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, AuthContext::Anonymous)
    }

    /// Get user_id if available
    pub fn user_id(&self) -> Option<&str> {
        match self {
            AuthContext::User { user_id, .. } => Some(user_id),
            _ => None,
        }
    }

    pub fn user_kind(&self) -> Option<UserKind> {
        match self {
            AuthContext::User { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Short label for logs
    pub fn kind_label(&self) -> &'static str {
        match self {
            AuthContext::Admin { .. } => "admin",
            AuthContext::User {
                kind: UserKind::Employee,
                ..
            } => "employee",
            AuthContext::User {
                kind: UserKind::Client,
                ..
            } => "client",
            AuthContext::Anonymous => "anonymous",
        }
    }
}

/// Authorization policy for a route
#[derive(Debug, Clone)]
pub enum AuthPolicy {
    /// Public access (no auth required)
    Public,

    /// Any authenticated caller
    Authenticated,

    /// Any administrator
    AdminOnly,

    /// Administrator with one of these roles
    AdminRoles(Vec<AdminRole>),

    /// End user of one of these kinds
    UserKinds(Vec<UserKind>),

    /// Combination of policies (AND)
    And(Vec<AuthPolicy>),

    /// Combination of policies (OR)
    Or(Vec<AuthPolicy>),

    /// Custom policy function
    Custom(fn(&AuthContext) -> bool),
}

impl AuthPolicy {
    /// Check if auth context satisfies this policy
    pub fn check(&self, context: &AuthContext) -> bool {
        match self {
            AuthPolicy::Public => true,

            AuthPolicy::Authenticated => !context.is_anonymous(),

            AuthPolicy::AdminOnly => context.is_admin(),

            AuthPolicy::AdminRoles(roles) => match context {
                AuthContext::Admin { role, .. } => roles.contains(role),
                _ => false,
            },

            AuthPolicy::UserKinds(kinds) => match context {
                AuthContext::User { kind, .. } => kinds.contains(kind),
                _ => false,
            },

            AuthPolicy::And(policies) => policies.iter().all(|p| p.check(context)),

            AuthPolicy::Or(policies) => policies.iter().any(|p| p.check(context)),

            AuthPolicy::Custom(f) => f(context),
        }
    }

    /// Check the policy and pick the rejection
    ///
    /// Anonymous callers get `Unauthorized`, authenticated callers that fail
    /// the policy get `Forbidden`.
    pub fn authorize(&self, context: &AuthContext) -> Result<(), RequestError> {
        if self.check(context) {
            Ok(())
        } else if context.is_anonymous() {
            Err(RequestError::Unauthorized)
        } else {
            Err(RequestError::Forbidden)
        }
    }
}

/// Trait for auth providers
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Resolve the caller from request headers
    ///
    /// Missing or unknown credentials resolve to [`AuthContext::Anonymous`];
    /// an `Err` means the provider itself failed.
    async fn authenticate(&self, headers: &HeaderMap) -> Result<AuthContext>;
}

/// Default no-auth provider (for development)
pub struct NoAuthProvider;

#[async_trait]
impl AuthProvider for NoAuthProvider {
    async fn authenticate(&self, _headers: &HeaderMap) -> Result<AuthContext> {
        Ok(AuthContext::Anonymous)
    }
}

/// Bearer-token table, loaded from configuration
#[derive(Debug, Clone, Default)]
pub struct StaticTokenProvider {
    tokens: HashMap<String, AuthContext>,
}

impl StaticTokenProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token (builder style)
    pub fn with_token(mut self, token: impl Into<String>, context: AuthContext) -> Self {
        self.tokens.insert(token.into(), context);
        self
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl AuthProvider for StaticTokenProvider {
    async fn authenticate(&self, headers: &HeaderMap) -> Result<AuthContext> {
        let token = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim);

        Ok(token
            .and_then(|t| self.tokens.get(t))
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn employee() -> AuthContext {
        AuthContext::User {
            user_id: "u-1".to_string(),
            kind: UserKind::Employee,
        }
    }

    fn client() -> AuthContext {
        AuthContext::User {
            user_id: "u-2".to_string(),
            kind: UserKind::Client,
        }
    }

    fn super_admin() -> AuthContext {
        AuthContext::Admin {
            admin_id: "a-1".to_string(),
            role: AdminRole::SuperAdmin,
        }
    }

    #[test]
    fn test_is_admin_predicate() {
        assert!(super_admin().is_admin());
        assert!(!employee().is_admin());
        assert!(!AuthContext::Anonymous.is_admin());
    }

    #[test]
    fn test_policy_check() {
        assert!(AuthPolicy::Public.check(&AuthContext::Anonymous));
        assert!(!AuthPolicy::Authenticated.check(&AuthContext::Anonymous));
        assert!(AuthPolicy::Authenticated.check(&client()));
        assert!(AuthPolicy::AdminOnly.check(&super_admin()));
        assert!(!AuthPolicy::AdminOnly.check(&client()));
    }

    #[test]
    fn test_policy_check_roles_and_kinds() {
        let admin = AuthContext::Admin {
            admin_id: "a-2".to_string(),
            role: AdminRole::Admin,
        };
        assert!(!AuthPolicy::AdminRoles(vec![AdminRole::SuperAdmin]).check(&admin));
        assert!(AuthPolicy::AdminRoles(vec![AdminRole::SuperAdmin]).check(&super_admin()));

        let clients_only = AuthPolicy::UserKinds(vec![UserKind::Client]);
        assert!(clients_only.check(&client()));
        assert!(!clients_only.check(&employee()));
        assert!(!clients_only.check(&super_admin()));
    }

    #[test]
    fn test_policy_check_combinators() {
        let policy = AuthPolicy::Or(vec![
            AuthPolicy::AdminOnly,
            AuthPolicy::UserKinds(vec![UserKind::Employee]),
        ]);
        assert!(policy.check(&super_admin()));
        assert!(policy.check(&employee()));
        assert!(!policy.check(&client()));

        let policy = AuthPolicy::And(vec![
            AuthPolicy::Authenticated,
            AuthPolicy::UserKinds(vec![UserKind::Client]),
        ]);
        assert!(policy.check(&client()));
        assert!(!policy.check(&AuthContext::Anonymous));
    }

    #[test]
    fn test_policy_check_custom() {
        fn has_user_id(ctx: &AuthContext) -> bool {
            ctx.user_id().is_some()
        }
        assert!(AuthPolicy::Custom(has_user_id).check(&client()));
        assert!(!AuthPolicy::Custom(has_user_id).check(&super_admin()));
    }

    #[test]
    fn test_authorize_distinguishes_401_and_403() {
        assert!(matches!(
            AuthPolicy::AdminOnly.authorize(&AuthContext::Anonymous),
            Err(RequestError::Unauthorized)
        ));
        assert!(matches!(
            AuthPolicy::AdminOnly.authorize(&client()),
            Err(RequestError::Forbidden)
        ));
        assert!(AuthPolicy::AdminOnly.authorize(&super_admin()).is_ok());
    }

    #[tokio::test]
    async fn test_no_auth_provider() {
        let ctx = NoAuthProvider
            .authenticate(&HeaderMap::new())
            .await
            .expect("authenticate should succeed");
        assert_eq!(ctx, AuthContext::Anonymous);
    }

    #[tokio::test]
    async fn test_static_token_provider() {
        let provider = StaticTokenProvider::new()
            .with_token("admin-token", super_admin())
            .with_token("client-token", client());
        assert_eq!(provider.len(), 2);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer client-token"));
        let ctx = provider.authenticate(&headers).await.expect("authenticate");
        assert_eq!(ctx, client());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer unknown"));
        let ctx = provider.authenticate(&headers).await.expect("authenticate");
        assert_eq!(ctx, AuthContext::Anonymous);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic admin-token"));
        let ctx = provider.authenticate(&headers).await.expect("authenticate");
        assert_eq!(ctx, AuthContext::Anonymous);
    }

    #[test]
    fn test_user_kind_field() {
        assert_eq!(UserKind::Employee.field(), "employee");
        assert_eq!(UserKind::Client.field(), "client");
        assert_eq!(employee().kind_label(), "employee");
    }
}
