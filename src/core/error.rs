//! Typed error handling for the marketplace API
//!
//! Every failure a handler can report is an [`ApiError`]. Each category
//! knows its HTTP status and a stable machine-readable code, and maps to a
//! [`Message`] so the response text can be rendered in the caller's language.
//!
//! # Error Categories
//!
//! - [`ResourceError`]: lookups that matched nothing
//! - [`ValidationError`]: rejected document content (field rules, duplicates)
//! - [`RequestError`]: malformed requests, authentication and authorization
//! - [`StorageError`]: backend failures
//! - [`HookError`]: failed side effects and cleanups (logged, never returned by
//!   the factory)
//! - [`ConfigError`]: configuration loading
//!
//! # Wire format
//!
//! ```json
//! { "status": "fail", "code": "DOCUMENT_NOT_FOUND", "message": "No documents found with that ID!" }
//! ```
//!
//! `status` is `fail` for 4xx responses and `error` for 5xx responses.

use crate::core::locale::{Language, Message};
use crate::core::store::StoreError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::fmt;
use validator::{ValidationErrors, ValidationErrorsKind};

/// The main error type of the API
#[derive(Debug)]
pub enum ApiError {
    /// Lookup errors (get, update, delete)
    Resource(ResourceError),

    /// Document content errors
    Validation(ValidationError),

    /// HTTP/Request errors
    Request(RequestError),

    /// Storage backend errors
    Storage(StorageError),

    /// Hook errors
    Hook(HookError),

    /// Configuration errors
    Config(ConfigError),

    /// Internal errors (should not happen in normal operation)
    Internal(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Resource(e) => write!(f, "{}", e),
            ApiError::Validation(e) => write!(f, "{}", e),
            ApiError::Request(e) => write!(f, "{}", e),
            ApiError::Storage(e) => write!(f, "{}", e),
            ApiError::Hook(e) => write!(f, "{}", e),
            ApiError::Config(e) => write!(f, "{}", e),
            ApiError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApiError::Resource(e) => Some(e),
            ApiError::Validation(e) => Some(e),
            ApiError::Request(e) => Some(e),
            ApiError::Storage(e) => Some(e),
            ApiError::Hook(e) => Some(e),
            ApiError::Config(e) => Some(e),
            ApiError::Internal(_) => None,
        }
    }
}

/// Error envelope sent to clients
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// `fail` for client errors, `error` for server errors
    pub status: &'static str,
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable message in the caller's language
    pub message: String,
}

impl ApiError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Resource(e) => e.status_code(),
            ApiError::Validation(e) => e.status_code(),
            ApiError::Request(e) => e.status_code(),
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Hook(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Resource(e) => e.error_code(),
            ApiError::Validation(e) => e.error_code(),
            ApiError::Request(e) => e.error_code(),
            ApiError::Storage(_) => "STORAGE_ERROR",
            ApiError::Hook(_) => "HOOK_FAILED",
            ApiError::Config(_) => "CONFIG_ERROR",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Catalog message for this error
    pub fn message(&self) -> Message {
        match self {
            ApiError::Resource(ResourceError::NotFound { .. }) => Message::DocumentNotFound,
            ApiError::Validation(ValidationError::Duplicate { field, .. }) => {
                Message::DuplicateValue {
                    field: field.clone(),
                }
            }
            ApiError::Validation(e) => Message::ValidationFailed {
                details: e.details(),
            },
            ApiError::Request(RequestError::RouteNotFound { path }) => {
                Message::RouteNotFound { path: path.clone() }
            }
            ApiError::Request(RequestError::InvalidQuery { message }) => Message::InvalidQuery {
                details: message.clone(),
            },
            ApiError::Request(RequestError::InvalidBody { message }) => Message::InvalidBody {
                details: message.clone(),
            },
            ApiError::Request(RequestError::Unauthorized) => Message::Unauthorized,
            ApiError::Request(RequestError::Forbidden) => Message::Forbidden,
            ApiError::Storage(_) | ApiError::Hook(_) | ApiError::Config(_) | ApiError::Internal(_) => {
                Message::InternalError
            }
        }
    }

    /// Whether the error comes from the server side (5xx)
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Build the wire envelope for a caller
    ///
    /// Server-side errors keep their internal description for administrators
    /// only; everyone else gets the generic catalog message.
    pub fn to_response(&self, language: Option<Language>, is_admin: bool) -> ErrorResponse {
        let message = if self.is_server_error() && is_admin {
            self.to_string()
        } else {
            self.message().text(language)
        };

        ErrorResponse {
            status: if self.is_server_error() { "error" } else { "fail" },
            code: self.error_code().to_string(),
            message,
        }
    }

    /// Attach the caller's language and privilege level for rendering
    pub fn localize(self, language: Option<Language>, is_admin: bool) -> LocalizedError {
        LocalizedError {
            error: self,
            language,
            is_admin,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.localize(None, false).into_response()
    }
}

/// An [`ApiError`] bound to the caller it will be rendered for
#[derive(Debug)]
pub struct LocalizedError {
    pub error: ApiError,
    pub language: Option<Language>,
    pub is_admin: bool,
}

impl IntoResponse for LocalizedError {
    fn into_response(self) -> Response {
        if self.error.is_server_error() {
            tracing::error!(code = self.error.error_code(), error = %self.error, "request failed");
        }

        let status = self.error.status_code();
        let body = Json(self.error.to_response(self.language, self.is_admin));
        (status, body).into_response()
    }
}

// =============================================================================
// Resource Errors
// =============================================================================

/// Errors related to document lookups
#[derive(Debug)]
pub enum ResourceError {
    /// No document matched the lookup
    NotFound { resource: String, key: String },
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::NotFound { resource, key } => {
                write!(f, "{} '{}' not found", resource, key)
            }
        }
    }
}

impl std::error::Error for ResourceError {}

impl ResourceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ResourceError::NotFound { .. } => StatusCode::NOT_FOUND,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ResourceError::NotFound { .. } => "DOCUMENT_NOT_FOUND",
        }
    }
}

impl From<ResourceError> for ApiError {
    fn from(err: ResourceError) -> Self {
        ApiError::Resource(err)
    }
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Errors related to document content
#[derive(Debug)]
pub enum ValidationError {
    /// One or more field rules failed
    Invalid(Vec<FieldValidationError>),

    /// The body could not be read as a document of this resource
    Malformed { message: String },

    /// A unique field already holds this value
    Duplicate { field: String, value: String },
}

/// A single field validation error
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ValidationError::Invalid(_) => StatusCode::BAD_REQUEST,
            ValidationError::Malformed { .. } => StatusCode::BAD_REQUEST,
            ValidationError::Duplicate { .. } => StatusCode::CONFLICT,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ValidationError::Invalid(_) => "VALIDATION_ERROR",
            ValidationError::Malformed { .. } => "MALFORMED_DOCUMENT",
            ValidationError::Duplicate { .. } => "DUPLICATE_VALUE",
        }
    }

    /// Short description used inside localized messages
    fn details(&self) -> String {
        match self {
            ValidationError::Invalid(errors) => errors
                .iter()
                .map(|e| format!("{}: {}", e.field, e.message))
                .collect::<Vec<_>>()
                .join(", "),
            ValidationError::Malformed { message } => message.clone(),
            ValidationError::Duplicate { field, .. } => field.clone(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Invalid(_) => write!(f, "Validation errors: {}", self.details()),
            ValidationError::Malformed { message } => write!(f, "Malformed document: {}", message),
            ValidationError::Duplicate { field, value } => {
                write!(f, "Duplicate value '{}' for field '{}'", value, field)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Validation(err)
    }
}

impl From<ValidationErrors> for ValidationError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields = Vec::new();
        collect_field_errors("", &errors, &mut fields);
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        ValidationError::Invalid(fields)
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::Validation(errors.into())
    }
}

/// Flatten nested validator output into dotted field paths
fn collect_field_errors(prefix: &str, errors: &ValidationErrors, out: &mut Vec<FieldValidationError>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };

        match kind {
            ValidationErrorsKind::Field(list) => {
                for error in list {
                    out.push(FieldValidationError {
                        field: path.clone(),
                        message: error
                            .message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| error.code.to_string()),
                    });
                }
            }
            ValidationErrorsKind::Struct(inner) => collect_field_errors(&path, inner, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_field_errors(&format!("{}.{}", path, index), inner, out);
                }
            }
        }
    }
}

// =============================================================================
// Request Errors
// =============================================================================

/// Errors related to HTTP requests
#[derive(Debug)]
pub enum RequestError {
    /// No route matches the path
    RouteNotFound { path: String },

    /// Query string could not be interpreted
    InvalidQuery { message: String },

    /// Request body is not a JSON object
    InvalidBody { message: String },

    /// No authenticated caller
    Unauthorized,

    /// Authenticated caller lacks the required privileges
    Forbidden,
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::RouteNotFound { path } => write!(f, "Route not found: {}", path),
            RequestError::InvalidQuery { message } => write!(f, "Invalid query: {}", message),
            RequestError::InvalidBody { message } => {
                write!(f, "Invalid request body: {}", message)
            }
            RequestError::Unauthorized => write!(f, "Unauthorized"),
            RequestError::Forbidden => write!(f, "Forbidden"),
        }
    }
}

impl std::error::Error for RequestError {}

impl RequestError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RequestError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            RequestError::InvalidQuery { .. } => StatusCode::BAD_REQUEST,
            RequestError::InvalidBody { .. } => StatusCode::BAD_REQUEST,
            RequestError::Unauthorized => StatusCode::UNAUTHORIZED,
            RequestError::Forbidden => StatusCode::FORBIDDEN,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            RequestError::RouteNotFound { .. } => "ROUTE_NOT_FOUND",
            RequestError::InvalidQuery { .. } => "INVALID_QUERY",
            RequestError::InvalidBody { .. } => "INVALID_BODY",
            RequestError::Unauthorized => "UNAUTHORIZED",
            RequestError::Forbidden => "FORBIDDEN",
        }
    }
}

impl From<RequestError> for ApiError {
    fn from(err: RequestError) -> Self {
        ApiError::Request(err)
    }
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Errors related to storage backends
#[derive(Debug)]
pub enum StorageError {
    /// Backend could not be reached or its state is unusable
    Unavailable { message: String },

    /// Query or write failed
    QueryError { message: String },

    /// Stored data does not have the expected shape
    Corrupted { message: String },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Unavailable { message } => {
                write!(f, "Storage unavailable: {}", message)
            }
            StorageError::QueryError { message } => write!(f, "Storage query error: {}", message),
            StorageError::Corrupted { message } => write!(f, "Corrupted document: {}", message),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError::Storage(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateKey { field, value, .. } => {
                ApiError::Validation(ValidationError::Duplicate { field, value })
            }
            StoreError::Poisoned(message) => ApiError::Storage(StorageError::Unavailable { message }),
            StoreError::Malformed {
                collection,
                message,
            } => ApiError::Storage(StorageError::Corrupted {
                message: format!("{}: {}", collection, message),
            }),
            StoreError::Backend(message) => ApiError::Storage(StorageError::QueryError { message }),
        }
    }
}

// =============================================================================
// Hook Errors
// =============================================================================

/// Errors raised by side effects and cleanups
#[derive(Debug)]
pub enum HookError {
    /// The hook's own store access failed
    Store(StoreError),

    /// The hook could not complete
    Failed { hook: String, message: String },
}

impl fmt::Display for HookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookError::Store(e) => write!(f, "Hook store access failed: {}", e),
            HookError::Failed { hook, message } => write!(f, "Hook '{}' failed: {}", hook, message),
        }
    }
}

impl std::error::Error for HookError {}

impl From<StoreError> for HookError {
    fn from(err: StoreError) -> Self {
        HookError::Store(err)
    }
}

impl From<HookError> for ApiError {
    fn from(err: HookError) -> Self {
        ApiError::Hook(err)
    }
}

// =============================================================================
// Config Errors
// =============================================================================

/// Errors related to configuration
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to parse configuration
    ParseError {
        file: Option<String>,
        message: String,
    },

    /// Invalid value in configuration
    InvalidValue {
        field: String,
        value: String,
        message: String,
    },

    /// IO error while reading configuration
    IoError { message: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ParseError { file, message } => {
                if let Some(file) = file {
                    write!(f, "Failed to parse config file '{}': {}", file, message)
                } else {
                    write!(f, "Failed to parse config: {}", message)
                }
            }
            ConfigError::InvalidValue {
                field,
                value,
                message,
            } => {
                write!(
                    f,
                    "Invalid value '{}' for field '{}': {}",
                    value, field, message
                )
            }
            ConfigError::IoError { message } => write!(f, "IO error: {}", message),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::Config(err)
    }
}

// =============================================================================
// Conversions from external errors
// =============================================================================

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Validation(ValidationError::Malformed {
            message: err.to_string(),
        })
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError {
            file: None,
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError {
            message: err.to_string(),
        }
    }
}

/// A specialized Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;
