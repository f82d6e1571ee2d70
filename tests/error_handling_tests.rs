//! Tests for the typed error handling system
//!
//! These tests verify that:
//! - Errors return correct HTTP status codes
//! - Error responses are properly formatted and localized
//! - Error conversions work correctly
//! - Factory operations surface typed errors

use axum::http::StatusCode;
use axum::response::IntoResponse;
use m3allem::core::error::{
    ConfigError, FieldValidationError, HookError, RequestError, ResourceError, StorageError,
    ValidationError,
};
use m3allem::core::store::StoreError;
use m3allem::prelude::*;

fn not_found() -> ApiError {
    ApiError::Resource(ResourceError::NotFound {
        resource: "city".to_string(),
        key: "casablanca".to_string(),
    })
}

// =============================================================================
// HTTP Status Code Tests
// =============================================================================

mod status_code_tests {
    use super::*;

    #[test]
    fn test_document_not_found_returns_404() {
        assert_eq!(not_found().status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_route_not_found_returns_404() {
        let err = ApiError::Request(RequestError::RouteNotFound {
            path: "/api/nope".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_validation_errors_return_400() {
        let err = ApiError::Validation(ValidationError::Invalid(vec![FieldValidationError {
            field: "phone".to_string(),
            message: "invalid phone number".to_string(),
        }]));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = ApiError::Validation(ValidationError::Malformed {
            message: "missing field `name`".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_duplicate_returns_409() {
        let err = ApiError::Validation(ValidationError::Duplicate {
            field: "phone".to_string(),
            value: "0612345678".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_auth_errors() {
        assert_eq!(
            ApiError::Request(RequestError::Unauthorized).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Request(RequestError::Forbidden).status_code(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_server_side_errors_return_500() {
        let errors = [
            ApiError::Storage(StorageError::Unavailable {
                message: "lock poisoned".to_string(),
            }),
            ApiError::Hook(HookError::Failed {
                hook: "welcome".to_string(),
                message: "boom".to_string(),
            }),
            ApiError::Config(ConfigError::IoError {
                message: "denied".to_string(),
            }),
            ApiError::Internal("unexpected".to_string()),
        ];
        for err in errors {
            assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
            assert!(err.is_server_error());
        }
    }
}

// =============================================================================
// Error Code Tests
// =============================================================================

mod error_code_tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(not_found().error_code(), "DOCUMENT_NOT_FOUND");
        assert_eq!(
            ApiError::Request(RequestError::InvalidQuery {
                message: "page".to_string()
            })
            .error_code(),
            "INVALID_QUERY"
        );
        assert_eq!(
            ApiError::Request(RequestError::InvalidBody {
                message: "username".to_string()
            })
            .error_code(),
            "INVALID_BODY"
        );
        assert_eq!(
            ApiError::Internal("x".to_string()).error_code(),
            "INTERNAL_ERROR"
        );
    }
}

// =============================================================================
// Error Response Tests
// =============================================================================

mod error_response_tests {
    use super::*;
    use m3allem::core::locale::Language;

    #[test]
    fn test_client_error_is_a_fail_envelope() {
        let response = not_found().to_response(None, false);
        assert_eq!(response.status, "fail");
        assert_eq!(response.code, "DOCUMENT_NOT_FOUND");
        assert_eq!(response.message, "No documents found with that ID!");
    }

    #[test]
    fn test_message_follows_caller_language() {
        let fr = not_found().to_response(Some(Language::Fr), false);
        assert_eq!(fr.message, "Aucun document trouvé avec cet identifiant !");

        let ar = not_found().to_response(Some(Language::Ar), false);
        assert_eq!(ar.message, "لم يتم العثور على أي مستند بهذا المعرف!");
    }

    #[test]
    fn test_duplicate_message_names_the_field() {
        let err = ApiError::Validation(ValidationError::Duplicate {
            field: "username".to_string(),
            value: "e-hamza-0001".to_string(),
        });
        let response = err.to_response(None, false);
        assert!(response.message.contains("'username'"));
        assert!(!response.message.contains("e-hamza-0001"));
    }

    #[test]
    fn test_server_error_details_only_for_admins() {
        let err = || {
            ApiError::Storage(StorageError::QueryError {
                message: "connection reset".to_string(),
            })
        };

        let public = err().to_response(Some(Language::Fr), false);
        assert_eq!(public.status, "error");
        assert_eq!(public.message, "Une erreur s'est produite !");

        let admin = err().to_response(None, true);
        assert!(admin.message.contains("connection reset"));
    }
}

// =============================================================================
// Error Conversion Tests
// =============================================================================

mod error_conversion_tests {
    use super::*;

    #[test]
    fn test_duplicate_key_becomes_conflict() {
        let err: ApiError = StoreError::DuplicateKey {
            collection: "users".to_string(),
            field: "phone".to_string(),
            value: "0612345678".to_string(),
        }
        .into();
        assert!(matches!(
            err,
            ApiError::Validation(ValidationError::Duplicate { ref field, .. }) if field == "phone"
        ));
    }

    #[test]
    fn test_backend_failure_becomes_storage_error() {
        let err: ApiError = StoreError::Backend("timeout".to_string()).into();
        assert!(matches!(err, ApiError::Storage(StorageError::QueryError { .. })));

        let err: ApiError = StoreError::Malformed {
            collection: "cities".to_string(),
            message: "_id is not a string".to_string(),
        }
        .into();
        assert!(matches!(err, ApiError::Storage(StorageError::Corrupted { .. })));
    }

    #[test]
    fn test_serde_error_becomes_malformed_document() {
        let serde_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: ApiError = serde_err.into();
        assert!(matches!(err, ApiError::Validation(ValidationError::Malformed { .. })));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_yaml_error_becomes_parse_error() {
        let yaml_err = serde_yaml::from_str::<AppConfig>("server: [").unwrap_err();
        let err: ConfigError = yaml_err.into();
        assert!(matches!(err, ConfigError::ParseError { file: None, .. }));
    }
}

// =============================================================================
// IntoResponse Tests
// =============================================================================

mod into_response_tests {
    use super::*;
    use m3allem::core::locale::Language;

    #[tokio::test]
    async fn test_localized_error_body() {
        let response = not_found()
            .localize(Some(Language::Ar), false)
            .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "fail");
        assert_eq!(body["code"], "DOCUMENT_NOT_FOUND");
        assert_eq!(body["message"], "لم يتم العثور على أي مستند بهذا المعرف!");
    }

    #[test]
    fn test_unauthorized_into_response_status() {
        let response = ApiError::Request(RequestError::Unauthorized).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}

// =============================================================================
// Factory Error Integration Tests
// =============================================================================

mod factory_error_tests {
    use super::*;
    use m3allem::core::context::RequestContext;
    use m3allem::entities::{City, city};
    use serde_json::json;
    use std::sync::Arc;

    fn factory() -> ResourceFactory<City> {
        ResourceFactory::new(Arc::new(InMemoryDocumentStore::new()), city::descriptor())
    }

    fn admin() -> RequestContext {
        RequestContext::new(
            AuthContext::Admin {
                admin_id: "a-1".to_string(),
                role: AdminRole::SuperAdmin,
            },
            None,
            Language::Fr,
        )
    }

    fn body(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_get_missing_document_is_not_found() {
        let err = factory()
            .get_one(&admin(), &Lookup::id("casablanca"), &Scope::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Resource(ResourceError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_document_are_not_found() {
        let factory = factory();
        let err = factory
            .update_one(&admin(), "casablanca", body(json!({"isActive": false})), &Scope::new())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err = factory
            .delete_one(&admin(), "casablanca", &Scope::new())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_deleting_absent_document_twice_is_not_found_both_times() {
        let factory = factory();
        for _ in 0..2 {
            let err = factory
                .delete_one(&admin(), "casablanca", &Scope::new())
                .await
                .unwrap_err();
            assert!(matches!(err, ApiError::Resource(ResourceError::NotFound { .. })));
            assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        }

        // same once the document existed and is gone
        let created = factory
            .create_one(&admin(), body(json!({"name": {"fr": "Agadir", "ar": "أكادير"}})), &Scope::new())
            .await
            .unwrap();
        assert_eq!(created.status, StatusCode::CREATED);
        factory.delete_one(&admin(), "agadir", &Scope::new()).await.unwrap();
        for _ in 0..2 {
            let err = factory
                .delete_one(&admin(), "agadir", &Scope::new())
                .await
                .unwrap_err();
            assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        }
    }

    #[tokio::test]
    async fn test_invalid_body_is_rejected() {
        let err = factory()
            .create_one(&admin(), body(json!({"name": {"fr": "", "ar": "الدار البيضاء"}})), &Scope::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(ValidationError::Invalid(_))));

        let err = factory()
            .create_one(&admin(), body(json!({"name": 42})), &Scope::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(ValidationError::Malformed { .. })));
    }

    #[tokio::test]
    async fn test_duplicate_unique_field_is_conflict() {
        let factory = factory();
        factory.ensure_indexes().await.unwrap();

        let city = json!({"name": {"fr": "Casablanca", "ar": "الدار البيضاء"}});
        let reply = factory
            .create_one(&admin(), body(city), &Scope::new())
            .await
            .unwrap();
        assert_eq!(reply.status, StatusCode::CREATED);

        let twin = json!({"name": {"fr": "Casa", "ar": "الدار البيضاء"}});
        let err = factory
            .create_one(&admin(), body(twin), &Scope::new())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }
}
