//! Configuration loading and management

use crate::core::auth::{AdminRole, AuthContext, StaticTokenProvider, UserKind};
use crate::core::error::ConfigError;
use crate::core::locale::Language;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Complete server configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub pagination: PaginationConfig,
    pub locale: LocaleConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content).map_err(|err| match err {
            ConfigError::ParseError { message, .. } => ConfigError::ParseError {
                file: Some(path.to_string()),
                message,
            },
            other => other,
        })
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the server cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pagination.default_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pagination.default_limit".to_string(),
                value: "0".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        if self.pagination.max_limit == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "pagination.max_limit".to_string(),
                value: "0".to_string(),
                message: "must be at least 1 when set".to_string(),
            });
        }

        if self.storage.backend == StorageBackend::Mongodb && self.storage.uri.is_none() {
            return Err(ConfigError::InvalidValue {
                field: "storage.uri".to_string(),
                value: String::new(),
                message: "required for the mongodb backend".to_string(),
            });
        }

        Ok(())
    }
}

/// Listening address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Page size rules of list endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Page size when the request gives none
    pub default_limit: usize,

    /// Upper bound on the page size, unbounded when `None`
    pub max_limit: Option<usize>,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: 100,
            max_limit: None,
        }
    }
}

impl PaginationConfig {
    /// Clamp a requested page size to `[1, max_limit]`
    pub fn clamp_limit(&self, limit: usize) -> usize {
        let limit = limit.max(1);
        match self.max_limit {
            Some(max) => limit.min(max.max(1)),
            None => limit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocaleConfig {
    /// Language of non-admin output when the request names none
    pub default_language: Language,
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            default_language: Language::Fr,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    InMemory,
    Mongodb,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Connection string (mongodb backend)
    pub uri: Option<String>,
    /// Database name (mongodb backend), `m3allem` when unset
    pub database: Option<String>,
}

/// Identity a development token stands for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TokenIdentity {
    Admin {
        id: String,
        #[serde(default = "default_admin_role")]
        role: AdminRole,
    },
    Employee {
        id: String,
    },
    Client {
        id: String,
    },
}

fn default_admin_role() -> AdminRole {
    AdminRole::Admin
}

impl From<&TokenIdentity> for AuthContext {
    fn from(identity: &TokenIdentity) -> Self {
        match identity {
            TokenIdentity::Admin { id, role } => AuthContext::Admin {
                admin_id: id.clone(),
                role: *role,
            },
            TokenIdentity::Employee { id } => AuthContext::User {
                user_id: id.clone(),
                kind: UserKind::Employee,
            },
            TokenIdentity::Client { id } => AuthContext::User {
                user_id: id.clone(),
                kind: UserKind::Client,
            },
        }
    }
}

/// Static bearer tokens, for development and tests
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub tokens: BTreeMap<String, TokenIdentity>,
}

impl AuthConfig {
    pub fn provider(&self) -> StaticTokenProvider {
        self.tokens
            .iter()
            .fold(StaticTokenProvider::new(), |provider, (token, identity)| {
                provider.with_token(token.clone(), identity.into())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
server:
  host: 0.0.0.0
  port: 8080
pagination:
  default_limit: 20
  max_limit: 50
locale:
  default_language: ar
auth:
  tokens:
    dev-admin:
      kind: admin
      id: a-1
      role: super_admin
    dev-client:
      kind: client
      id: u-9
"#;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.address(), "127.0.0.1:3000");
        assert_eq!(config.pagination.default_limit, 100);
        assert_eq!(config.locale.default_language, Language::Fr);
        assert_eq!(config.storage.backend, StorageBackend::InMemory);
    }

    #[test]
    fn test_from_yaml_str() {
        let config = AppConfig::from_yaml_str(YAML).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.pagination.max_limit, Some(50));
        assert_eq!(config.locale.default_language, Language::Ar);
        assert_eq!(config.auth.tokens.len(), 2);
        assert_eq!(config.auth.provider().len(), 2);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = AppConfig::from_yaml_str("server:\n  port: 4000\n").unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.pagination, PaginationConfig::default());
    }

    #[test]
    fn test_token_identity_to_context() {
        let identity = TokenIdentity::Admin {
            id: "a-1".to_string(),
            role: AdminRole::SuperAdmin,
        };
        assert!(AuthContext::from(&identity).is_admin());

        let identity = TokenIdentity::Employee {
            id: "u-1".to_string(),
        };
        assert_eq!(AuthContext::from(&identity).user_kind(), Some(UserKind::Employee));
    }

    #[test]
    fn test_clamp_limit() {
        let config = PaginationConfig {
            default_limit: 100,
            max_limit: Some(25),
        };
        assert_eq!(config.clamp_limit(0), 1);
        assert_eq!(config.clamp_limit(10), 10);
        assert_eq!(config.clamp_limit(1000), 25);
        assert_eq!(PaginationConfig::default().clamp_limit(1000), 1000);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = AppConfig::from_yaml_str("pagination:\n  default_limit: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "pagination.default_limit"));

        let err = AppConfig::from_yaml_str("storage:\n  backend: mongodb\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_malformed_yaml() {
        let err = AppConfig::from_yaml_str("server: [").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m3allem.yaml");
        std::fs::write(&path, YAML).unwrap();

        let config = AppConfig::from_yaml_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.server.port, 8080);

        let err = AppConfig::from_yaml_file("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::IoError { .. }));
    }
}
