//! Authorization server configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Allowed authorization-code lifetime, in seconds
pub const CODE_TTL_RANGE: std::ops::RangeInclusive<u64> = 60..=120;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid issuer URL: {0}")]
    InvalidIssuer(String),

    #[error("Authorization code TTL must be between 60 and 120 seconds, got {0}")]
    CodeTtlOutOfRange(u64),

    #[error("{0} must be greater than zero")]
    ZeroTtl(&'static str),

    #[error("Default scope '{0}' is not in scopes_supported")]
    UnknownDefaultScope(String),
}

/// Authorization server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthServerConfig {
    /// Public base URL; endpoint URLs in metadata are derived from it
    pub issuer: String,
    /// Authorization code lifetime in seconds (60-120)
    pub code_ttl_secs: u64,
    /// Access token lifetime in seconds
    pub access_token_ttl_secs: u64,
    /// Refresh token lifetime in seconds
    pub refresh_token_ttl_secs: u64,
    /// Issue refresh tokens alongside access tokens
    pub refresh_tokens_enabled: bool,
    /// Client registration lifetime in seconds; `None` never expires
    pub client_ttl_secs: Option<u64>,
    /// Scopes advertised in metadata
    pub scopes_supported: Vec<String>,
    /// Scope granted when the client asks for none
    pub default_scope: String,
    /// Storage backend
    pub storage: StorageConfig,
}

/// Storage configuration for the token store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StorageConfig {
    /// JSON file storage
    File {
        /// Path to the store file
        path: PathBuf,
    },
    /// Memory-only storage (lost on restart)
    Memory,
}

impl StorageConfig {
    /// `<data dir>/buildgate/tokens.json`
    pub fn default_file() -> Self {
        Self::File {
            path: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("buildgate")
                .join("tokens.json"),
        }
    }
}

impl Default for AuthServerConfig {
    fn default() -> Self {
        Self {
            issuer: "http://localhost:8080".to_string(),
            code_ttl_secs: 120,
            access_token_ttl_secs: 3600,            // 1 hour
            refresh_token_ttl_secs: 30 * 24 * 3600, // 30 days
            refresh_tokens_enabled: true,
            client_ttl_secs: None,
            scopes_supported: vec!["mcp".to_string()],
            default_scope: "mcp".to_string(),
            storage: StorageConfig::Memory,
        }
    }
}

impl AuthServerConfig {
    /// Issuer without a trailing slash
    pub fn base_url(&self) -> &str {
        self.issuer.trim_end_matches('/')
    }

    /// Absolute URL of an endpoint path such as `/token`
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    /// Normalize a space-separated scope request against `scopes_supported`.
    /// An empty or absent request yields the default scope; any unsupported
    /// scope yields `None`.
    pub fn resolve_scope(&self, requested: Option<&str>) -> Option<String> {
        let mut scopes: Vec<&str> = Vec::new();
        for scope in requested.unwrap_or_default().split_whitespace() {
            if !self.scopes_supported.iter().any(|s| s == scope) {
                return None;
            }
            if !scopes.contains(&scope) {
                scopes.push(scope);
            }
        }

        if scopes.is_empty() {
            Some(self.default_scope.clone())
        } else {
            Some(scopes.join(" "))
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let issuer = url::Url::parse(&self.issuer)
            .map_err(|e| ConfigError::InvalidIssuer(format!("{}: {e}", self.issuer)))?;
        if !matches!(issuer.scheme(), "http" | "https")
            || issuer.query().is_some()
            || issuer.fragment().is_some()
        {
            return Err(ConfigError::InvalidIssuer(self.issuer.clone()));
        }

        if !CODE_TTL_RANGE.contains(&self.code_ttl_secs) {
            return Err(ConfigError::CodeTtlOutOfRange(self.code_ttl_secs));
        }
        if self.access_token_ttl_secs == 0 {
            return Err(ConfigError::ZeroTtl("access_token_ttl_secs"));
        }
        if self.refresh_token_ttl_secs == 0 {
            return Err(ConfigError::ZeroTtl("refresh_token_ttl_secs"));
        }
        if self.client_ttl_secs == Some(0) {
            return Err(ConfigError::ZeroTtl("client_ttl_secs"));
        }
        if !self.scopes_supported.contains(&self.default_scope) {
            return Err(ConfigError::UnknownDefaultScope(self.default_scope.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AuthServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.code_ttl_secs, 120);
        assert_eq!(config.access_token_ttl_secs, 3600);
    }

    #[test]
    fn test_code_ttl_bounds() {
        for (ttl, ok) in [(59, false), (60, true), (90, true), (120, true), (121, false)] {
            let config = AuthServerConfig {
                code_ttl_secs: ttl,
                ..Default::default()
            };
            assert_eq!(config.validate().is_ok(), ok, "ttl {ttl}");
        }
    }

    #[test]
    fn test_invalid_issuer() {
        for issuer in ["not a url", "ftp://auth.example.com", "https://auth.example.com/?x=1"] {
            let config = AuthServerConfig {
                issuer: issuer.to_string(),
                ..Default::default()
            };
            assert!(matches!(config.validate(), Err(ConfigError::InvalidIssuer(_))));
        }
    }

    #[test]
    fn test_endpoint_urls_ignore_trailing_slash() {
        let config = AuthServerConfig {
            issuer: "https://auth.example.com/".to_string(),
            ..Default::default()
        };
        assert_eq!(config.endpoint("/token"), "https://auth.example.com/token");
    }

    #[test]
    fn test_default_scope_must_be_supported() {
        let config = AuthServerConfig {
            default_scope: "admin".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::UnknownDefaultScope("admin".to_string()))
        );
    }

    #[test]
    fn test_resolve_scope() {
        let config = AuthServerConfig {
            scopes_supported: vec!["mcp".to_string(), "jobs:read".to_string()],
            ..Default::default()
        };
        assert_eq!(config.resolve_scope(None).as_deref(), Some("mcp"));
        assert_eq!(config.resolve_scope(Some("  ")).as_deref(), Some("mcp"));
        assert_eq!(
            config.resolve_scope(Some("jobs:read mcp jobs:read")).as_deref(),
            Some("jobs:read mcp")
        );
        assert_eq!(config.resolve_scope(Some("mcp admin")), None);
    }

    #[test]
    fn test_default_file_storage_path() {
        match StorageConfig::default_file() {
            StorageConfig::File { path } => assert!(path.ends_with("buildgate/tokens.json")),
            StorageConfig::Memory => panic!("expected file storage"),
        }
    }
}
