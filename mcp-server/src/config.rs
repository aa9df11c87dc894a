//! Command-line and environment configuration for the `buildgate` binary
//!
//! Every flag has a `BUILDGATE_*` environment fallback so the server can be
//! configured entirely from the environment in container deployments.

use crate::bridge::{BridgeConfig, BridgeError};
use crate::jenkins::JenkinsConfig;
use buildgate_auth::{AuthServerConfig, StorageConfig};
use buildgate_logging::{LogFormat, LogOutput, LoggingConfig};
use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Authorization server: {0}")]
    Auth(#[from] buildgate_auth::ConfigError),

    #[error("Bridge: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Logging: {0}")]
    Logging(#[from] buildgate_logging::LoggingError),

    #[error("--store-path is required when --store is 'file'")]
    MissingStorePath,

    #[error("At least one scope must be configured")]
    NoScopes,

    #[error("Jenkins request timeout ({jenkins}s) must be shorter than the tool timeout ({tool}s)")]
    JenkinsTimeoutTooLong { jenkins: u64, tool: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    Memory,
    File,
}

#[derive(Debug, Parser)]
#[command(name = "buildgate")]
#[command(about = "OAuth-protected JSON-RPC bridge to Jenkins")]
#[command(version)]
pub struct Cli {
    /// Address to listen on
    #[arg(long, env = "BUILDGATE_BIND", default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,

    /// Public base URL of this server
    #[arg(long, env = "BUILDGATE_ISSUER", default_value = "http://localhost:8080")]
    pub issuer: String,

    /// Authorization code lifetime (60-120 seconds)
    #[arg(long, env = "BUILDGATE_CODE_TTL_SECS", default_value_t = 120)]
    pub code_ttl_secs: u64,

    #[arg(long, env = "BUILDGATE_ACCESS_TOKEN_TTL_SECS", default_value_t = 3600)]
    pub access_token_ttl_secs: u64,

    #[arg(long, env = "BUILDGATE_REFRESH_TOKEN_TTL_SECS", default_value_t = 2_592_000)]
    pub refresh_token_ttl_secs: u64,

    /// Issue access tokens only
    #[arg(long, env = "BUILDGATE_NO_REFRESH_TOKENS")]
    pub no_refresh_tokens: bool,

    /// Registration lifetime; registrations never expire when unset
    #[arg(long, env = "BUILDGATE_CLIENT_TTL_SECS")]
    pub client_ttl_secs: Option<u64>,

    /// Supported scopes; the first one is granted when a client asks for none
    #[arg(long, env = "BUILDGATE_SCOPES", value_delimiter = ',', default_value = "mcp")]
    pub scopes: Vec<String>,

    #[arg(long, env = "BUILDGATE_STORE", value_enum, default_value_t = StoreKind::Memory)]
    pub store: StoreKind,

    /// Token store file (with --store file)
    #[arg(long, env = "BUILDGATE_STORE_PATH")]
    pub store_path: Option<PathBuf>,

    /// Seconds between sweeps of expired records; 0 disables the sweep
    #[arg(long, env = "BUILDGATE_PURGE_INTERVAL_SECS", default_value_t = 300)]
    pub purge_interval_secs: u64,

    /// Deadline for a single tool call (must be below 29)
    #[arg(long, env = "BUILDGATE_TOOL_TIMEOUT_SECS", default_value_t = 25)]
    pub tool_timeout_secs: u64,

    #[arg(long, env = "BUILDGATE_ALLOWED_ORIGIN", default_value = "*")]
    pub allowed_origin: String,

    /// Validate bearer tokens against this RFC 7662 endpoint instead of the local store
    #[arg(long, env = "BUILDGATE_INTROSPECTION_URL")]
    pub introspection_url: Option<Url>,

    #[arg(long, env = "BUILDGATE_JENKINS_URL")]
    pub jenkins_url: Url,

    #[arg(long, env = "BUILDGATE_JENKINS_USER")]
    pub jenkins_user: Option<String>,

    #[arg(long, env = "BUILDGATE_JENKINS_TOKEN", hide_env_values = true)]
    pub jenkins_token: Option<String>,

    #[arg(long, env = "BUILDGATE_JENKINS_TIMEOUT_SECS", default_value_t = 20)]
    pub jenkins_timeout_secs: u64,

    /// Filter directive used when RUST_LOG is unset
    #[arg(long, env = "BUILDGATE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// pretty, compact or json
    #[arg(long, env = "BUILDGATE_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

/// Validated configuration for every component of the server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub auth: AuthServerConfig,
    pub bridge: BridgeConfig,
    pub jenkins: JenkinsConfig,
    pub logging: LoggingConfig,
    pub introspection_url: Option<Url>,
    pub purge_interval: Option<Duration>,
}

impl Cli {
    pub fn into_config(self) -> Result<ServerConfig, ConfigError> {
        let scopes: Vec<String> = self
            .scopes
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let default_scope = scopes.first().cloned().ok_or(ConfigError::NoScopes)?;

        let storage = match (self.store, self.store_path) {
            (StoreKind::Memory, _) => StorageConfig::Memory,
            (StoreKind::File, Some(path)) => StorageConfig::File { path },
            (StoreKind::File, None) => return Err(ConfigError::MissingStorePath),
        };

        let auth = AuthServerConfig {
            issuer: self.issuer,
            code_ttl_secs: self.code_ttl_secs,
            access_token_ttl_secs: self.access_token_ttl_secs,
            refresh_token_ttl_secs: self.refresh_token_ttl_secs,
            refresh_tokens_enabled: !self.no_refresh_tokens,
            client_ttl_secs: self.client_ttl_secs,
            scopes_supported: scopes,
            default_scope,
            storage,
        };
        auth.validate()?;

        let bridge = BridgeConfig {
            tool_timeout: Duration::from_secs(self.tool_timeout_secs),
            allowed_origin: self.allowed_origin,
            resource_metadata_url: Some(auth.endpoint("/.well-known/oauth-protected-resource")),
        };
        bridge.validate()?;

        if self.jenkins_timeout_secs == 0 || self.jenkins_timeout_secs >= self.tool_timeout_secs {
            return Err(ConfigError::JenkinsTimeoutTooLong {
                jenkins: self.jenkins_timeout_secs,
                tool: self.tool_timeout_secs,
            });
        }
        let jenkins = JenkinsConfig {
            base_url: self.jenkins_url,
            user: self.jenkins_user,
            api_token: self.jenkins_token,
            request_timeout: Duration::from_secs(self.jenkins_timeout_secs),
        };

        let logging = LoggingConfig {
            level: self.log_level,
            format: self.log_format.parse::<LogFormat>()?,
            output: LogOutput::Stdout,
        };

        Ok(ServerConfig {
            bind: self.bind,
            auth,
            bridge,
            jenkins,
            logging,
            introspection_url: self.introspection_url,
            purge_interval: (self.purge_interval_secs > 0)
                .then(|| Duration::from_secs(self.purge_interval_secs)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Result<ServerConfig, ConfigError> {
        let mut args = vec!["buildgate", "--jenkins-url", "https://ci.example.com/"];
        args.extend_from_slice(extra);
        Cli::try_parse_from(args).unwrap().into_config()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]).unwrap();

        assert_eq!(config.bind, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.auth.code_ttl_secs, 120);
        assert!(config.auth.refresh_tokens_enabled);
        assert_eq!(config.auth.default_scope, "mcp");
        assert_eq!(config.auth.storage, StorageConfig::Memory);
        assert_eq!(config.bridge.tool_timeout, Duration::from_secs(25));
        assert_eq!(
            config.bridge.resource_metadata_url.as_deref(),
            Some("http://localhost:8080/.well-known/oauth-protected-resource")
        );
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.purge_interval, Some(Duration::from_secs(300)));
        assert!(config.introspection_url.is_none());
    }

    #[test]
    fn test_jenkins_url_is_required() {
        assert!(Cli::try_parse_from(["buildgate"]).is_err());
    }

    #[test]
    fn test_scope_list() {
        let config = parse(&["--scopes", "jobs:read, jobs:write"]).unwrap();
        assert_eq!(config.auth.scopes_supported, vec!["jobs:read", "jobs:write"]);
        assert_eq!(config.auth.default_scope, "jobs:read");
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        assert!(matches!(
            parse(&["--code-ttl-secs", "300"]),
            Err(ConfigError::Auth(_))
        ));
        assert!(matches!(
            parse(&["--tool-timeout-secs", "29"]),
            Err(ConfigError::Bridge(BridgeError::ToolTimeoutTooLong { .. }))
        ));
        assert!(matches!(
            parse(&["--tool-timeout-secs", "10"]),
            Err(ConfigError::JenkinsTimeoutTooLong { .. })
        ));
        assert!(matches!(
            parse(&["--log-format", "xml"]),
            Err(ConfigError::Logging(_))
        ));
    }

    #[test]
    fn test_file_store_needs_path() {
        assert!(matches!(
            parse(&["--store", "file"]),
            Err(ConfigError::MissingStorePath)
        ));

        let config = parse(&["--store", "file", "--store-path", "/var/lib/buildgate/tokens.json"])
            .unwrap();
        assert_eq!(
            config.auth.storage,
            StorageConfig::File {
                path: PathBuf::from("/var/lib/buildgate/tokens.json")
            }
        );
    }

    #[test]
    fn test_optional_settings() {
        let config = parse(&[
            "--no-refresh-tokens",
            "--purge-interval-secs",
            "0",
            "--introspection-url",
            "https://auth.example.com/introspect",
            "--jenkins-user",
            "bot",
            "--jenkins-token",
            "t0ken",
        ])
        .unwrap();

        assert!(!config.auth.refresh_tokens_enabled);
        assert_eq!(config.purge_interval, None);
        assert_eq!(
            config.introspection_url.unwrap().as_str(),
            "https://auth.example.com/introspect"
        );
        assert_eq!(config.jenkins.user.as_deref(), Some("bot"));
    }
}
