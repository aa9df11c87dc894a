//! Logging for BuildGate
//!
//! This crate provides:
//! - `tracing-subscriber` initialization driven by [`LoggingConfig`]
//! - Message sanitization so credentials, internal URLs and stack traces
//!   never reach log sinks or API clients
//!
//! # Example
//!
//! ```rust,no_run
//! use buildgate_logging::{LogFormat, LoggingConfig};
//!
//! let config = LoggingConfig {
//!     level: "info".to_string(),
//!     format: LogFormat::Json,
//!     ..Default::default()
//! };
//! config.initialize().expect("Failed to initialize logging");
//!
//! tracing::info!(version = "0.1.0", "buildgate started");
//! ```

pub mod sanitization;

pub use sanitization::{LogSanitizer, SanitizationConfig, get_sanitizer, init_sanitizer};

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Result type for logging operations
pub type Result<T> = std::result::Result<T, LoggingError>;

/// Logging error types
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Tracing error: {0}")]
    Tracing(String),
}

/// Output format of the subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line
    Json,
    /// Multi-line human-readable output
    #[default]
    Pretty,
    /// Single-line human-readable output
    Compact,
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(LoggingError::Config(format!("Unknown log format: {other}"))),
        }
    }
}

/// Where log lines are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
}

/// Subscriber configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    pub format: LogFormat,
    pub output: LogOutput,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            output: LogOutput::Stdout,
        }
    }
}

impl LoggingConfig {
    /// Build the filter: `RUST_LOG` wins over the configured level
    pub fn env_filter(&self) -> Result<tracing_subscriber::EnvFilter> {
        use tracing_subscriber::EnvFilter;

        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.level))
            .map_err(|e| LoggingError::Config(format!("Invalid log level: {e}")))
    }

    /// Install the global subscriber
    pub fn initialize(&self) -> Result<()> {
        use tracing_subscriber::{fmt, prelude::*};

        let filter = self.env_filter()?;
        let registry = tracing_subscriber::registry().with(filter);

        let result = match (self.format, self.output) {
            (LogFormat::Json, LogOutput::Stdout) => registry.with(fmt::layer().json()).try_init(),
            (LogFormat::Json, LogOutput::Stderr) => registry
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init(),
            (LogFormat::Pretty, LogOutput::Stdout) => {
                registry.with(fmt::layer().pretty()).try_init()
            }
            (LogFormat::Pretty, LogOutput::Stderr) => registry
                .with(fmt::layer().pretty().with_writer(std::io::stderr))
                .try_init(),
            (LogFormat::Compact, LogOutput::Stdout) => {
                registry.with(fmt::layer().compact()).try_init()
            }
            (LogFormat::Compact, LogOutput::Stderr) => registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .try_init(),
        };

        result.map_err(|e| LoggingError::Tracing(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("Compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Pretty);
        assert_eq!(config.output, LogOutput::Stdout);
    }

    #[test]
    fn test_config_deserializes_lowercase() {
        let config: LoggingConfig = serde_json::from_str(
            r#"{"level": "debug", "format": "json", "output": "stderr"}"#,
        )
        .unwrap();
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.output, LogOutput::Stderr);
    }

    #[test]
    fn test_invalid_level_rejected() {
        // An ambient RUST_LOG takes precedence over the configured level
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let config = LoggingConfig {
            level: "buildgate=[[".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.env_filter(), Err(LoggingError::Config(_))));
    }
}
