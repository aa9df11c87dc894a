//! Message sanitization
//!
//! Adapter failures come back from the automation server as free text that
//! can carry credentials, internal hostnames and stack traces. Everything that
//! crosses the bridge boundary, into a log line or a JSON-RPC error, is passed
//! through [`LogSanitizer::sanitize`] first.

use regex::Regex;
use std::sync::OnceLock;

static PASSWORD_REGEX: OnceLock<Regex> = OnceLock::new();
static TOKEN_REGEX: OnceLock<Regex> = OnceLock::new();
static API_KEY_REGEX: OnceLock<Regex> = OnceLock::new();
static CREDENTIAL_REGEX: OnceLock<Regex> = OnceLock::new();
static URL_REGEX: OnceLock<Regex> = OnceLock::new();
static IP_REGEX: OnceLock<Regex> = OnceLock::new();
static STACK_FRAME_REGEX: OnceLock<Regex> = OnceLock::new();

// The patterns below are constants; a failure to compile is a programming error.
fn init_sanitization_patterns() {
    PASSWORD_REGEX.get_or_init(|| {
        Regex::new(
            r#"(?i)(["']?)(password|passwd|pwd|pass)(["']?)[\s]*[=:][\s]*["`']?([^'"`\s,}]+)"#,
        )
        .expect("Invalid password regex")
    });

    TOKEN_REGEX.get_or_init(|| {
        Regex::new(r#"(?i)(?:(["']?)([a-z_]*token)(["']?)[\s]*[=:][\s]*['"]?([a-zA-Z0-9._~+/=-]+)|(bearer|basic)[\s]+([a-zA-Z0-9._~+/=-]+))"#)
            .expect("Invalid token regex")
    });

    API_KEY_REGEX.get_or_init(|| {
        Regex::new(
            r#"(?i)(["']?)(api[_-]?key|apikey|crumb)(["']?)[\s]*[=:][\s]*['"]?([a-zA-Z0-9._-]+)"#,
        )
        .expect("Invalid API key regex")
    });

    CREDENTIAL_REGEX.get_or_init(|| {
        Regex::new(r#"(?i)(["']?)(credentials?|[a-z_]*secret|authorization)(["']?)[\s]*[=:][\s]*['"]?([^'"\s,}]+)"#)
            .expect("Invalid credential regex")
    });

    URL_REGEX.get_or_init(|| {
        Regex::new(r#"(?i)\b(?:https?|wss?|ftp)://[^\s'"<>]+"#).expect("Invalid URL regex")
    });

    IP_REGEX.get_or_init(|| {
        Regex::new(r"\b(?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\b")
            .expect("Invalid IP regex")
    });

    // Java frames ("at org.foo.Bar(Bar.java:12)"), Rust backtraces ("  3: foo::bar")
    // and the headers that introduce them.
    STACK_FRAME_REGEX.get_or_init(|| {
        Regex::new(r"^\s*(?:at\s+[\w$.<>/]+\(.*\)|\d+:\s+[\w<>_$]+::[\w:<>_$]+|\.\.\. \d+ more|Caused by:|stack backtrace:|Traceback \(most recent call last\):|File .+, line \d+)")
            .expect("Invalid stack frame regex")
    });
}

/// Sanitization configuration
#[derive(Debug, Clone)]
pub struct SanitizationConfig {
    /// Enable sanitization
    pub enabled: bool,

    /// Keep IP addresses (useful when debugging locally)
    pub preserve_ips: bool,

    /// Drop stack trace lines entirely
    pub strip_stack_traces: bool,

    /// Truncate sanitized output to this many characters
    pub max_length: Option<usize>,

    /// Replacement string for sensitive data
    pub replacement: String,
}

impl Default for SanitizationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            preserve_ips: false,
            strip_stack_traces: true,
            max_length: Some(512),
            replacement: "[REDACTED]".to_string(),
        }
    }
}

/// Log sanitizer for removing sensitive information
#[derive(Debug, Clone)]
pub struct LogSanitizer {
    config: SanitizationConfig,
}

impl LogSanitizer {
    /// Create a new log sanitizer with default configuration
    pub fn new() -> Self {
        Self::with_config(SanitizationConfig::default())
    }

    /// Create a new log sanitizer with custom configuration
    pub fn with_config(config: SanitizationConfig) -> Self {
        init_sanitization_patterns();
        Self { config }
    }

    /// Current configuration
    pub fn config(&self) -> &SanitizationConfig {
        &self.config
    }

    /// Sanitize a message by removing or redacting sensitive information
    pub fn sanitize(&self, message: &str) -> String {
        if !self.config.enabled {
            return message.to_string();
        }

        let mut sanitized = if self.config.strip_stack_traces {
            Self::strip_stack_traces(message)
        } else {
            message.to_string()
        };

        // URLs first so embedded userinfo and query tokens go with them
        if let Some(regex) = URL_REGEX.get() {
            sanitized = regex.replace_all(&sanitized, "[URL_REDACTED]").to_string();
        }

        if let Some(regex) = PASSWORD_REGEX.get() {
            sanitized = self.redact_group(regex, &sanitized, 4);
        }

        if let Some(regex) = TOKEN_REGEX.get() {
            sanitized = regex
                .replace_all(&sanitized, |caps: &regex::Captures| {
                    let full_match = &caps[0];
                    let value = caps.get(4).or_else(|| caps.get(6)).map(|m| m.as_str());
                    match value {
                        Some(value) => full_match.replace(value, &self.config.replacement),
                        None => full_match.to_string(),
                    }
                })
                .to_string();
        }

        if let Some(regex) = API_KEY_REGEX.get() {
            sanitized = self.redact_group(regex, &sanitized, 4);
        }

        if let Some(regex) = CREDENTIAL_REGEX.get() {
            sanitized = self.redact_group(regex, &sanitized, 4);
        }

        if !self.config.preserve_ips {
            if let Some(regex) = IP_REGEX.get() {
                sanitized = regex.replace_all(&sanitized, "[IP_REDACTED]").to_string();
            }
        }

        match self.config.max_length {
            Some(max) if sanitized.chars().count() > max => {
                let mut truncated: String = sanitized.chars().take(max).collect();
                truncated.push_str("...");
                truncated
            }
            _ => sanitized,
        }
    }

    /// Sanitize an error's display text
    pub fn sanitize_error(&self, error: &dyn std::error::Error) -> String {
        self.sanitize(&error.to_string())
    }

    /// Sanitize a structured value, redacting sensitive fields by name
    pub fn sanitize_context(&self, context: &serde_json::Value) -> serde_json::Value {
        if !self.config.enabled {
            return context.clone();
        }

        match context {
            serde_json::Value::Object(map) => {
                let sanitized_map = map
                    .iter()
                    .map(|(key, value)| {
                        let sanitized_value = if Self::is_sensitive_field(key) {
                            serde_json::Value::String(self.config.replacement.clone())
                        } else {
                            self.sanitize_context(value)
                        };
                        (key.clone(), sanitized_value)
                    })
                    .collect();
                serde_json::Value::Object(sanitized_map)
            }
            serde_json::Value::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(|v| self.sanitize_context(v)).collect())
            }
            serde_json::Value::String(s) => serde_json::Value::String(self.sanitize(s)),
            other => other.clone(),
        }
    }

    fn redact_group(&self, regex: &Regex, input: &str, group: usize) -> String {
        regex
            .replace_all(input, |caps: &regex::Captures| {
                let full_match = &caps[0];
                match caps.get(group) {
                    Some(value) => full_match.replace(value.as_str(), &self.config.replacement),
                    None => full_match.to_string(),
                }
            })
            .to_string()
    }

    fn strip_stack_traces(message: &str) -> String {
        let Some(regex) = STACK_FRAME_REGEX.get() else {
            return message.to_string();
        };
        message
            .lines()
            .filter(|line| !regex.is_match(line))
            .collect::<Vec<_>>()
            .join("\n")
            .trim_end()
            .to_string()
    }

    /// Check if a field name indicates sensitive data
    fn is_sensitive_field(field_name: &str) -> bool {
        let lower_name = field_name.to_lowercase();
        if matches!(
            lower_name.as_str(),
            "password" | "passwd" | "pwd" | "pass" | "key" | "code" | "code_verifier" | "crumb"
        ) {
            return true;
        }

        lower_name.contains("password")
            || lower_name.contains("token")
            || lower_name.contains("secret")
            || lower_name.contains("api_key")
            || lower_name.contains("apikey")
            || lower_name.contains("credential")
            || lower_name.contains("authorization")
            || lower_name.contains("bearer")
    }
}

impl Default for LogSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_SANITIZER: OnceLock<LogSanitizer> = OnceLock::new();

/// Get the global sanitizer instance
pub fn get_sanitizer() -> &'static LogSanitizer {
    GLOBAL_SANITIZER.get_or_init(LogSanitizer::new)
}

/// Initialize the global sanitizer with custom configuration.
/// Has no effect once the global sanitizer has been used.
pub fn init_sanitizer(config: SanitizationConfig) {
    let _ = GLOBAL_SANITIZER.set(LogSanitizer::with_config(config));
}

/// Log a formatted message through the global sanitizer
#[macro_export]
macro_rules! sanitized_log {
    ($level:ident, $($arg:tt)*) => {
        {
            let message = format!($($arg)*);
            let sanitized = $crate::sanitization::get_sanitizer().sanitize(&message);
            tracing::$level!("{}", sanitized);
        }
    };
}

/// Sanitized `error!`
#[macro_export]
macro_rules! sanitized_error {
    ($($arg:tt)*) => { $crate::sanitized_log!(error, $($arg)*) };
}

/// Sanitized `warn!`
#[macro_export]
macro_rules! sanitized_warn {
    ($($arg:tt)*) => { $crate::sanitized_log!(warn, $($arg)*) };
}

#[cfg(test)]
#[path = "sanitization_tests.rs"]
mod sanitization_tests;
