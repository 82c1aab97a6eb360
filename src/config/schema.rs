//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files, and
//! every section has defaults so an empty file is a valid configuration.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the dual-protocol server.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address, connection limit).
    pub listener: ListenerConfig,

    /// Shared-secret authentication.
    pub auth: AuthConfig,

    /// Per-call logging.
    pub logging: LoggingConfig,

    /// Per-client rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Ordered list of built-in interceptors, outermost first.
    pub interceptors: Vec<InterceptorKind>,

    /// Timeout and size limits.
    pub timeouts: TimeoutConfig,

    /// Backing store settings handed to the application, if any.
    pub store: Option<StoreConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Graceful shutdown settings.
    pub shutdown: ShutdownConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Authentication configuration.
#[derive(Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    pub enabled: bool,

    /// Credential callers must present.
    pub secret: String,

    /// Metadata key carrying the credential.
    pub metadata_key: String,

    /// Access token lifetime in seconds.
    pub access_ttl_secs: u64,

    /// Refresh token lifetime in seconds.
    pub refresh_ttl_secs: u64,
}

pub const DEFAULT_ACCESS_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_REFRESH_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            secret: String::new(),
            metadata_key: "authorization".to_string(),
            access_ttl_secs: DEFAULT_ACCESS_TTL.as_secs(),
            refresh_ttl_secs: DEFAULT_REFRESH_TTL.as_secs(),
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("enabled", &self.enabled)
            .field("secret", &mask_secret(&self.secret))
            .field("metadata_key", &self.metadata_key)
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .finish()
    }
}

/// Verbosity of call log events.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub const NAMES: [&'static str; 5] = ["trace", "debug", "info", "warn", "error"];

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!(
                "unknown log level `{other}`, expected one of {}",
                Self::NAMES.join(", ")
            )),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Call logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    pub level: LogLevel,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Maximum requests per second per client IP.
    pub requests_per_second: u32,

    /// Burst capacity.
    pub burst_size: u32,

    /// How long a call may wait for a token before it is rejected. Zero
    /// rejects immediately.
    pub max_delay_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            requests_per_second: 100,
            burst_size: 50,
            max_delay_ms: 0,
        }
    }
}

/// Built-in interceptor names accepted in `interceptors = [..]`.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum InterceptorKind {
    Auth,
    Logging,
    RateLimit,
    RequestId,
}

impl InterceptorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            InterceptorKind::Auth => "auth",
            InterceptorKind::Logging => "logging",
            InterceptorKind::RateLimit => "rate-limit",
            InterceptorKind::RequestId => "request-id",
        }
    }
}

impl fmt::Display for InterceptorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Default per-call deadline in milliseconds, when the caller sends none.
    pub request_ms: u64,

    /// Largest accepted request body in bytes.
    pub max_message_bytes: usize,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_ms: 30_000,
            max_message_bytes: 4 * 1024 * 1024,
        }
    }
}

impl TimeoutConfig {
    /// Default per-call deadline.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_ms)
    }
}

/// Backing key-value store settings.
#[derive(Clone, Deserialize, Serialize, PartialEq, Default)]
#[serde(default)]
pub struct StoreConfig {
    pub address: String,
    pub password: String,
    pub db: u32,
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("address", &self.address)
            .field("password", &mask_secret(&self.password))
            .field("db", &self.db)
            .finish()
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Graceful shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ShutdownConfig {
    /// How long in-flight connections may run after shutdown starts, in
    /// milliseconds.
    pub drain_timeout_ms: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { drain_timeout_ms: 30_000 }
    }
}

impl ShutdownConfig {
    /// Drain window after shutdown starts.
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

/// Obscure a secret for display, keeping at most two characters at each end.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    match chars.len() {
        0 => "<unset>".to_string(),
        1..=4 => "****".to_string(),
        n => {
            let head: String = chars[..2].iter().collect();
            let tail: String = chars[n - 2..].iter().collect();
            format!("{head}****{tail}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_all_defaults() {
        let config: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(config, ServerConfig::default());
        assert!(config.interceptors.is_empty());
        assert!(config.store.is_none());
    }

    #[test]
    fn parses_every_section() {
        let config: ServerConfig = toml::from_str(
            r#"
            interceptors = ["request-id", "logging", "auth", "rate-limit"]

            [listener]
            bind_address = "127.0.0.1:9000"

            [auth]
            enabled = true
            secret = "valid-token-123"
            metadata_key = "token"

            [logging]
            enabled = true
            level = "debug"

            [rate_limit]
            requests_per_second = 5
            max_delay_ms = 20

            [store]
            address = "localhost:6379"
            password = "strong-password"
            db = 1
            "#,
        )
        .unwrap();

        assert_eq!(
            config.interceptors,
            vec![
                InterceptorKind::RequestId,
                InterceptorKind::Logging,
                InterceptorKind::Auth,
                InterceptorKind::RateLimit
            ]
        );
        assert_eq!(config.listener.bind_address, "127.0.0.1:9000");
        assert_eq!(config.listener.max_connections, 10_000);
        assert_eq!(config.auth.metadata_key, "token");
        assert_eq!(config.auth.access_ttl_secs, DEFAULT_ACCESS_TTL.as_secs());
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.rate_limit.burst_size, 50);
        assert_eq!(config.store.as_ref().map(|s| s.db), Some(1));
    }

    #[test]
    fn unknown_interceptor_name_is_rejected() {
        let err =
            toml::from_str::<ServerConfig>(r#"interceptors = ["auth", "metrics"]"#).unwrap_err();
        assert!(err.to_string().contains("metrics"));
    }

    #[test]
    fn secrets_are_masked_in_debug_output() {
        let store = StoreConfig {
            address: "redis.prod.com:6379".to_string(),
            password: "strong-password".to_string(),
            db: 1,
        };
        let printed = format!("{store:?}");
        assert!(printed.contains("st****rd"));
        assert!(!printed.contains("strong-password"));

        let auth = AuthConfig {
            secret: "prod-secret-key".to_string(),
            ..AuthConfig::default()
        };
        assert!(!format!("{auth:?}").contains("prod-secret-key"));
    }

    #[test]
    fn mask_secret_lengths() {
        assert_eq!(mask_secret(""), "<unset>");
        assert_eq!(mask_secret("abcd"), "****");
        assert_eq!(mask_secret("my-super-secret"), "my****et");
    }

    #[test]
    fn log_level_from_str() {
        assert_eq!("WARN".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert!("verbose".parse::<LogLevel>().is_err());
    }
}
