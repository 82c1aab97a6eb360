//! Configuration validation.
//!
//! Semantic checks on top of what serde already enforces (types, known
//! interceptor names). Returns every problem found, not just the first.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{InterceptorKind, LogLevel, ServerConfig};

/// One semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Run every semantic check on `config`.
///
/// Returns all problems found, in field order.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("`{}` is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be greater than 0"));
    }

    let listed = |kind| config.interceptors.contains(&kind);

    if config.auth.enabled || listed(InterceptorKind::Auth) {
        if config.auth.secret.is_empty() {
            errors.push(ValidationError::new(
                "auth.secret",
                "required when auth is enabled or listed",
            ));
        }
        if config.auth.metadata_key.trim().is_empty() {
            errors.push(ValidationError::new("auth.metadata_key", "must not be empty"));
        }
    }

    if config.observability.log_level.parse::<LogLevel>().is_err() {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!(
                "`{}` is not one of {}",
                config.observability.log_level,
                LogLevel::NAMES.join(", ")
            ),
        ));
    }

    if config.rate_limit.enabled || listed(InterceptorKind::RateLimit) {
        if config.rate_limit.requests_per_second == 0 {
            errors.push(ValidationError::new(
                "rate_limit.requests_per_second",
                "must be greater than 0",
            ));
        }
        if config.rate_limit.burst_size == 0 {
            errors.push(ValidationError::new("rate_limit.burst_size", "must be greater than 0"));
        }
    }

    if config.timeouts.request_ms == 0 {
        errors.push(ValidationError::new("timeouts.request_ms", "must be greater than 0"));
    }
    if config.timeouts.max_message_bytes == 0 {
        errors.push(ValidationError::new("timeouts.max_message_bytes", "must be greater than 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("`{}` is not a socket address", config.observability.metrics_address),
        ));
    }

    if let Some(store) = &config.store {
        if store.address.is_empty() {
            errors.push(ValidationError::new("store.address", "must not be empty"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::StoreConfig;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(validate_config(&ServerConfig::default()), Ok(()));
    }

    #[test]
    fn collects_every_error() {
        let mut config = ServerConfig::default();
        config.listener.bind_address = "not-an-address".to_string();
        config.listener.max_connections = 0;
        config.auth.enabled = true;
        config.observability.log_level = "loud".to_string();
        config.rate_limit.enabled = true;
        config.rate_limit.burst_size = 0;
        config.timeouts.request_ms = 0;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "listener.bind_address",
                "listener.max_connections",
                "auth.secret",
                "observability.log_level",
                "rate_limit.burst_size",
                "timeouts.request_ms",
            ]
        );
    }

    #[test]
    fn listing_auth_requires_secret() {
        let config = ServerConfig {
            interceptors: vec![InterceptorKind::Auth],
            ..ServerConfig::default()
        };
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "auth.secret");
    }

    #[test]
    fn metrics_address_checked_only_when_enabled() {
        let mut config = ServerConfig::default();
        config.observability.metrics_address = "nowhere".to_string();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn store_needs_address() {
        let config = ServerConfig {
            store: Some(StoreConfig::default()),
            ..ServerConfig::default()
        };
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].to_string(), "store.address: must not be empty");
    }
}
