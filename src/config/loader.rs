//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ServerConfig;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Parse configuration from TOML text.
///
/// Only syntax and types are checked here. Semantic validation runs in
/// `ServerBuilder::build`, after every option has been applied.
pub fn parse_config(content: &str) -> Result<ServerConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Read and parse a TOML configuration file.
pub fn read_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::InterceptorKind;
    use std::time::Duration;

    #[test]
    fn missing_sections_take_defaults() {
        let config = parse_config(
            "interceptors = [\"request-id\"]\n[timeouts]\nrequest_ms = 1500\n",
        )
        .unwrap();
        assert_eq!(config.interceptors, vec![InterceptorKind::RequestId]);
        assert_eq!(config.timeouts.request_timeout(), Duration::from_millis(1500));
        assert_eq!(config.shutdown.drain_timeout(), Duration::from_secs(30));
        assert_eq!(config.listener, ServerConfig::default().listener);
    }

    #[test]
    fn semantic_problems_are_left_to_the_builder() {
        let config = parse_config("[listener]\nmax_connections = 0\n").unwrap();
        assert_eq!(config.listener.max_connections, 0);
    }

    #[test]
    fn syntax_errors_are_parse_errors() {
        assert!(matches!(parse_config("listener = ["), Err(ConfigError::Parse(_))));
        assert!(matches!(
            parse_config("interceptors = [\"tracing\"]"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
