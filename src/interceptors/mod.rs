//! Built-in interceptors.
//!
//! # Data Flow
//! ```text
//! ServerConfig.interceptors (+ enabled but unlisted modules)
//!     → build_interceptors (one instance per entry, in order)
//!     → Vec<Arc<dyn Interceptor>> handed to the Dispatcher
//! ```
//!
//! | Name         | Module          | Short-circuits with        |
//! |--------------|-----------------|----------------------------|
//! | `auth`       | auth.rs         | `Unauthenticated`          |
//! | `logging`    | logging.rs      | never                      |
//! | `rate-limit` | rate_limit.rs   | `ResourceExhausted`        |
//! | `request-id` | request_id.rs   | never                      |

pub mod auth;
pub mod logging;
pub mod rate_limit;
pub mod request_id;

use std::sync::Arc;

use crate::config::{InterceptorKind, ServerConfig};
use crate::rpc::Interceptor;

pub use auth::AuthInterceptor;
pub use logging::{CallObserver, CallRecord, LoggingInterceptor, TracingObserver};
pub use rate_limit::RateLimitInterceptor;
pub use request_id::{RequestIdInterceptor, X_REQUEST_ID};

/// Interceptor names in chain order.
///
/// The configured list comes first. Modules switched on in their own section
/// but missing from the list follow, in the order auth, logging, rate-limit.
pub fn effective_kinds(config: &ServerConfig) -> Vec<InterceptorKind> {
    let mut kinds = config.interceptors.clone();
    let implied = [
        (config.auth.enabled, InterceptorKind::Auth),
        (config.logging.enabled, InterceptorKind::Logging),
        (config.rate_limit.enabled, InterceptorKind::RateLimit),
    ];
    for (enabled, kind) in implied {
        if enabled && !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    kinds
}

/// Instantiate one interceptor for `kind`.
///
/// `observer` replaces the default tracing observer for `logging`.
pub fn build_interceptor(
    kind: InterceptorKind,
    config: &ServerConfig,
    observer: Option<&Arc<dyn CallObserver>>,
) -> Arc<dyn Interceptor> {
    match kind {
        InterceptorKind::Auth => {
            if !config.auth.enabled {
                tracing::warn!(
                    "`auth` is listed but auth is disabled; calls pass through unchecked"
                );
            }
            auth::auth_interceptor(&config.auth)
        }
        InterceptorKind::Logging => match observer {
            Some(observer) => Arc::new(LoggingInterceptor::new(observer.clone())),
            None => Arc::new(LoggingInterceptor::with_level(config.logging.level)),
        },
        InterceptorKind::RateLimit => {
            Arc::new(RateLimitInterceptor::from_config(&config.rate_limit))
        }
        InterceptorKind::RequestId => Arc::new(RequestIdInterceptor),
    }
}

/// Instantiate the whole built-in chain for `config`.
pub fn build_interceptors(
    config: &ServerConfig,
    observer: Option<&Arc<dyn CallObserver>>,
) -> Vec<Arc<dyn Interceptor>> {
    effective_kinds(config)
        .into_iter()
        .map(|kind| build_interceptor(kind, config, observer))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listed_order_is_kept_and_enabled_modules_are_appended() {
        let mut config = ServerConfig::default();
        config.interceptors = vec![InterceptorKind::RequestId, InterceptorKind::Logging];
        config.rate_limit.enabled = true;
        config.logging.enabled = true;
        config.auth.enabled = true;
        config.auth.secret = "s3cret".to_string();

        assert_eq!(
            effective_kinds(&config),
            vec![
                InterceptorKind::RequestId,
                InterceptorKind::Logging,
                InterceptorKind::Auth,
                InterceptorKind::RateLimit
            ]
        );

        let names: Vec<String> = build_interceptors(&config, None)
            .iter()
            .map(|i| i.name().to_string())
            .collect();
        assert_eq!(names, vec!["request-id", "logging", "auth", "rate-limit"]);
    }

    #[test]
    fn nothing_enabled_means_no_interceptors() {
        assert!(build_interceptors(&ServerConfig::default(), None).is_empty());
    }
}
