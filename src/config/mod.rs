//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)             builder.rs options (with_auth, ..)
//!     → loader.rs (parse)            │
//!     → ServerConfig ◀───────────────┘ applied in call order
//!     → validation.rs (semantic checks, all errors)
//!     → Server (immutable while serving)
//! ```
//!
//! # Design Decisions
//! - Config is frozen by `ServerBuilder::build`; no reload while serving
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod builder;
pub mod loader;
pub mod schema;
pub mod validation;

pub use builder::{BuildError, ServerBuilder};
pub use loader::{parse_config, read_config, ConfigError};
pub use schema::{
    mask_secret, AuthConfig, InterceptorKind, ListenerConfig, LogLevel, LoggingConfig,
    ObservabilityConfig, RateLimitConfig, ServerConfig, ShutdownConfig, StoreConfig, TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
