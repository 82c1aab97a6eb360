//! Server options builder.
//!
//! Options apply in call order. Scalar settings are last-write-wins; the
//! interceptor chain and the registrations only ever grow. A built-in
//! interceptor is placed once, at the position where it was first enabled.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use thiserror::Error;

use crate::config::loader::{read_config, ConfigError};
use crate::config::schema::{
    InterceptorKind, LogLevel, ServerConfig, StoreConfig, DEFAULT_ACCESS_TTL, DEFAULT_REFRESH_TTL,
};
use crate::config::validation::{validate_config, ValidationError};
use crate::gateway::{self, GatewayRoute, RouteError};
use crate::interceptors::{self, CallObserver};
use crate::mux::Multiplexer;
use crate::rpc::{Dispatcher, Handler, Interceptor, MethodRegistry, RegistryError, RpcServer};
use crate::server::Server;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid configuration: {}", join(.0))]
    Validation(Vec<ValidationError>),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Route(#[from] RouteError),
}

fn join(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

enum ChainEntry {
    Builtin(InterceptorKind),
    Custom(Arc<dyn Interceptor>),
}

type Register = Box<dyn FnOnce(&mut MethodRegistry) -> Result<(), RegistryError> + Send>;

/// Assembles a [`Server`].
///
/// ```no_run
/// # use dualport::config::ServerBuilder;
/// # use dualport::config::LogLevel;
/// # fn demo() -> Result<(), dualport::config::BuildError> {
/// let server = ServerBuilder::new()
///     .with_address("127.0.0.1:8080")
///     .with_auth("my-super-secret-key-123456")
///     .with_logging(LogLevel::Debug)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ServerBuilder {
    config: ServerConfig,
    chain: Vec<ChainEntry>,
    observer: Option<Arc<dyn CallObserver>>,
    registers: Vec<Register>,
    routes: Vec<GatewayRoute>,
    routers: Vec<Router>,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    /// Create a builder with default settings and nothing registered.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            chain: Vec::new(),
            observer: None,
            registers: Vec::new(),
            routes: Vec::new(),
            routers: Vec::new(),
        }
    }

    /// Replace every setting with `config`.
    ///
    /// Built-in interceptors named by earlier options are dropped in favour
    /// of `config.interceptors`; custom interceptors are kept.
    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.chain.retain(|entry| matches!(entry, ChainEntry::Custom(_)));
        for kind in &config.interceptors {
            self.push_builtin(*kind);
        }
        self.config = config;
        self
    }

    /// [`with_config`](Self::with_config) from a TOML file. Validation runs
    /// in `build`, after every option is applied.
    pub fn from_file(self, path: impl AsRef<Path>) -> Result<Self, BuildError> {
        let config = read_config(path.as_ref())?;
        Ok(self.with_config(config))
    }

    /// Set the listening address.
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.config.listener.bind_address = address.into();
        self
    }

    /// Set the concurrent connection limit.
    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.config.listener.max_connections = max_connections;
        self
    }

    /// Enable shared-secret authentication with the default token lifetimes.
    pub fn with_auth(self, secret: impl Into<String>) -> Self {
        self.with_auth_advanced(secret, DEFAULT_ACCESS_TTL, DEFAULT_REFRESH_TTL)
    }

    /// Enable authentication with explicit token lifetimes. The lifetimes
    /// are stored, not enforced.
    pub fn with_auth_advanced(
        mut self,
        secret: impl Into<String>,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        let auth = &mut self.config.auth;
        auth.enabled = true;
        auth.secret = secret.into();
        auth.access_ttl_secs = access_ttl.as_secs();
        auth.refresh_ttl_secs = refresh_ttl.as_secs();
        self.push_builtin(InterceptorKind::Auth);
        self
    }

    /// Read the credential from `key` instead of `authorization`.
    pub fn with_auth_metadata_key(mut self, key: impl Into<String>) -> Self {
        self.config.auth.metadata_key = key.into();
        self
    }

    /// Enable the logging interceptor at `level`.
    pub fn with_logging(mut self, level: LogLevel) -> Self {
        self.config.logging.enabled = true;
        self.config.logging.level = level;
        self.push_builtin(InterceptorKind::Logging);
        self
    }

    /// Enable per-client rate limiting. A call that finds the bucket empty
    /// waits up to `max_delay` for a token before it is rejected.
    pub fn with_rate_limit(
        mut self,
        requests_per_second: u32,
        burst_size: u32,
        max_delay: Duration,
    ) -> Self {
        let rate_limit = &mut self.config.rate_limit;
        rate_limit.enabled = true;
        rate_limit.requests_per_second = requests_per_second;
        rate_limit.burst_size = burst_size;
        rate_limit.max_delay_ms = millis(max_delay);
        self.push_builtin(InterceptorKind::RateLimit);
        self
    }

    /// Append built-in interceptors by name.
    ///
    /// A built-in kind runs at most once per chain: names already placed,
    /// by this call or by an earlier option such as `with_auth`, are skipped
    /// and keep their first position. `[RequestId, RequestId]` therefore
    /// installs a single request-id interceptor. Use
    /// [`with_interceptor`](Self::with_interceptor) to add further instances.
    pub fn with_interceptors(mut self, kinds: impl IntoIterator<Item = InterceptorKind>) -> Self {
        for kind in kinds {
            self.push_builtin(kind);
        }
        self
    }

    /// Append a custom interceptor.
    pub fn with_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.chain.push(ChainEntry::Custom(interceptor));
        self
    }

    /// Send logging records to `observer` instead of `tracing`.
    pub fn with_call_observer(mut self, observer: Arc<dyn CallObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Default deadline for calls that arrive without one. Kept at
    /// millisecond precision.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeouts.request_ms = millis(timeout);
        self
    }

    /// Set the largest accepted request message.
    pub fn with_max_message_bytes(mut self, limit: usize) -> Self {
        self.config.timeouts.max_message_bytes = limit;
        self
    }

    /// How long open connections may keep running once shutdown starts.
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown.drain_timeout_ms = millis(timeout);
        self
    }

    /// Register `handler` under `method` at build time.
    pub fn with_rpc_handler(
        mut self,
        method: impl Into<String>,
        handler: Arc<dyn Handler>,
    ) -> Self {
        let method = method.into();
        self.registers.push(Box::new(move |registry: &mut MethodRegistry| {
            registry.register(method, handler)
        }));
        self
    }

    /// Run `register` against the method registry at build time.
    pub fn with_rpc_registers<F>(mut self, register: F) -> Self
    where
        F: FnOnce(&mut MethodRegistry) -> Result<(), RegistryError> + Send + 'static,
    {
        self.registers.push(Box::new(register));
        self
    }

    /// Bind HTTP routes to registered RPC methods.
    pub fn with_gateway_routes(mut self, routes: impl IntoIterator<Item = GatewayRoute>) -> Self {
        self.routes.extend(routes);
        self
    }

    /// Add a hand-written axum router to the gateway.
    ///
    /// It only sees requests that no bound route and no earlier router
    /// matched, so overlapping paths resolve to the first owner instead of
    /// failing.
    pub fn with_gateway_router(mut self, router: Router) -> Self {
        self.routers.push(router);
        self
    }

    /// Backing store settings, handed to the application through
    /// [`Server::store`].
    pub fn with_store(
        mut self,
        address: impl Into<String>,
        password: impl Into<String>,
        db: u32,
    ) -> Self {
        self.config.store = Some(StoreConfig {
            address: address.into(),
            password: password.into(),
            db,
        });
        self
    }

    /// Settings as they stand.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Names of the interceptors `build` would install, outermost first.
    pub fn interceptor_names(&self) -> Vec<String> {
        self.entries()
            .iter()
            .map(|entry| match entry {
                Entry::Builtin(kind) => kind.as_str().to_string(),
                Entry::Custom(interceptor) => interceptor.name().to_string(),
            })
            .collect()
    }

    fn push_builtin(&mut self, kind: InterceptorKind) {
        let present = self
            .chain
            .iter()
            .any(|entry| matches!(entry, ChainEntry::Builtin(k) if *k == kind));
        if !present {
            self.chain.push(ChainEntry::Builtin(kind));
        }
    }

    /// Final chain order: explicit entries, then modules enabled in their
    /// config section but never placed.
    fn entries(&self) -> Vec<Entry<'_>> {
        let mut entries: Vec<Entry<'_>> = self
            .chain
            .iter()
            .map(|entry| match entry {
                ChainEntry::Builtin(kind) => Entry::Builtin(*kind),
                ChainEntry::Custom(interceptor) => Entry::Custom(interceptor),
            })
            .collect();

        let mut listed = self.config.clone();
        listed.interceptors = self.builtin_kinds();
        for kind in interceptors::effective_kinds(&listed) {
            if !entries.iter().any(|e| matches!(e, Entry::Builtin(k) if *k == kind)) {
                entries.push(Entry::Builtin(kind));
            }
        }
        entries
    }

    fn builtin_kinds(&self) -> Vec<InterceptorKind> {
        self.chain
            .iter()
            .filter_map(|entry| match entry {
                ChainEntry::Builtin(kind) => Some(*kind),
                ChainEntry::Custom(_) => None,
            })
            .collect()
    }

    /// Validate, register handlers, build chains and freeze the server.
    pub fn build(self) -> Result<Server, BuildError> {
        let entries = self.entries();

        let mut config = self.config.clone();
        config.interceptors = entries
            .iter()
            .filter_map(|entry| match entry {
                Entry::Builtin(kind) => Some(*kind),
                Entry::Custom(_) => None,
            })
            .collect();
        validate_config(&config).map_err(BuildError::Validation)?;

        let chain: Vec<Arc<dyn Interceptor>> = entries
            .iter()
            .map(|entry| match entry {
                Entry::Builtin(kind) => {
                    interceptors::build_interceptor(*kind, &config, self.observer.as_ref())
                }
                Entry::Custom(interceptor) => Arc::clone(interceptor),
            })
            .collect();
        drop(entries);

        let mut registry = MethodRegistry::new();
        for register in self.registers {
            register(&mut registry)?;
        }

        let dispatcher = Arc::new(Dispatcher::new(&chain, &registry));
        let timeout = config.timeouts.request_timeout();
        let max_bytes = config.timeouts.max_message_bytes;

        let gateway = gateway::build_router(
            &self.routes,
            dispatcher.clone(),
            timeout,
            max_bytes,
            self.routers,
        )?;
        let rpc = RpcServer::new(dispatcher.clone(), timeout, max_bytes);

        tracing::info!(
            bind_address = %config.listener.bind_address,
            interceptors = ?dispatcher.interceptor_names(),
            methods = registry.len(),
            gateway_routes = self.routes.len(),
            "Server built"
        );

        Ok(Server::new(config, dispatcher, Multiplexer::new(rpc, gateway)))
    }
}

enum Entry<'a> {
    Builtin(InterceptorKind),
    Custom(&'a Arc<dyn Interceptor>),
}

impl fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerBuilder")
            .field("config", &self.config)
            .field("interceptors", &self.interceptor_names())
            .field("registers", &self.registers.len())
            .field("routes", &self.routes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::{handler_fn, Status};
    use bytes::Bytes;

    fn hello() -> Arc<dyn Handler> {
        handler_fn(|_, _| async { Ok::<_, Status>(Bytes::from_static(b"hi")) })
    }

    #[test]
    fn options_apply_in_order_last_write_wins() {
        let builder = ServerBuilder::new()
            .with_address("127.0.0.1:1111")
            .with_logging(LogLevel::Debug)
            .with_auth("first-secret")
            .with_address("127.0.0.1:2222")
            .with_logging(LogLevel::Error)
            .with_auth("second-secret");

        let config = builder.config();
        assert_eq!(config.listener.bind_address, "127.0.0.1:2222");
        assert_eq!(config.logging.level, LogLevel::Error);
        assert_eq!(config.auth.secret, "second-secret");
        assert_eq!(builder.interceptor_names(), vec!["logging", "auth"]);
    }

    #[test]
    fn auth_defaults_and_advanced_ttls() {
        let builder = ServerBuilder::new().with_auth("s");
        assert_eq!(builder.config().auth.access_ttl_secs, 24 * 60 * 60);
        assert_eq!(builder.config().auth.refresh_ttl_secs, 7 * 24 * 60 * 60);

        let builder =
            builder.with_auth_advanced("s", Duration::from_secs(7200), Duration::from_secs(86400));
        assert_eq!(builder.config().auth.access_ttl_secs, 7200);
        assert_eq!(builder.config().auth.refresh_ttl_secs, 86400);
    }

    #[test]
    fn custom_and_builtin_interceptors_interleave() {
        struct Tag;
        #[async_trait::async_trait]
        impl Interceptor for Tag {
            fn name(&self) -> &str {
                "tag"
            }
            async fn intercept(
                &self,
                ctx: &mut crate::rpc::CallContext,
                request: Bytes,
                next: &dyn Handler,
            ) -> crate::rpc::CallResult {
                next.call(ctx, request).await
            }
        }

        let builder = ServerBuilder::new()
            .with_interceptors([InterceptorKind::RequestId])
            .with_interceptor(Arc::new(Tag))
            .with_logging(LogLevel::Info)
            .with_interceptors([InterceptorKind::RequestId, InterceptorKind::Logging]);
        assert_eq!(builder.interceptor_names(), vec!["request-id", "tag", "logging"]);
    }

    #[test]
    fn repeated_builtin_kind_is_placed_once() {
        let builder = ServerBuilder::new()
            .with_interceptors([InterceptorKind::RequestId, InterceptorKind::RequestId])
            .with_interceptor(Arc::new(crate::interceptors::RequestIdInterceptor));
        assert_eq!(builder.interceptor_names(), vec!["request-id", "request-id"]);
        assert_eq!(builder.builtin_kinds(), vec![InterceptorKind::RequestId]);
    }

    #[test]
    fn config_modules_enabled_without_placement_are_appended() {
        let mut config = ServerConfig::default();
        config.rate_limit.enabled = true;
        let builder = ServerBuilder::new()
            .with_config(config)
            .with_interceptors([InterceptorKind::RequestId]);
        assert_eq!(builder.interceptor_names(), vec!["request-id", "rate-limit"]);
    }

    #[test]
    fn duplicate_registration_fails_build() {
        let err = ServerBuilder::new()
            .with_rpc_handler("/greeter.Greeter/SayHello", hello())
            .with_rpc_handler("/greeter.Greeter/SayHello", hello())
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::Registry(RegistryError::Duplicate(_))));
    }

    #[test]
    fn invalid_settings_fail_build_with_every_error() {
        let err = ServerBuilder::new()
            .with_address("nowhere")
            .with_interceptors([InterceptorKind::Auth])
            .build()
            .unwrap_err();
        match err {
            BuildError::Validation(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn sub_second_timeouts_are_kept() {
        let server = ServerBuilder::new()
            .with_request_timeout(Duration::from_millis(500))
            .with_drain_timeout(Duration::from_millis(250))
            .build()
            .unwrap();
        assert_eq!(server.config().timeouts.request_timeout(), Duration::from_millis(500));
        assert_eq!(server.config().shutdown.drain_timeout(), Duration::from_millis(250));

        let err = ServerBuilder::new()
            .with_request_timeout(Duration::from_micros(10))
            .build()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid configuration: timeouts.request_ms: must be greater than 0"
        );
    }

    #[test]
    fn route_to_unknown_method_fails_build() {
        let err = ServerBuilder::new()
            .with_gateway_routes([GatewayRoute::post("/v1/x", "/missing.Svc/Call")])
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::Route(_)));
    }

    #[test]
    fn unroutable_paths_and_overlapping_routers_do_not_panic() {
        let err = ServerBuilder::new()
            .with_rpc_handler("/greeter.Greeter/SayHello", hello())
            .with_gateway_routes([GatewayRoute::post("/v1/:name", "/greeter.Greeter/SayHello")])
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::Route(RouteError::InvalidPath { .. })));

        let overlapping = Router::new().route(
            crate::gateway::HEALTH_PATH,
            axum::routing::get(|| async { "mine" }),
        );
        let server = ServerBuilder::new()
            .with_gateway_router(overlapping.clone())
            .with_gateway_router(overlapping)
            .build();
        assert!(server.is_ok());
    }

    #[test]
    fn build_freezes_chain_and_store() {
        let server = ServerBuilder::new()
            .with_address("127.0.0.1:0")
            .with_auth("valid-token-123")
            .with_logging(LogLevel::Info)
            .with_store("localhost:6379", "", 0)
            .with_rpc_registers(|registry| registry.register("/greeter.Greeter/SayHello", hello()))
            .with_gateway_routes([GatewayRoute::post(
                "/v1/greeter/hello",
                "/greeter.Greeter/SayHello",
            )])
            .build()
            .unwrap();

        assert_eq!(server.interceptor_names(), ["auth", "logging"]);
        assert_eq!(
            server.config().interceptors,
            vec![InterceptorKind::Auth, InterceptorKind::Logging]
        );
        assert_eq!(server.store().map(|s| s.address.as_str()), Some("localhost:6379"));
        assert!(server.dispatcher().has_method("/greeter.Greeter/SayHello"));
    }
}
