//! Gateway route table and router construction.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{ConnectInfo, Request};
use axum::http::{Method, Response};
use axum::routing::{get, on, MethodFilter};
use axum::Router;
use thiserror::Error;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::gateway::response::{error_response, payload_response};
use crate::mux::Protocol;
use crate::rpc::{CallContext, Dispatcher, Metadata, Status};

/// Built-in liveness endpoint.
pub const HEALTH_PATH: &str = "/healthz";

/// Binds an HTTP method and path to a registered RPC method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayRoute {
    pub method: Method,
    pub path: String,
    pub rpc_method: String,
}

impl GatewayRoute {
    /// Bind `method` `path` to `rpc_method`.
    pub fn new(method: Method, path: impl Into<String>, rpc_method: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            rpc_method: rpc_method.into(),
        }
    }

    /// Shorthand for a `GET` binding.
    pub fn get(path: impl Into<String>, rpc_method: impl Into<String>) -> Self {
        Self::new(Method::GET, path, rpc_method)
    }

    pub fn post(path: impl Into<String>, rpc_method: impl Into<String>) -> Self {
        Self::new(Method::POST, path, rpc_method)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("invalid gateway path `{path}`: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("gateway method {0} is not routable")]
    UnsupportedMethod(Method),

    #[error("gateway route {method} {path} is bound twice")]
    Duplicate { method: Method, path: String },

    #[error("gateway paths `{0}` and `{1}` capture the same segments under different names")]
    Conflict(String, String),

    #[error("gateway route {method} {path} targets unregistered RPC method `{rpc_method}`")]
    UnknownRpcMethod {
        method: Method,
        path: String,
        rpc_method: String,
    },
}

#[derive(Clone)]
struct GatewayState {
    dispatcher: Arc<Dispatcher>,
    default_timeout: Duration,
    max_body_bytes: usize,
}

/// Build the gateway router.
///
/// Every route runs through `dispatcher`, so gateway calls see the same
/// interceptor chain as RPC calls. `extra` routers serve whatever the bound
/// routes and `/healthz` do not match, tried in order. A path bound here
/// shadows the same path in an extra router for every method.
pub fn build_router(
    routes: &[GatewayRoute],
    dispatcher: Arc<Dispatcher>,
    default_timeout: Duration,
    max_body_bytes: usize,
    extra: Vec<Router>,
) -> Result<Router, RouteError> {
    check_routes(routes, &dispatcher)?;

    let state = GatewayState {
        dispatcher,
        default_timeout,
        max_body_bytes,
    };

    let mut router = Router::new().route(HEALTH_PATH, get(|| async { "ok" }));

    // axum wants one method router per path.
    let mut paths: Vec<&str> = Vec::new();
    for route in routes {
        if !paths.contains(&route.path.as_str()) {
            paths.push(&route.path);
        }
    }
    for path in paths {
        let mut method_router: Option<axum::routing::MethodRouter> = None;
        for route in routes.iter().filter(|r| r.path == path) {
            let filter = method_filter(&route.method)?;
            let state = state.clone();
            let rpc_method: Arc<str> = Arc::from(route.rpc_method.as_str());
            let handler = move |request: Request| invoke(state, rpc_method, request);
            method_router = Some(match method_router {
                None => on(filter, handler),
                Some(existing) => existing.on(filter, handler),
            });
        }
        if let Some(method_router) = method_router {
            router = router.route(path, method_router);
        }
    }

    let fallback = extra
        .into_iter()
        .rev()
        .reduce(|next, other| other.fallback_service(next));
    if let Some(fallback) = fallback {
        router = router.fallback_service(fallback);
    }

    Ok(router
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid)))
}

fn check_routes(routes: &[GatewayRoute], dispatcher: &Dispatcher) -> Result<(), RouteError> {
    let mut seen = HashSet::new();
    let mut shapes: Vec<(String, &str)> = Vec::new();
    for route in routes {
        let shape = path_shape(&route.path).map_err(|reason| RouteError::InvalidPath {
            path: route.path.clone(),
            reason,
        })?;
        if let Some((_, other)) = shapes.iter().find(|(s, p)| *s == shape && *p != route.path) {
            return Err(RouteError::Conflict(other.to_string(), route.path.clone()));
        }
        shapes.push((shape, route.path.as_str()));
        method_filter(&route.method)?;
        if route.path == HEALTH_PATH || !seen.insert((route.method.clone(), route.path.clone())) {
            return Err(RouteError::Duplicate {
                method: route.method.clone(),
                path: route.path.clone(),
            });
        }
        if !dispatcher.has_method(&route.rpc_method) {
            return Err(RouteError::UnknownRpcMethod {
                method: route.method.clone(),
                path: route.path.clone(),
                rpc_method: route.rpc_method.clone(),
            });
        }
    }
    Ok(())
}

/// Check `path` against the router's path syntax and return it with every
/// capture name erased. Two paths with the same shape collide in the router.
///
/// Accepted captures are whole segments: `{name}`, or `{*name}` as the last
/// segment.
fn path_shape(path: &str) -> Result<String, &'static str> {
    let Some(rest) = path.strip_prefix('/') else {
        return Err("must start with `/`");
    };
    let segments: Vec<&str> = rest.split('/').collect();
    let mut shape = String::new();
    for (i, segment) in segments.iter().enumerate() {
        shape.push('/');
        if segment.starts_with(':') || segment.starts_with('*') {
            return Err("captures use `{name}`, not `:name` or `*name`");
        }
        if !segment.contains(['{', '}']) {
            shape.push_str(segment);
            continue;
        }
        let Some(name) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) else {
            return Err("a capture must span a whole segment");
        };
        let (name, wildcard) = match name.strip_prefix('*') {
            Some(name) => (name, true),
            None => (name, false),
        };
        if name.is_empty() || name.contains(['{', '}', '*', ':']) {
            return Err("capture names must be non-empty identifiers");
        }
        if wildcard {
            if i + 1 != segments.len() {
                return Err("a `{*name}` capture must be the last segment");
            }
            shape.push_str("{*}");
        } else {
            shape.push_str("{}");
        }
    }
    Ok(shape)
}

fn method_filter(method: &Method) -> Result<MethodFilter, RouteError> {
    MethodFilter::try_from(method.clone())
        .map_err(|_| RouteError::UnsupportedMethod(method.clone()))
}

async fn invoke(state: GatewayState, rpc_method: Arc<str>, request: Request) -> Response<Body> {
    let (parts, body) = request.into_parts();

    let mut ctx = CallContext::new(&*rpc_method, Protocol::Gateway)
        .with_metadata(Metadata::from_headers(&parts.headers))
        .with_timeout(state.default_timeout);
    if let Some(ConnectInfo(addr)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
        ctx = ctx.with_peer_addr(*addr);
    }

    let payload = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(payload) => payload,
        Err(e) => {
            return error_response(&Status::resource_exhausted(format!(
                "failed to read request body: {e}"
            )))
        }
    };

    match state.dispatcher.dispatch_owned(ctx, rpc_method.to_string(), payload).await {
        Ok(reply) => {
            tracing::debug!(method = %rpc_method, "Gateway call succeeded");
            payload_response(reply)
        }
        Err(status) => {
            tracing::debug!(method = %rpc_method, code = %status.code(), "Gateway call failed");
            error_response(&status)
        }
    }
}
