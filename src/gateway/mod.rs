//! HTTP gateway subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP/1.1 (or non-RPC HTTP/2) request from the multiplexer
//!     → tower-http layers (trace, x-request-id set/propagate)
//!     → routes.rs (GatewayRoute: method + path → RPC method name)
//!     → rpc::Dispatcher (same interceptor chain as RPC traffic)
//!     → response.rs (200 JSON payload | status → HTTP error JSON)
//! ```

pub mod response;
pub mod routes;

pub use response::{error_response, ErrorBody};
pub use routes::{build_router, GatewayRoute, RouteError, HEALTH_PATH};
