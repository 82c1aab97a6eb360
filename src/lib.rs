//! Dual-protocol request framework.
//!
//! One TCP port serves gRPC-style unary RPC calls over clear-text HTTP/2 and
//! an HTTP/JSON gateway. Both protocols run every call through the same
//! ordered interceptor chain before it reaches the registered handler.
//!
//! ```text
//! TCP ─▶ net::Listener ─▶ hyper auto (h1 | h2c) ─▶ mux::Multiplexer
//!                                                   ├─ Rpc ─────▶ rpc::RpcServer ─┐
//!                                                   └─ Gateway ─▶ gateway Router ─┤
//!                                                                                  ▼
//!                                  rpc::Dispatcher ─▶ I1 ─▶ .. ─▶ In ─▶ Handler
//! ```

pub mod config;
pub mod demo;
pub mod gateway;
pub mod interceptors;
pub mod lifecycle;
pub mod mux;
pub mod net;
pub mod observability;
pub mod rpc;
pub mod server;

pub use config::{ServerBuilder, ServerConfig};
pub use lifecycle::Shutdown;
pub use server::{Server, ServerError};
