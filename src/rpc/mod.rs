//! Call pipeline subsystem.
//!
//! # Data Flow
//! ```text
//! RpcServer::handle / gateway route
//!     → context.rs (CallContext: metadata, deadline, cancellation)
//!     → dispatcher.rs (method → memoized chain, NotFound otherwise)
//!     → chain.rs (I1 → I2 → .. → In → handler, right fold)
//!     → handler.rs (terminal business logic)
//!     ← result flows back out through In .. I1
//! ```
//!
//! Registry, interceptor list and chains are built once and are read-only
//! while serving.

pub mod chain;
pub mod codec;
pub mod context;
pub mod dispatcher;
pub mod handler;
pub mod interceptor;
pub mod metadata;
pub mod registry;
pub mod server;
pub mod status;

pub use context::{CallContext, CallLifetime};
pub use dispatcher::Dispatcher;
pub use handler::{handler_fn, CallResult, Handler};
pub use interceptor::Interceptor;
pub use metadata::Metadata;
pub use registry::{MethodRegistry, RegistryError};
pub use server::RpcServer;
pub use status::{Code, Status};
