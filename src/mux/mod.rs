//! Protocol multiplexing subsystem.
//!
//! # Data Flow
//! ```text
//! hyper connection (HTTP/1.1 or clear-text HTTP/2)
//!     → classify.rs (version + content-type → Rpc | Gateway)
//!     → multiplexer.rs
//!         → Rpc:     rpc::RpcServer::handle
//!         → Gateway: gateway axum Router
//! ```

pub mod classify;
pub mod multiplexer;

pub use classify::{classify, Protocol};
pub use multiplexer::Multiplexer;
