//! Per-call context passed by mutable reference through the chain.
//!
//! # Responsibilities
//! - Carry the method name, protocol and metadata of one call
//! - Carry the call lifetime: a cancellation token and an optional deadline
//! - Let blocking interceptors and handlers stop promptly when the call is over

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::mux::Protocol;
use crate::rpc::metadata::Metadata;
use crate::rpc::status::Status;

/// Context of a single in-flight call.
#[derive(Debug)]
pub struct CallContext {
    method: String,
    protocol: Protocol,
    metadata: Metadata,
    peer_addr: Option<SocketAddr>,
    lifetime: CallLifetime,
}

impl CallContext {
    /// Create a context for `method` with empty metadata and no deadline.
    pub fn new(method: impl Into<String>, protocol: Protocol) -> Self {
        Self {
            method: method.into(),
            protocol,
            metadata: Metadata::new(),
            peer_addr: None,
            lifetime: CallLifetime::new(None),
        }
    }

    /// Replace the metadata.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Set the address of the calling client.
    pub fn with_peer_addr(mut self, addr: SocketAddr) -> Self {
        self.peer_addr = Some(addr);
        self
    }

    /// Set the deadline to `timeout` from now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.lifetime.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Set an absolute deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.lifetime.deadline = Some(deadline);
        self
    }

    /// Get the method name, e.g. `/greeter.Greeter/SayHello`.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Get the protocol the call arrived on.
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Get the call metadata.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Get the call metadata for appending.
    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    /// Get the client address, if the transport knows it.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Get the deadline, if one is set.
    pub fn deadline(&self) -> Option<Instant> {
        self.lifetime.deadline
    }

    /// Shortcut for the `x-request-id` metadata value.
    pub fn request_id(&self) -> Option<&str> {
        self.metadata.get(crate::interceptors::request_id::X_REQUEST_ID)
    }

    /// Cancel the call. Anything racing `done()` wakes up with `Canceled`.
    pub fn cancel(&self) {
        self.lifetime.token.cancel();
    }

    /// Get the token that cancels this call.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.lifetime.token
    }

    /// Owned handle on the call lifetime, usable while the context itself is
    /// mutably borrowed further down the chain.
    pub fn lifetime(&self) -> CallLifetime {
        self.lifetime.clone()
    }

    /// Fails if the call was already canceled or its deadline has passed.
    pub fn check(&self) -> Result<(), Status> {
        self.lifetime.check()
    }

    /// Resolves once the call is canceled or its deadline passes.
    pub async fn done(&self) -> Status {
        self.lifetime.done().await
    }

    /// Run `work` unless the call ends first.
    pub async fn run<F, T>(&self, work: F) -> Result<T, Status>
    where
        F: Future<Output = Result<T, Status>>,
    {
        self.lifetime.run(work).await
    }
}

/// Cancellation token plus optional deadline for one call.
#[derive(Debug, Clone)]
pub struct CallLifetime {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CallLifetime {
    fn new(deadline: Option<Instant>) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline,
        }
    }

    /// Fails if the call is canceled or past its deadline.
    pub fn check(&self) -> Result<(), Status> {
        if self.token.is_cancelled() {
            return Err(Status::canceled("call canceled"));
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                Err(Status::deadline_exceeded("deadline exceeded"))
            }
            _ => Ok(()),
        }
    }

    /// [`CallContext::done`] on an owned handle.
    pub async fn done(&self) -> Status {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.token.cancelled() => Status::canceled("call canceled"),
                _ = tokio::time::sleep_until(deadline) => {
                    Status::deadline_exceeded("deadline exceeded")
                }
            },
            None => {
                self.token.cancelled().await;
                Status::canceled("call canceled")
            }
        }
    }

    /// Race `work` against cancellation and the deadline. A call that is
    /// already over never polls `work`.
    pub async fn run<F, T>(&self, work: F) -> Result<T, Status>
    where
        F: Future<Output = Result<T, Status>>,
    {
        self.check()?;
        tokio::select! {
            biased;
            status = self.done() => Err(status),
            result = work => result,
        }
    }
}
