//! Routes each request to the RPC engine or the HTTP gateway.

use std::convert::Infallible;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use tower::ServiceExt;

use crate::mux::classify::{classify, Protocol};
use crate::observability::metrics;
use crate::rpc::server::RpcServer;

/// Pure router between the two sub-servers sharing one port.
///
/// The request is forwarded unmodified; the multiplexer reads nothing but
/// the protocol version and content type.
#[derive(Clone)]
pub struct Multiplexer {
    rpc: RpcServer,
    gateway: Router,
}

impl Multiplexer {
    /// Create a multiplexer over the two sub-servers.
    pub fn new(rpc: RpcServer, gateway: Router) -> Self {
        Self { rpc, gateway }
    }

    /// Classify `request` and hand it to the matching sub-server unchanged.
    pub async fn route(&self, request: Request<Body>) -> Response<Body> {
        let protocol = classify(&request);
        tracing::debug!(
            protocol = %protocol,
            method = %request.method(),
            path = %request.uri().path(),
            "Routing request"
        );
        metrics::record_routed(protocol);

        match protocol {
            Protocol::Rpc => self.rpc.handle(request).await,
            Protocol::Gateway => {
                let result: Result<Response<Body>, Infallible> =
                    self.gateway.clone().oneshot(request).await;
                match result {
                    Ok(response) => response,
                    Err(never) => match never {},
                }
            }
        }
    }
}
