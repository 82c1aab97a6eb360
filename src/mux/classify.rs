//! Protocol classification.
//!
//! A request is RPC iff it arrived over HTTP/2 and its content type names the
//! RPC media type. Only the protocol version and the `content-type` header are
//! read; the body is never touched.

use axum::http::{header, Request, Version};

use crate::rpc::server::RPC_CONTENT_TYPE;

/// Which sub-server a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// Binary RPC (HTTP/2 + `application/grpc`).
    Rpc,
    /// Text HTTP handled by the gateway.
    Gateway,
}

impl Protocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Rpc => "rpc",
            Protocol::Gateway => "gateway",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify `request`. Never fails: anything that is not clearly RPC is
/// gateway traffic.
pub fn classify<B>(request: &Request<B>) -> Protocol {
    if request.version() != Version::HTTP_2 {
        return Protocol::Gateway;
    }

    let is_rpc_media = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains(RPC_CONTENT_TYPE))
        .unwrap_or(false);

    if is_rpc_media {
        Protocol::Rpc
    } else {
        Protocol::Gateway
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(version: Version, content_type: Option<&str>) -> Request<()> {
        let mut builder = Request::builder().version(version).uri("/greeter.Greeter/SayHello");
        if let Some(ct) = content_type {
            builder = builder.header(header::CONTENT_TYPE, ct);
        }
        builder.body(()).unwrap()
    }

    #[test]
    fn http2_grpc_is_rpc() {
        assert_eq!(classify(&request(Version::HTTP_2, Some("application/grpc"))), Protocol::Rpc);
        assert_eq!(
            classify(&request(Version::HTTP_2, Some("application/grpc+proto"))),
            Protocol::Rpc
        );
    }

    #[test]
    fn http11_is_always_gateway() {
        for ct in [Some("application/grpc"), Some("application/json"), None] {
            assert_eq!(classify(&request(Version::HTTP_11, ct)), Protocol::Gateway);
        }
    }

    #[test]
    fn http2_without_rpc_media_is_gateway() {
        assert_eq!(
            classify(&request(Version::HTTP_2, Some("application/json"))),
            Protocol::Gateway
        );
        assert_eq!(classify(&request(Version::HTTP_2, None)), Protocol::Gateway);
    }
}
