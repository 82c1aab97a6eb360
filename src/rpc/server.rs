//! RPC sub-server.
//!
//! # Responsibilities
//! - Turn an HTTP/2 `application/grpc` request into a call context
//! - Unframe the request message and dispatch it
//! - Frame the reply and report the outcome in `grpc-status` / `grpc-message`
//!
//! Successful calls answer with one data frame followed by trailers. Failed
//! calls use a trailers-only response: status fields in the headers and an
//! empty body.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use bytes::Bytes;
use hyper::body::Frame;

use crate::mux::Protocol;
use crate::rpc::codec::{self, FrameError};
use crate::rpc::context::CallContext;
use crate::rpc::dispatcher::Dispatcher;
use crate::rpc::metadata::Metadata;
use crate::rpc::status::{Code, Status};

/// Media type of RPC requests and responses.
pub const RPC_CONTENT_TYPE: &str = "application/grpc";
pub const GRPC_STATUS: &str = "grpc-status";
pub const GRPC_MESSAGE: &str = "grpc-message";
pub const GRPC_TIMEOUT: &str = "grpc-timeout";

/// The RPC engine. Cheap to clone; all clones share one dispatcher.
#[derive(Clone)]
pub struct RpcServer {
    dispatcher: Arc<Dispatcher>,
    default_timeout: Duration,
    max_message_bytes: usize,
}

impl RpcServer {
    /// Create an engine over `dispatcher`.
    ///
    /// `default_timeout` applies to calls without a `grpc-timeout` header.
    /// Bodies above `max_message_bytes` plus the frame header are refused.
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        default_timeout: Duration,
        max_message_bytes: usize,
    ) -> Self {
        Self {
            dispatcher,
            default_timeout,
            max_message_bytes,
        }
    }

    /// Serve one RPC request.
    pub async fn handle(&self, request: Request<Body>) -> Response<Body> {
        let method = request.uri().path().to_string();
        match self.call(request, &method).await {
            Ok(reply) => {
                tracing::debug!(method = %method, "RPC call succeeded");
                reply_response(reply)
            }
            Err(status) => {
                tracing::debug!(
                    method = %method,
                    code = %status.code(),
                    message = %status.message(),
                    "RPC call failed"
                );
                status_response(&status)
            }
        }
    }

    async fn call(&self, request: Request<Body>, method: &str) -> Result<Bytes, Status> {
        if request.method() != Method::POST {
            return Err(Status::unimplemented(format!(
                "RPC calls must use POST, got {}",
                request.method()
            )));
        }

        let (parts, body) = request.into_parts();

        let limit = self.max_message_bytes + codec::HEADER_LEN;
        let declared_len = parts
            .headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if declared_len.is_some_and(|len| len > limit) {
            return Err(Status::resource_exhausted(format!(
                "message larger than {} bytes",
                self.max_message_bytes
            )));
        }

        let timeout = parts
            .headers
            .get(GRPC_TIMEOUT)
            .and_then(|v| v.to_str().ok())
            .and_then(codec::parse_timeout)
            .unwrap_or(self.default_timeout);

        let mut ctx = CallContext::new(method, Protocol::Rpc)
            .with_metadata(Metadata::from_headers(&parts.headers))
            .with_timeout(timeout);
        if let Some(ConnectInfo(addr)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
            ctx = ctx.with_peer_addr(*addr);
        }

        let body = axum::body::to_bytes(body, limit)
            .await
            .map_err(|e| Status::resource_exhausted(format!("failed to read request body: {e}")))?;
        let payload = codec::decode(&body).map_err(|e| match e {
            FrameError::Compressed => Status::unimplemented(e.to_string()),
            other => Status::internal(other.to_string()),
        })?;

        // Drop-cancels: a reset stream ends the call with `Canceled`.
        self.dispatcher.dispatch_owned(ctx, method.to_string(), payload).await
    }
}

/// Body of a successful reply: one message, then trailers.
struct ReplyBody {
    message: Option<Bytes>,
    trailers: Option<HeaderMap>,
}

impl hyper::body::Body for ReplyBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        if let Some(message) = this.message.take() {
            return Poll::Ready(Some(Ok(Frame::data(message))));
        }
        if let Some(trailers) = this.trailers.take() {
            return Poll::Ready(Some(Ok(Frame::trailers(trailers))));
        }
        Poll::Ready(None)
    }

    fn is_end_stream(&self) -> bool {
        self.message.is_none() && self.trailers.is_none()
    }
}

fn reply_response(payload: Bytes) -> Response<Body> {
    let mut trailers = HeaderMap::new();
    trailers.insert(GRPC_STATUS, HeaderValue::from(Code::Ok.as_i32()));

    let body = ReplyBody {
        message: Some(codec::encode(&payload)),
        trailers: Some(trailers),
    };

    let mut response = Response::new(Body::new(body));
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(RPC_CONTENT_TYPE));
    response
}

/// Trailers-only response carrying `status`.
pub fn status_response(status: &Status) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(RPC_CONTENT_TYPE));
    headers.insert(GRPC_STATUS, HeaderValue::from(status.code().as_i32()));
    if let Ok(message) = HeaderValue::from_str(&codec::encode_message(status.message())) {
        headers.insert(GRPC_MESSAGE, message);
    }
    response
}
