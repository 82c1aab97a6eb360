//! Request id propagation.

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use crate::rpc::{CallContext, CallResult, Handler, Interceptor};

/// Metadata key (and HTTP header) carrying the request id.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Tags calls that arrive without an `x-request-id` with a fresh UUID v4.
/// An id sent by the caller is kept as is.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestIdInterceptor;

#[async_trait]
impl Interceptor for RequestIdInterceptor {
    fn name(&self) -> &str {
        "request-id"
    }

    async fn intercept(
        &self,
        ctx: &mut CallContext,
        request: Bytes,
        next: &dyn Handler,
    ) -> CallResult {
        if ctx.request_id().is_none() {
            ctx.metadata_mut().append(X_REQUEST_ID, Uuid::new_v4().to_string());
        }
        next.call(ctx, request).await
    }
}
