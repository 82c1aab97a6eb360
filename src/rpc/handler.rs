//! Terminal business-logic units.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::rpc::context::CallContext;
use crate::rpc::metadata::Metadata;
use crate::rpc::status::Status;

/// Result of running a call.
pub type CallResult = Result<Bytes, Status>;

/// A unit of work: takes a call context and a payload, returns a payload or
/// a status.
///
/// Composed chains are handlers too, so an interceptor's `next` is just
/// another `Handler`.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, ctx: &mut CallContext, request: Bytes) -> CallResult;
}

#[async_trait]
impl<H: Handler + ?Sized> Handler for Arc<H> {
    async fn call(&self, ctx: &mut CallContext, request: Bytes) -> CallResult {
        (**self).call(ctx, request).await
    }
}

/// Handler backed by an async closure.
///
/// The closure receives a snapshot of the call metadata and the payload, so
/// its future does not borrow the context.
pub struct FnHandler<F> {
    f: F,
}

/// Build a handler from `Fn(Metadata, Bytes) -> impl Future<Output = CallResult>`.
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn Handler>
where
    F: Fn(Metadata, Bytes) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CallResult> + Send + 'static,
{
    Arc::new(FnHandler { f })
}

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Metadata, Bytes) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CallResult> + Send + 'static,
{
    async fn call(&self, ctx: &mut CallContext, request: Bytes) -> CallResult {
        (self.f)(ctx.metadata().clone(), request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mux::Protocol;

    #[tokio::test]
    async fn closure_handler_sees_metadata() {
        let handler = handler_fn(|md: Metadata, req: Bytes| async move {
            let who = md.get("x-user").unwrap_or("nobody").to_string();
            let mut out = who.into_bytes();
            out.extend_from_slice(&req);
            Ok::<_, Status>(Bytes::from(out))
        });

        let mut md = Metadata::new();
        md.append("x-user", "ana");
        let mut ctx = CallContext::new("/svc/Echo", Protocol::Rpc).with_metadata(md);

        let out = handler.call(&mut ctx, Bytes::from_static(b":hi")).await.unwrap();
        assert_eq!(&out[..], b"ana:hi");
    }
}
