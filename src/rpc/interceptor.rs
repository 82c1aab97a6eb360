//! Cross-cutting policies that wrap a handler.

use async_trait::async_trait;
use bytes::Bytes;

use crate::rpc::context::CallContext;
use crate::rpc::handler::{CallResult, Handler};

/// A policy wrapped around the rest of the chain.
///
/// Implementations continue the pipeline with `next.call(ctx, request)` and
/// may inspect or transform what it returns. Returning without calling
/// `next` short-circuits the call: no later interceptor and no handler runs.
///
/// Interceptors are shared by every concurrent call and must not keep
/// per-call state in `self` outside of synchronised structures.
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    async fn intercept(
        &self,
        ctx: &mut CallContext,
        request: Bytes,
        next: &dyn Handler,
    ) -> CallResult;
}
