//! Chain composition.
//!
//! `build(&[I1, I2, .., In], H)` folds the list from last to first:
//! `next = H`, then `next = bind(In, next)`, .., `next = bind(I1, next)`.
//! `I1` is the outermost wrapper: it runs first on the way in and last on the
//! way out. An empty list returns `H` itself.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::rpc::context::CallContext;
use crate::rpc::handler::{CallResult, Handler};
use crate::rpc::interceptor::Interceptor;

/// One interceptor bound to the rest of the chain.
struct Bound {
    interceptor: Arc<dyn Interceptor>,
    next: Arc<dyn Handler>,
}

#[async_trait]
impl Handler for Bound {
    async fn call(&self, ctx: &mut CallContext, request: Bytes) -> CallResult {
        self.interceptor
            .intercept(ctx, request, self.next.as_ref())
            .await
    }
}

/// Compose `interceptors` around `handler` into a single handler.
pub fn build(interceptors: &[Arc<dyn Interceptor>], handler: Arc<dyn Handler>) -> Arc<dyn Handler> {
    interceptors
        .iter()
        .rev()
        .fold(handler, |next, interceptor| {
            Arc::new(Bound {
                interceptor: Arc::clone(interceptor),
                next,
            }) as Arc<dyn Handler>
        })
}
