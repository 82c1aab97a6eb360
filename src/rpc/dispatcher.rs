//! Method dispatch.
//!
//! One chain is composed per registered method when the dispatcher is built.
//! The dispatcher is immutable from then on and is shared by both
//! sub-servers, so RPC and gateway calls go through the same interceptors.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::rpc::chain;
use crate::rpc::context::CallContext;
use crate::rpc::handler::{CallResult, Handler};
use crate::rpc::interceptor::Interceptor;
use crate::rpc::registry::MethodRegistry;
use crate::rpc::status::Status;

/// Terminal handler raced against the call lifetime.
///
/// Sits innermost so a cancellation or deadline surfaces as a normal error
/// result that every interceptor still sees on the way out.
struct Bounded {
    inner: Arc<dyn Handler>,
}

#[async_trait]
impl Handler for Bounded {
    async fn call(&self, ctx: &mut CallContext, request: Bytes) -> CallResult {
        let lifetime = ctx.lifetime();
        lifetime.run(self.inner.call(ctx, request)).await
    }
}

/// Resolves method names to memoized chains and runs them.
pub struct Dispatcher {
    chains: HashMap<String, Arc<dyn Handler>>,
    interceptor_names: Vec<String>,
}

impl Dispatcher {
    /// Compose every registered handler with `interceptors`, in order.
    pub fn new(interceptors: &[Arc<dyn Interceptor>], registry: &MethodRegistry) -> Self {
        let chains = registry
            .iter()
            .map(|(method, handler)| {
                let bounded: Arc<dyn Handler> = Arc::new(Bounded {
                    inner: Arc::clone(handler),
                });
                (method.clone(), chain::build(interceptors, bounded))
            })
            .collect();

        let interceptor_names = interceptors.iter().map(|i| i.name().to_string()).collect();

        Self {
            chains,
            interceptor_names,
        }
    }

    /// Run `method`. Unknown methods fail with `NotFound` before any
    /// interceptor runs.
    pub async fn dispatch(
        &self,
        ctx: &mut CallContext,
        method: &str,
        request: Bytes,
    ) -> CallResult {
        let Some(chain) = self.chains.get(method) else {
            tracing::debug!(method = %method, "Unknown method");
            return Err(Status::not_found(format!("unknown method: {method}")));
        };
        chain.call(ctx, request).await
    }

    /// Run `method` on its own task, which owns `ctx`.
    ///
    /// Dropping the returned future (the client went away) cancels the call
    /// instead of tearing the chain down mid-flight: the task keeps running
    /// until the terminal handler gives up with `Canceled`, and that result
    /// travels back out through every interceptor.
    pub async fn dispatch_owned(
        self: &Arc<Self>,
        mut ctx: CallContext,
        method: String,
        request: Bytes,
    ) -> CallResult {
        if !self.has_method(&method) {
            return self.dispatch(&mut ctx, &method, request).await;
        }

        let _cancel_on_drop = ctx.cancellation_token().clone().drop_guard();
        let dispatcher = Arc::clone(self);
        let call =
            tokio::spawn(async move { dispatcher.dispatch(&mut ctx, &method, request).await });

        match call.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "Call task failed");
                Err(Status::internal("call task failed"))
            }
        }
    }

    /// Returns true if `method` is registered.
    pub fn has_method(&self, method: &str) -> bool {
        self.chains.contains_key(method)
    }

    /// Interceptor names in execution order.
    pub fn interceptor_names(&self) -> &[String] {
        &self.interceptor_names
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut methods: Vec<&String> = self.chains.keys().collect();
        methods.sort_unstable();
        f.debug_struct("Dispatcher")
            .field("methods", &methods)
            .field("interceptors", &self.interceptor_names)
            .finish()
    }
}
