//! Shared-secret authentication.
//!
//! Reads one metadata key and compares its first value with the configured
//! credential. Anything else (missing key, no values, wrong value) stops the
//! call with `Unauthenticated` before the rest of the chain runs.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::config::AuthConfig;
use crate::rpc::{CallContext, CallResult, Handler, Interceptor, Status};

/// Default metadata key carrying the credential.
pub const AUTHORIZATION: &str = "authorization";

pub struct AuthInterceptor {
    enabled: bool,
    metadata_key: String,
    credential: String,
}

impl AuthInterceptor {
    /// Create an enabled interceptor expecting `credential` under
    /// `authorization`.
    pub fn new(credential: impl Into<String>) -> Self {
        Self {
            enabled: true,
            metadata_key: AUTHORIZATION.to_string(),
            credential: credential.into(),
        }
    }

    /// Read the credential from `key` instead of `authorization`.
    pub fn with_metadata_key(mut self, key: impl Into<String>) -> Self {
        self.metadata_key = key.into().to_ascii_lowercase();
        self
    }

    /// Pass-through instance.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            metadata_key: AUTHORIZATION.to_string(),
            credential: String::new(),
        }
    }

    /// Build from the `[auth]` section. A disabled section yields a
    /// pass-through.
    pub fn from_config(config: &AuthConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }
        Self::new(config.secret.clone()).with_metadata_key(config.metadata_key.clone())
    }

    /// Returns true if calls are checked.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn verify(&self, ctx: &CallContext) -> Result<(), Status> {
        let values = ctx
            .metadata()
            .get_all(&self.metadata_key)
            .ok_or_else(|| {
                Status::unauthenticated(format!("missing `{}` metadata", self.metadata_key))
            })?;

        let Some(presented) = values.first() else {
            return Err(Status::unauthenticated(format!(
                "`{}` metadata has no value",
                self.metadata_key
            )));
        };

        if *presented != self.credential {
            return Err(Status::unauthenticated("invalid credential"));
        }
        Ok(())
    }
}

/// Authentication interceptor built from configuration.
pub fn auth_interceptor(config: &AuthConfig) -> Arc<dyn Interceptor> {
    Arc::new(AuthInterceptor::from_config(config))
}

#[async_trait]
impl Interceptor for AuthInterceptor {
    fn name(&self) -> &str {
        "auth"
    }

    async fn intercept(
        &self,
        ctx: &mut CallContext,
        request: Bytes,
        next: &dyn Handler,
    ) -> CallResult {
        if !self.enabled {
            return next.call(ctx, request).await;
        }

        if let Err(status) = self.verify(ctx) {
            tracing::warn!(
                method = %ctx.method(),
                request_id = ctx.request_id().unwrap_or("-"),
                reason = %status.message(),
                "Authentication failed"
            );
            return Err(status);
        }

        tracing::trace!(method = %ctx.method(), "Authentication passed");
        next.call(ctx, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mux::Protocol;
    use crate::rpc::{chain, handler_fn, Code, Metadata};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn pipeline(auth: AuthInterceptor, hits: Arc<AtomicUsize>) -> Arc<dyn Handler> {
        let handler = handler_fn(move |_, _| {
            let hits = hits.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Status>(Bytes::from_static(b"hello"))
            }
        });
        chain::build(&[Arc::new(auth) as Arc<dyn Interceptor>], handler)
    }

    fn ctx_with(key: &str, values: &[&str]) -> CallContext {
        let mut md = Metadata::new();
        md.extend(key, values.iter().copied());
        CallContext::new("/greeter.Greeter/SayHello", Protocol::Rpc).with_metadata(md)
    }

    #[tokio::test]
    async fn valid_credential_reaches_handler() {
        let hits = Arc::new(AtomicUsize::new(0));
        let chain = pipeline(AuthInterceptor::new("valid-token-123"), hits.clone());

        let mut ctx = ctx_with("authorization", &["valid-token-123"]);
        let out = chain.call(&mut ctx, Bytes::new()).await.unwrap();
        assert_eq!(&out[..], b"hello");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn wrong_missing_or_empty_credential_is_rejected() {
        let hits = Arc::new(AtomicUsize::new(0));
        let chain = pipeline(AuthInterceptor::new("valid-token-123"), hits.clone());

        for mut ctx in [
            ctx_with("authorization", &["wrong"]),
            ctx_with("authorization", &[]),
            ctx_with("x-other", &["valid-token-123"]),
            ctx_with("authorization", &["Bearer valid-token-123"]),
        ] {
            let err = chain.call(&mut ctx, Bytes::new()).await.unwrap_err();
            assert_eq!(err.code(), Code::Unauthenticated);
        }
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn custom_metadata_key() {
        let hits = Arc::new(AtomicUsize::new(0));
        let auth = AuthInterceptor::new("my-secret-token-12345").with_metadata_key("Token");
        let chain = pipeline(auth, hits.clone());

        let mut ctx = ctx_with("token", &["my-secret-token-12345"]);
        assert!(chain.call(&mut ctx, Bytes::new()).await.is_ok());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disabled_is_pass_through() {
        let hits = Arc::new(AtomicUsize::new(0));
        let chain = pipeline(AuthInterceptor::disabled(), hits.clone());

        let mut ctx = CallContext::new("/greeter.Greeter/SayHello", Protocol::Rpc);
        assert!(chain.call(&mut ctx, Bytes::new()).await.is_ok());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
