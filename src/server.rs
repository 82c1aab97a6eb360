//! Dual-protocol server.
//!
//! # Responsibilities
//! - Accept connections on one bounded listener
//! - Serve HTTP/1.1 and clear-text HTTP/2 on each connection (hyper-util auto)
//! - Hand every request to the multiplexer
//! - Stop accepting on shutdown, then drain open connections

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::Request;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use thiserror::Error;

use crate::config::{ServerConfig, StoreConfig};
use crate::lifecycle::{shutdown_signal, Shutdown};
use crate::mux::Multiplexer;
use crate::net::{ConnectionTracker, Listener, ListenerError};
use crate::rpc::Dispatcher;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A fully assembled server. Built by
/// [`ServerBuilder`](crate::config::ServerBuilder); immutable afterwards.
pub struct Server {
    config: Arc<ServerConfig>,
    dispatcher: Arc<Dispatcher>,
    multiplexer: Multiplexer,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

impl Server {
    pub(crate) fn new(
        config: ServerConfig,
        dispatcher: Arc<Dispatcher>,
        multiplexer: Multiplexer,
    ) -> Self {
        Self {
            config: Arc::new(config),
            dispatcher,
            multiplexer,
        }
    }

    /// Get the frozen configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the dispatcher shared by both sub-servers.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn multiplexer(&self) -> &Multiplexer {
        &self.multiplexer
    }

    /// Interceptor names in execution order.
    pub fn interceptor_names(&self) -> &[String] {
        self.dispatcher.interceptor_names()
    }

    /// Backing store settings, if configured.
    pub fn store(&self) -> Option<&StoreConfig> {
        self.config.store.as_ref()
    }

    /// Bind the configured address and serve until Ctrl-C or SIGTERM.
    pub async fn serve(self) -> Result<(), ServerError> {
        let listener = Listener::bind(&self.config.listener).await?;

        let shutdown = Shutdown::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            trigger.trigger();
        });

        self.run(listener, shutdown).await
    }

    /// Serve `listener` until `shutdown` fires.
    pub async fn run(self, listener: Listener, shutdown: Shutdown) -> Result<(), ServerError> {
        let local_addr = listener.local_addr()?;
        tracing::info!(
            address = %local_addr,
            interceptors = ?self.interceptor_names(),
            "Serving RPC and gateway traffic"
        );

        let tracker = ConnectionTracker::new();
        let builder = auto::Builder::new(TokioExecutor::new());
        let mut stop = shutdown.subscribe();

        loop {
            let (stream, peer, permit) = tokio::select! {
                _ = stop.recv() => break,
                accepted = listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(ListenerError::Accept(e)) => {
                        tracing::warn!(error = %e, "Accept failed");
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                },
            };

            let guard = tracker.track();
            let multiplexer = self.multiplexer.clone();
            let builder = builder.clone();
            let mut conn_stop = shutdown.subscribe();

            tokio::spawn(async move {
                let _permit = permit;
                tracing::trace!(
                    connection_id = %guard.id(),
                    peer_addr = %peer,
                    "Connection opened"
                );

                let service = service_fn(move |mut request: Request<Incoming>| {
                    let multiplexer = multiplexer.clone();
                    request.extensions_mut().insert(ConnectInfo(peer));
                    async move {
                        Ok::<_, Infallible>(multiplexer.route(request.map(Body::new)).await)
                    }
                });

                let conn = builder.serve_connection(TokioIo::new(stream), service);
                tokio::pin!(conn);

                let result = tokio::select! {
                    result = conn.as_mut() => result,
                    _ = conn_stop.recv() => {
                        conn.as_mut().graceful_shutdown();
                        conn.await
                    }
                };
                if let Err(e) = result {
                    tracing::debug!(
                        connection_id = %guard.id(),
                        error = %e,
                        "Connection ended with error"
                    );
                }
                drop(guard);
            });
        }

        drop(listener);
        let drain_timeout = self.config.shutdown.drain_timeout();
        tracing::info!(
            active_connections = tracker.active_count(),
            drain_timeout_ms = self.config.shutdown.drain_timeout_ms,
            "Shutdown started, draining connections"
        );
        if tracker.drain(drain_timeout).await {
            tracing::info!("All connections drained");
        } else {
            tracing::warn!(
                active_connections = tracker.active_count(),
                "Drain timeout elapsed with connections still open"
            );
        }
        Ok(())
    }
}
