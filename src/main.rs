//! `dualport` demo server.
//!
//! Serves the Greeter service on one port, as an RPC method
//! (`/greeter.Greeter/SayHello`) and as a gateway route
//! (`POST /v1/greeter/hello`), behind request-id, logging and optional
//! shared-secret authentication.

use std::path::PathBuf;

use clap::Parser;

use dualport::config::{InterceptorKind, LogLevel, ServerBuilder};
use dualport::demo;
use dualport::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "dualport")]
#[command(about = "Serve RPC and HTTP gateway traffic on one port", long_about = None)]
struct Args {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, e.g. 127.0.0.1:8080.
    #[arg(short, long)]
    bind: Option<String>,

    /// Require this credential in the `authorization` metadata.
    #[arg(short, long)]
    token: Option<String>,

    /// Call log verbosity (trace, debug, info, warn, error).
    #[arg(short, long)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut builder = ServerBuilder::new();
    if let Some(path) = &args.config {
        builder = builder.from_file(path)?;
    }

    let level = args
        .log_level
        .map(|level| level.to_string())
        .unwrap_or_else(|| builder.config().observability.log_level.clone());
    logging::init(&level);

    tracing::info!("dualport v{} starting", env!("CARGO_PKG_VERSION"));

    let call_level = args.log_level.unwrap_or(builder.config().logging.level);
    builder = builder
        .with_interceptors([InterceptorKind::RequestId])
        .with_logging(call_level);
    if let Some(bind) = args.bind {
        builder = builder.with_address(bind);
    }
    if let Some(token) = args.token {
        builder = builder.with_auth(token);
    }

    let server = builder
        .with_rpc_handler(demo::SAY_HELLO, demo::say_hello())
        .with_gateway_routes(demo::routes())
        .build()?;

    tracing::info!(
        bind_address = %server.config().listener.bind_address,
        max_connections = server.config().listener.max_connections,
        request_timeout_ms = server.config().timeouts.request_ms,
        auth = ?server.config().auth,
        store = ?server.store(),
        "Configuration loaded"
    );

    let observability = &server.config().observability;
    if observability.metrics_enabled {
        match observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    server.serve().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
