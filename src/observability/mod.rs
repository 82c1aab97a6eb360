//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! accept loop, multiplexer, interceptors produce:
//!     → logging.rs (tracing subscriber, structured events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (fmt layer, filtered by RUST_LOG or the configured level)
//!     → Prometheus scrape endpoint (when enabled)
//! ```
//!
//! Recording a metric without an installed exporter is a no-op, so library
//! code records unconditionally.

pub mod logging;
pub mod metrics;
