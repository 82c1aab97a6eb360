//! Call logging.
//!
//! Times every call and hands a [`CallRecord`] to a [`CallObserver`] once the
//! rest of the chain returns, on success and on failure alike. The result is
//! forwarded untouched.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::time::Instant;

use crate::config::LogLevel;
use crate::mux::Protocol;
use crate::observability::metrics;
use crate::rpc::{CallContext, CallResult, Handler, Interceptor, Status};

/// Completed call, as seen by the logging interceptor.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    pub method: String,
    pub protocol: Protocol,
    pub request_id: Option<String>,
    pub duration: Duration,
    pub error: Option<Status>,
}

/// Sink for call records.
pub trait CallObserver: Send + Sync {
    fn observe(&self, record: &CallRecord);
}

/// Default observer: a `tracing` event at the configured level plus call
/// metrics.
#[derive(Debug, Clone, Copy)]
pub struct TracingObserver {
    level: LogLevel,
}

impl TracingObserver {
    /// Create an observer that logs at `level`.
    pub fn new(level: LogLevel) -> Self {
        Self { level }
    }
}

macro_rules! emit_call {
    ($macro:ident, $record:expr, $outcome:expr) => {
        tracing::$macro!(
            method = %$record.method,
            protocol = %$record.protocol,
            request_id = $record.request_id.as_deref().unwrap_or("-"),
            duration_ms = $record.duration.as_secs_f64() * 1000.0,
            outcome = %$outcome,
            "Call completed"
        )
    };
}

impl CallObserver for TracingObserver {
    fn observe(&self, record: &CallRecord) {
        let outcome = match &record.error {
            Some(status) => status.to_string(),
            None => "ok".to_string(),
        };
        match self.level {
            LogLevel::Trace => emit_call!(trace, record, outcome),
            LogLevel::Debug => emit_call!(debug, record, outcome),
            LogLevel::Info => emit_call!(info, record, outcome),
            LogLevel::Warn => emit_call!(warn, record, outcome),
            LogLevel::Error => emit_call!(error, record, outcome),
        }
        metrics::record_call(record);
    }
}

pub struct LoggingInterceptor {
    observer: Arc<dyn CallObserver>,
}

impl LoggingInterceptor {
    /// Create an interceptor reporting to `observer`.
    pub fn new(observer: Arc<dyn CallObserver>) -> Self {
        Self { observer }
    }

    /// Log through `tracing` at `level`.
    pub fn with_level(level: LogLevel) -> Self {
        Self::new(Arc::new(TracingObserver::new(level)))
    }
}

#[async_trait]
impl Interceptor for LoggingInterceptor {
    fn name(&self) -> &str {
        "logging"
    }

    async fn intercept(
        &self,
        ctx: &mut CallContext,
        request: Bytes,
        next: &dyn Handler,
    ) -> CallResult {
        let start = Instant::now();
        let result = next.call(ctx, request).await;

        let record = CallRecord {
            method: ctx.method().to_string(),
            protocol: ctx.protocol(),
            request_id: ctx.request_id().map(str::to_string),
            duration: start.elapsed(),
            error: result.as_ref().err().cloned(),
        };
        self.observer.observe(&record);

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::{chain, handler_fn, Code, Metadata};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        records: Mutex<Vec<CallRecord>>,
    }

    impl CallObserver for Recorder {
        fn observe(&self, record: &CallRecord) {
            self.records.lock().unwrap().push(record.clone());
        }
    }

    #[tokio::test]
    async fn records_success_and_failure_once_each() {
        let recorder = Arc::new(Recorder::default());
        let logging: Arc<dyn Interceptor> = Arc::new(LoggingInterceptor::new(recorder.clone()));

        let ok = chain::build(
            &[logging.clone()],
            handler_fn(|_, req: Bytes| async move { Ok::<_, Status>(req) }),
        );
        let failing = chain::build(
            &[logging],
            handler_fn(|_, _| async { Err::<Bytes, _>(Status::internal("db down")) }),
        );

        let mut md = Metadata::new();
        md.append("x-request-id", "req-1");
        let mut ctx = CallContext::new("/svc/Ok", Protocol::Rpc).with_metadata(md);
        let out = ok.call(&mut ctx, Bytes::from_static(b"a")).await.unwrap();
        assert_eq!(&out[..], b"a");
        assert_eq!(recorder.records.lock().unwrap().len(), 1);

        let mut ctx = CallContext::new("/svc/Fail", Protocol::Gateway);
        let err = failing.call(&mut ctx, Bytes::new()).await.unwrap_err();
        assert_eq!(err.code(), Code::Internal);

        let records = recorder.records.lock().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].method, "/svc/Ok");
        assert_eq!(records[0].request_id.as_deref(), Some("req-1"));
        assert_eq!(records[0].error, None);
        assert_eq!(records[1].method, "/svc/Fail");
        assert_eq!(records[1].protocol, Protocol::Gateway);
        assert_eq!(records[1].error, Some(Status::internal("db down")));
    }

    #[tokio::test]
    async fn tracing_observer_accepts_every_level() {
        let record = CallRecord {
            method: "/svc/M".to_string(),
            protocol: Protocol::Rpc,
            request_id: None,
            duration: Duration::from_millis(3),
            error: Some(Status::not_found("nope")),
        };
        let levels = [
            LogLevel::Trace,
            LogLevel::Debug,
            LogLevel::Info,
            LogLevel::Warn,
            LogLevel::Error,
        ];
        for level in levels {
            TracingObserver::new(level).observe(&record);
        }
    }
}
