//! Access logging.
//!
//! The logging stage takes a timestamp right before calling the next stage
//! and measures right after it returns, so the recorded duration covers every
//! stage inside it, short-circuits and recovered panics included.

use crate::RequestContext;
use crate::handler::{BoxHandler, RequestHandler};
use crate::middleware::Middleware;
use async_trait::async_trait;
use http::{Method, StatusCode};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// One completed request, as seen by the logging stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRecord {
    pub method: Method,
    pub uri: String,
    pub status: StatusCode,
    pub elapsed: Duration,
}

/// Where access records go.
#[cfg_attr(test, mockall::automock)]
pub trait AccessLog: Send + Sync {
    fn record(&self, record: AccessRecord);
}

/// Emits each access record as a `tracing` event at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAccessLog;

impl AccessLog for TracingAccessLog {
    fn record(&self, record: AccessRecord) {
        info!(
            method = %record.method,
            uri = %record.uri,
            status = record.status.as_u16(),
            elapsed = ?record.elapsed,
            "request completed"
        );
    }
}

#[derive(Clone)]
pub struct LoggingMiddleware {
    log: Arc<dyn AccessLog>,
}

impl LoggingMiddleware {
    pub fn new() -> Self {
        Self::with_log(TracingAccessLog)
    }

    pub fn with_log<L: AccessLog + 'static>(log: L) -> Self {
        Self { log: Arc::new(log) }
    }
}

impl Default for LoggingMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LoggingMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggingMiddleware").finish_non_exhaustive()
    }
}

impl Middleware for LoggingMiddleware {
    fn wrap(&self, next: BoxHandler) -> BoxHandler {
        Arc::new(LoggingStage { log: Arc::clone(&self.log), next })
    }
}

struct LoggingStage {
    log: Arc<dyn AccessLog>,
    next: BoxHandler,
}

#[async_trait]
impl RequestHandler for LoggingStage {
    async fn invoke(&self, ctx: &mut RequestContext) {
        let start = Instant::now();
        self.next.invoke(ctx).await;
        let elapsed = start.elapsed();

        self.log.record(AccessRecord {
            method: ctx.method().clone(),
            uri: ctx.uri().to_string(),
            status: ctx.response().status(),
            elapsed,
        });
    }
}
