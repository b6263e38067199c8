use crate::RequestContext;
use crate::handler::{BoxHandler, RequestHandler};
use crate::middleware::Middleware;
use async_trait::async_trait;
use futures::FutureExt;
use http::StatusCode;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::error;

/// Turns a panic in any inner stage into a `500 Internal Server Error`.
///
/// Panics raised outside this stage (in stages registered before it) are not
/// caught. If the panicking stage had already committed the response, the
/// partial output is kept and only the log line is emitted.
#[derive(Debug, Default, Clone, Copy)]
pub struct RecoveryMiddleware;

impl RecoveryMiddleware {
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for RecoveryMiddleware {
    fn wrap(&self, next: BoxHandler) -> BoxHandler {
        Arc::new(RecoveryStage { next })
    }
}

struct RecoveryStage {
    next: BoxHandler,
}

#[async_trait]
impl RequestHandler for RecoveryStage {
    async fn invoke(&self, ctx: &mut RequestContext) {
        let outcome = AssertUnwindSafe(self.next.invoke(ctx)).catch_unwind().await;

        if let Err(payload) = outcome {
            error!(
                method = %ctx.method(),
                path = ctx.path(),
                cause = panic_message(payload.as_ref()),
                "recovered from panic"
            );
            ctx.render_error(StatusCode::INTERNAL_SERVER_ERROR);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
