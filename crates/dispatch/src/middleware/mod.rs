//! Middleware composition.
//!
//! A [`Middleware`] wraps "the rest of the pipeline" into a new stage. A
//! [`MiddlewareChain`] keeps middleware in registration order and folds them
//! right-to-left over a terminal stage, so the first registered middleware
//! becomes the outermost stage: it runs first on the way in and last on the
//! way out.
//!
//! ```text
//! chain [log, recover, auth] over route:
//!     log( recover( auth( route ) ) )
//! ```
//!
//! Each stage decides per request whether to call `next` or to answer the
//! request itself. Stages must not rely on what other stages did, except for
//! ordering the assembler documents (the recovery stage only sees panics from
//! stages inside it).

mod auth;
mod form;
mod json;
mod logging;
mod recovery;
mod static_files;

pub use auth::{AuthMiddleware, Authenticator, DEFAULT_COOKIE_NAME, DEFAULT_LOGIN_PATH, HmacAuthenticator};
pub use form::FormMiddleware;
pub use json::JsonBodyMiddleware;
pub use logging::{AccessLog, AccessRecord, LoggingMiddleware, TracingAccessLog};
pub use recovery::RecoveryMiddleware;
pub use static_files::{FsResolver, StaticError, StaticFile, StaticFilesMiddleware, StaticResolver};

use crate::handler::BoxHandler;
use std::fmt;

pub trait Middleware: Send + Sync {
    /// Wraps `next` into the stage this middleware contributes.
    fn wrap(&self, next: BoxHandler) -> BoxHandler;
}

impl<M: Middleware + ?Sized> Middleware for Box<M> {
    fn wrap(&self, next: BoxHandler) -> BoxHandler {
        (**self).wrap(next)
    }
}

/// An ordered list of [`Middleware`], see the module docs.
#[derive(Default)]
pub struct MiddlewareChain {
    middlewares: Vec<Box<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `middleware`; it will run inside everything added before it.
    pub fn push<M: Middleware + 'static>(&mut self, middleware: M) -> &mut Self {
        self.middlewares.push(Box::new(middleware));
        self
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Builds the pipeline head by folding the chain over `terminal`.
    pub fn compose(&self, terminal: BoxHandler) -> BoxHandler {
        self.middlewares.iter().rev().fold(terminal, |next, middleware| middleware.wrap(next))
    }
}

/// A chain nests as a single middleware, keeping its inner order.
impl Middleware for MiddlewareChain {
    fn wrap(&self, next: BoxHandler) -> BoxHandler {
        self.compose(next)
    }
}

impl fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareChain").field("len", &self.middlewares.len()).finish()
    }
}

/// A middleware backed by a closure, see [`middleware_fn`].
#[derive(Copy, Clone)]
pub struct MiddlewareFn<F> {
    f: F,
}

/// Creates a middleware from a closure mapping the next stage to a new stage.
pub fn middleware_fn<F>(f: F) -> MiddlewareFn<F>
where
    F: Fn(BoxHandler) -> BoxHandler + Send + Sync,
{
    MiddlewareFn { f }
}

impl<F> Middleware for MiddlewareFn<F>
where
    F: Fn(BoxHandler) -> BoxHandler + Send + Sync,
{
    fn wrap(&self, next: BoxHandler) -> BoxHandler {
        (self.f)(next)
    }
}

impl<F> fmt::Debug for MiddlewareFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareFn").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::{Middleware, MiddlewareChain, middleware_fn};
    use crate::RequestContext;
    use crate::handler::{BoxHandler, RequestHandler, handler_sync};
    use async_trait::async_trait;
    use bytes::Bytes;
    use http::{Request, StatusCode};
    use std::sync::{Arc, Mutex};

    type Journal = Arc<Mutex<Vec<String>>>;

    struct Recording {
        name: &'static str,
        journal: Journal,
        short_circuit: bool,
    }

    struct RecordingStage {
        name: &'static str,
        journal: Journal,
        short_circuit: bool,
        next: BoxHandler,
    }

    impl Middleware for Recording {
        fn wrap(&self, next: BoxHandler) -> BoxHandler {
            Arc::new(RecordingStage {
                name: self.name,
                journal: Arc::clone(&self.journal),
                short_circuit: self.short_circuit,
                next,
            })
        }
    }

    #[async_trait]
    impl RequestHandler for RecordingStage {
        async fn invoke(&self, ctx: &mut RequestContext) {
            self.journal.lock().unwrap().push(format!("in:{}", self.name));
            if self.short_circuit {
                ctx.render_text(StatusCode::OK, self.name);
            } else {
                self.next.invoke(ctx).await;
            }
            self.journal.lock().unwrap().push(format!("out:{}", self.name));
        }
    }

    fn recording(name: &'static str, journal: &Journal) -> Recording {
        Recording { name, journal: Arc::clone(journal), short_circuit: false }
    }

    fn terminal(journal: &Journal) -> BoxHandler {
        let journal = Arc::clone(journal);
        Arc::new(handler_sync(move |ctx| {
            journal.lock().unwrap().push("handler".to_string());
            ctx.render_text(StatusCode::OK, "handler");
        }))
    }

    fn context() -> RequestContext {
        let (parts, ()) = Request::builder().uri("/").body(()).unwrap().into_parts();
        RequestContext::new(parts, Bytes::new())
    }

    #[tokio::test]
    async fn test_registration_order_in_and_reverse_out() {
        let journal = Journal::default();
        let mut chain = MiddlewareChain::new();
        chain.push(recording("a", &journal)).push(recording("b", &journal)).push(recording("c", &journal));

        let pipeline = chain.compose(terminal(&journal));
        let mut ctx = context();
        pipeline.invoke(&mut ctx).await;

        assert_eq!(
            *journal.lock().unwrap(),
            ["in:a", "in:b", "in:c", "handler", "out:c", "out:b", "out:a"]
        );
        assert_eq!(ctx.response().body(), b"handler");
    }

    #[tokio::test]
    async fn test_short_circuit_skips_inner_stages() {
        let journal = Journal::default();
        let mut chain = MiddlewareChain::new();
        chain
            .push(recording("a", &journal))
            .push(Recording { name: "b", journal: Arc::clone(&journal), short_circuit: true })
            .push(recording("c", &journal));

        let pipeline = chain.compose(terminal(&journal));
        let mut ctx = context();
        pipeline.invoke(&mut ctx).await;

        assert_eq!(*journal.lock().unwrap(), ["in:a", "in:b", "out:b", "out:a"]);
        assert_eq!(ctx.response().body(), b"b");
    }

    #[tokio::test]
    async fn test_empty_chain_is_terminal() {
        let journal = Journal::default();
        let chain = MiddlewareChain::new();
        assert!(chain.is_empty());

        let pipeline = chain.compose(terminal(&journal));
        pipeline.invoke(&mut context()).await;
        assert_eq!(*journal.lock().unwrap(), ["handler"]);
    }

    #[tokio::test]
    async fn test_middleware_fn() {
        let journal = Journal::default();
        let mut chain = MiddlewareChain::new();
        let outer_journal = Arc::clone(&journal);
        chain.push(middleware_fn(move |next: BoxHandler| {
            let journal = Arc::clone(&outer_journal);
            Arc::new(handler_fn_stage(journal, next)) as BoxHandler
        }));
        assert_eq!(chain.len(), 1);

        let pipeline = chain.compose(terminal(&journal));
        pipeline.invoke(&mut context()).await;
        assert_eq!(*journal.lock().unwrap(), ["in:fn", "handler"]);
    }

    fn handler_fn_stage(journal: Journal, next: BoxHandler) -> impl RequestHandler {
        crate::handler_fn(move |ctx| {
            let journal = Arc::clone(&journal);
            let next = Arc::clone(&next);
            Box::pin(async move {
                journal.lock().unwrap().push("in:fn".to_string());
                next.invoke(ctx).await;
            })
        })
    }
}
