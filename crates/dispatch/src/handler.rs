//! Request handlers and pipeline stages.
//!
//! A route handler and a middleware stage have the same shape: both receive
//! the [`RequestContext`] and communicate only through its side effects. The
//! pipeline is therefore a chain of [`RequestHandler`]s, the innermost being
//! the route stage.

use crate::RequestContext;
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed future borrowing the request context for `'a`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A shared, type-erased handler. This is what middleware wraps.
pub type BoxHandler = Arc<dyn RequestHandler>;

#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn invoke(&self, ctx: &mut RequestContext);
}

#[async_trait]
impl<H: RequestHandler + ?Sized> RequestHandler for Arc<H> {
    async fn invoke(&self, ctx: &mut RequestContext) {
        (**self).invoke(ctx).await;
    }
}

#[async_trait]
impl<H: RequestHandler + ?Sized> RequestHandler for Box<H> {
    async fn invoke(&self, ctx: &mut RequestContext) {
        (**self).invoke(ctx).await;
    }
}

/// an async closure holder, see [`handler_fn`]
pub struct FnHandler<F> {
    f: F,
}

/// Creates a handler from a closure returning a boxed future.
///
/// ```
/// use micro_dispatch::handler_fn;
///
/// let handler = handler_fn(|ctx| {
///     Box::pin(async move {
///         ctx.render_text(http::StatusCode::OK, "about");
///     })
/// });
/// # let _ = handler;
/// ```
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, ()> + Send + Sync,
{
    FnHandler { f }
}

#[async_trait]
impl<F> RequestHandler for FnHandler<F>
where
    F: for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, ()> + Send + Sync,
{
    async fn invoke(&self, ctx: &mut RequestContext) {
        (self.f)(ctx).await;
    }
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

/// a plain closure holder, see [`handler_sync`]
pub struct SyncFnHandler<F> {
    f: F,
}

/// Creates a handler from a closure that never awaits.
pub fn handler_sync<F>(f: F) -> SyncFnHandler<F>
where
    F: Fn(&mut RequestContext) + Send + Sync,
{
    SyncFnHandler { f }
}

#[async_trait]
impl<F> RequestHandler for SyncFnHandler<F>
where
    F: Fn(&mut RequestContext) + Send + Sync,
{
    async fn invoke(&self, ctx: &mut RequestContext) {
        (self.f)(ctx);
    }
}

impl<F> fmt::Debug for SyncFnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncFnHandler").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use crate::handler::{BoxHandler, RequestHandler, handler_fn, handler_sync};
    use crate::RequestContext;
    use bytes::Bytes;
    use http::{Request, StatusCode};
    use std::sync::Arc;

    fn assert_is_handler<T: RequestHandler>(_handler: &T) {
        // no op
    }

    fn context() -> RequestContext {
        let (parts, ()) = Request::builder().uri("/").body(()).unwrap().into_parts();
        RequestContext::new(parts, Bytes::new())
    }

    #[test]
    fn assert_closures_are_handlers() {
        let async_handler = handler_fn(|ctx| Box::pin(async move { ctx.set_param("k", "v") }));
        assert_is_handler(&async_handler);

        let sync_handler = handler_sync(|ctx| ctx.set_param("k", "v"));
        assert_is_handler(&sync_handler);

        let boxed: BoxHandler = Arc::new(sync_handler);
        assert_is_handler(&boxed);
    }

    #[tokio::test]
    async fn test_fn_handler_mutates_context() {
        let handler = handler_fn(|ctx| {
            Box::pin(async move {
                tokio::task::yield_now().await;
                ctx.render_text(StatusCode::CREATED, "done");
            })
        });

        let mut ctx = context();
        handler.invoke(&mut ctx).await;
        assert_eq!(ctx.response().status(), StatusCode::CREATED);
        assert_eq!(ctx.response().body(), b"done");
    }
}
