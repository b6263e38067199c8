//! Route registration and lookup.
//!
//! Routes are kept per method in registration order. Lookup walks that list
//! and returns the first pattern that matches, so overlapping patterns are
//! resolved by the order they were registered in, never by specificity:
//!
//! ```
//! use micro_dispatch::router::{Router, get};
//! use micro_dispatch::handler_sync;
//! use http::{Method, StatusCode};
//!
//! let mut router = Router::new();
//! router.route("/users/:id", get(handler_sync(|ctx| ctx.render_text(StatusCode::OK, "param")))).unwrap();
//! router.route("/users/me", get(handler_sync(|ctx| ctx.render_text(StatusCode::OK, "literal")))).unwrap();
//!
//! let matched = router.lookup(&Method::GET, "/users/me").unwrap();
//! assert_eq!(matched.pattern().as_str(), "/users/:id");
//! assert_eq!(matched.bindings().get("id"), Some("me"));
//! ```

mod path;

pub use path::{Bindings, PathPattern, Segment, match_path};

use crate::RequestContext;
use crate::error::RegisterError;
use crate::handler::{BoxHandler, RequestHandler};
use crate::params::ParamSource;
use async_trait::async_trait;
use http::{Method, StatusCode};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A registered pattern and its handler.
pub struct Route {
    pattern: PathPattern,
    handler: BoxHandler,
}

impl Route {
    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn handler(&self) -> &BoxHandler {
        &self.handler
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route").field("pattern", &self.pattern.as_str()).finish_non_exhaustive()
    }
}

/// A successful lookup: the route that matched and what it bound.
pub struct RouteMatch<'router> {
    route: &'router Route,
    bindings: Bindings,
}

impl<'router> RouteMatch<'router> {
    pub fn pattern(&self) -> &'router PathPattern {
        &self.route.pattern
    }

    pub fn handler(&self) -> &'router BoxHandler {
        &self.route.handler
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    pub fn into_bindings(self) -> Bindings {
        self.bindings
    }
}

impl fmt::Debug for RouteMatch<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteMatch").field("route", self.route).field("bindings", &self.bindings).finish()
    }
}

/// The route table: method to ordered routes.
#[derive(Default)]
pub struct Router {
    routes: HashMap<Method, Vec<Route>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `method` and `pattern`.
    ///
    /// Registering the same method and pattern again replaces the handler
    /// and keeps the original position in the lookup order.
    pub fn register(
        &mut self,
        method: Method,
        pattern: impl Into<String>,
        handler: BoxHandler,
    ) -> Result<&mut Self, RegisterError> {
        let pattern = pattern.into();
        validate_pattern(&pattern)?;

        let routes = self.routes.entry(method).or_default();
        match routes.iter_mut().find(|route| route.pattern.as_str() == pattern) {
            Some(route) => {
                debug!(pattern = %pattern, "replacing route handler");
                route.handler = handler;
            }
            None => routes.push(Route { pattern: PathPattern::new(pattern), handler }),
        }
        Ok(self)
    }

    /// Registers a route for a method given by name, e.g. `"GET"`.
    pub fn register_str(
        &mut self,
        method: &str,
        pattern: impl Into<String>,
        handler: BoxHandler,
    ) -> Result<&mut Self, RegisterError> {
        let method = Method::from_bytes(method.as_bytes()).map_err(|_invalid| RegisterError::invalid_method(method))?;
        self.register(method, pattern, handler)
    }

    /// Registers a route built by one of the method helpers such as [`get`].
    pub fn route(&mut self, pattern: impl Into<String>, item: RouteItem) -> Result<&mut Self, RegisterError> {
        self.register(item.method, pattern, item.handler)
    }

    /// Returns the first route registered for `method` that matches `path`.
    pub fn lookup(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        self.routes
            .get(method)?
            .iter()
            .find_map(|route| route.pattern.match_path(path).map(|bindings| RouteMatch { route, bindings }))
    }

    /// Routes registered for `method`, in lookup order.
    pub fn routes(&self, method: &Method) -> &[Route] {
        self.routes.get(method).map(Vec::as_slice).unwrap_or_default()
    }

    /// Total number of routes over all methods.
    pub fn len(&self) -> usize {
        self.routes.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.routes.iter()).finish()
    }
}

fn validate_pattern(pattern: &str) -> Result<(), RegisterError> {
    if !pattern.starts_with('/') {
        return Err(RegisterError::invalid_pattern(pattern, "must start with '/'"));
    }
    let has_unnamed_param = PathPattern::new(pattern)
        .segments()
        .iter()
        .any(|segment| matches!(segment, Segment::Param(name) if name.is_empty()));
    if has_unnamed_param {
        return Err(RegisterError::invalid_pattern(pattern, "parameter segment without a name"));
    }
    Ok(())
}

/// A handler bound to a method, waiting for a pattern.
pub struct RouteItem {
    method: Method,
    handler: BoxHandler,
}

impl RouteItem {
    pub fn new<H: RequestHandler + 'static>(method: Method, handler: H) -> Self {
        Self { method, handler: Arc::new(handler) }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }
}

impl fmt::Debug for RouteItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteItem").field("method", &self.method).finish_non_exhaustive()
    }
}

macro_rules! method_route {
    ($name:ident, $method:ident) => {
        #[doc = concat!("Binds `handler` to `", stringify!($method), "` requests.")]
        pub fn $name<H: RequestHandler + 'static>(handler: H) -> RouteItem {
            RouteItem::new(Method::$method, handler)
        }
    };
}

method_route!(get, GET);
method_route!(post, POST);
method_route!(put, PUT);
method_route!(delete, DELETE);
method_route!(head, HEAD);
method_route!(options, OPTIONS);
method_route!(patch, PATCH);

/// The innermost pipeline stage: resolves the route and runs its handler.
pub(crate) struct RouteStage {
    router: Arc<Router>,
}

impl RouteStage {
    pub(crate) fn new(router: Arc<Router>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl RequestHandler for RouteStage {
    async fn invoke(&self, ctx: &mut RequestContext) {
        let Some(matched) = self.router.lookup(ctx.method(), ctx.path()) else {
            debug!(method = %ctx.method(), path = ctx.path(), "no route matched");
            ctx.render_error(StatusCode::NOT_FOUND);
            return;
        };

        let handler = matched.handler();
        let params = ctx.params_mut();
        for (name, value) in matched.into_bindings() {
            params.merge(ParamSource::Path, name, value);
        }
        handler.invoke(ctx).await;
    }
}
