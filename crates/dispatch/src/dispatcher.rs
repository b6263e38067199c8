use crate::RequestContext;
use crate::body::ResponseBody;
use crate::handler::{BoxHandler, RequestHandler};
use crate::middleware::MiddlewareChain;
use crate::params::{ParamSource, Params};
use crate::router::{RouteStage, Router};
use bytes::Bytes;
use http::{Request, Response};
use std::sync::Arc;
use tracing::warn;

/// Runs one request through the composed pipeline.
///
/// The pipeline is built once, from the middleware chain folded over the
/// route stage. The dispatcher itself keeps no per-request state, so one
/// instance is shared by every connection.
#[derive(Clone)]
pub struct Dispatcher {
    pipeline: BoxHandler,
}

impl Dispatcher {
    pub fn new(router: Router, middlewares: &MiddlewareChain) -> Self {
        let terminal: BoxHandler = Arc::new(RouteStage::new(Arc::new(router)));
        Self { pipeline: middlewares.compose(terminal) }
    }

    /// Wraps an already composed pipeline.
    pub fn from_pipeline(pipeline: BoxHandler) -> Self {
        Self { pipeline }
    }

    pub async fn serve(&self, request: Request<Bytes>) -> Response<ResponseBody> {
        let (parts, body) = request.into_parts();
        let mut ctx = RequestContext::new(parts, body);

        if let Some(query) = ctx.uri().query().map(str::to_owned) {
            seed_query(ctx.params_mut(), &query);
        }

        self.pipeline.invoke(&mut ctx).await;
        ctx.into_response()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}

/// Keeps the first value of every query key.
fn seed_query(params: &mut Params, query: &str) {
    let pairs = match serde_urlencoded::from_str::<Vec<(String, String)>>(query) {
        Ok(pairs) => pairs,
        Err(e) => {
            warn!(query, cause = %e, "parse query string error");
            return;
        }
    };

    for (name, value) in pairs {
        if !params.contains(&name) {
            params.merge(ParamSource::Query, name, value);
        }
    }
}
