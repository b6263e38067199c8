use crate::RequestContext;
use crate::handler::{BoxHandler, RequestHandler};
use crate::middleware::Middleware;
use crate::middleware::form::has_content_type;
use crate::params::{ParamSource, ParamValue};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::warn;

/// Merges the members of a JSON object body into the request params.
///
/// String members become text, all other members are kept as structured
/// values. Bodies that are empty, malformed or not an object are logged and
/// otherwise ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonBodyMiddleware;

impl JsonBodyMiddleware {
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for JsonBodyMiddleware {
    fn wrap(&self, next: BoxHandler) -> BoxHandler {
        Arc::new(JsonBodyStage { next })
    }
}

struct JsonBodyStage {
    next: BoxHandler,
}

#[async_trait]
impl RequestHandler for JsonBodyStage {
    async fn invoke(&self, ctx: &mut RequestContext) {
        if !ctx.body().is_empty() && has_content_type(ctx, &mime::APPLICATION_JSON) {
            match serde_json::from_slice::<Map<String, Value>>(ctx.body()) {
                Ok(members) => {
                    let params = ctx.params_mut();
                    for (name, value) in members {
                        params.merge(ParamSource::Body, name, ParamValue::from(value));
                    }
                }
                Err(e) => warn!(path = ctx.path(), cause = %e, "parse json body error"),
            }
        }
        self.next.invoke(ctx).await;
    }
}
