use crate::RequestContext;
use crate::handler::{BoxHandler, RequestHandler};
use crate::middleware::Middleware;
use crate::params::{ParamSource, ParamValue};
use async_trait::async_trait;
use http::{Method, header};
use mime::Mime;
use std::sync::Arc;
use tracing::warn;

/// Returns true if the request declares a body of the given media type,
/// ignoring parameters such as `charset`.
pub(crate) fn has_content_type(ctx: &RequestContext, expected: &Mime) -> bool {
    ctx.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<Mime>().ok())
        .is_some_and(|mime| mime.essence_str() == expected.essence_str())
}

/// Merges url-encoded form bodies of `POST`, `PUT` and `PATCH` requests into
/// the request params.
///
/// A key that appears once becomes text, a repeated key becomes a list in
/// body order. Malformed bodies are logged and otherwise ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct FormMiddleware;

impl FormMiddleware {
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for FormMiddleware {
    fn wrap(&self, next: BoxHandler) -> BoxHandler {
        Arc::new(FormStage { next })
    }
}

struct FormStage {
    next: BoxHandler,
}

#[async_trait]
impl RequestHandler for FormStage {
    async fn invoke(&self, ctx: &mut RequestContext) {
        let accepts_body = matches!(*ctx.method(), Method::POST | Method::PUT | Method::PATCH);
        if accepts_body && has_content_type(ctx, &mime::APPLICATION_WWW_FORM_URLENCODED) {
            merge_form(ctx);
        }
        self.next.invoke(ctx).await;
    }
}

fn merge_form(ctx: &mut RequestContext) {
    let pairs = match serde_urlencoded::from_bytes::<Vec<(String, String)>>(ctx.body()) {
        Ok(pairs) => pairs,
        Err(e) => {
            warn!(path = ctx.path(), cause = %e, "parse form body error");
            return;
        }
    };

    let mut fields: Vec<(String, Vec<String>)> = Vec::new();
    for (key, value) in pairs {
        match fields.iter_mut().find(|(name, _)| *name == key) {
            Some((_, values)) => values.push(value),
            None => fields.push((key, vec![value])),
        }
    }

    let params = ctx.params_mut();
    for (name, mut values) in fields {
        let value = if values.len() == 1 { ParamValue::Text(values.remove(0)) } else { ParamValue::List(values) };
        params.merge(ParamSource::Body, name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::FormMiddleware;
    use crate::RequestContext;
    use crate::handler::{BoxHandler, RequestHandler, handler_sync};
    use crate::middleware::Middleware;
    use crate::params::{ParamSource, ParamValue};
    use bytes::Bytes;
    use http::{Method, Request, StatusCode, header};
    use std::sync::Arc;

    fn context(method: Method, content_type: &str, body: &'static str) -> RequestContext {
        let (parts, ()) = Request::builder()
            .method(method)
            .uri("/users")
            .header(header::CONTENT_TYPE, content_type)
            .body(())
            .unwrap()
            .into_parts();
        RequestContext::new(parts, Bytes::from_static(body.as_bytes()))
    }

    fn ok() -> BoxHandler {
        Arc::new(handler_sync(|ctx| ctx.render_text(StatusCode::OK, "ok")))
    }

    #[tokio::test]
    async fn test_form_fields_become_params() {
        let stage = FormMiddleware::new().wrap(ok());
        let mut ctx = context(
            Method::POST,
            "application/x-www-form-urlencoded; charset=utf-8",
            "name=Ann&tag=a&tag=b&note=hello+world",
        );
        stage.invoke(&mut ctx).await;

        assert_eq!(ctx.param("name").unwrap(), "Ann");
        assert_eq!(ctx.param("note").unwrap(), "hello world");
        assert_eq!(ctx.params().list("tag").unwrap(), ["a", "b"]);
        assert_eq!(ctx.params().source("name"), Some(ParamSource::Body));
        assert_eq!(ctx.response().status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_body_overrides_query() {
        let stage = FormMiddleware::new().wrap(ok());
        let mut ctx = context(Method::PUT, "application/x-www-form-urlencoded", "name=Body");
        ctx.params_mut().merge(ParamSource::Query, "name", "Query");
        stage.invoke(&mut ctx).await;

        assert_eq!(ctx.params().get("name"), Some(&ParamValue::Text("Body".to_string())));
    }

    #[tokio::test]
    async fn test_ignored_requests() {
        let stage = FormMiddleware::new().wrap(ok());

        let mut ctx = context(Method::GET, "application/x-www-form-urlencoded", "name=Ann");
        stage.invoke(&mut ctx).await;
        assert!(ctx.params().is_empty());

        let mut ctx = context(Method::POST, "text/plain", "name=Ann");
        stage.invoke(&mut ctx).await;
        assert!(ctx.params().is_empty());
        assert_eq!(ctx.response().status(), StatusCode::OK);
    }
}
