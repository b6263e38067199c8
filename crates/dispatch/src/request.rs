//! The per-request context handed through the middleware pipeline.
//!
//! A [`RequestContext`] is created by the dispatcher for exactly one request
//! and dropped once the pipeline returns. It carries:
//! - the request head (method, URI, version, headers) and the buffered body
//! - the [`Params`] collected from the query string, the matched route and the body
//! - the [`ResponseSink`] handlers and renderers write to

use crate::body::ResponseBody;
use crate::params::{ParamError, ParamValue, Params};
use crate::render::{self, RenderError, Renderer};
use crate::response::ResponseSink;
use bytes::Bytes;
use http::header::{self, HeaderValue};
use http::request::Parts;
use http::{HeaderMap, Method, Response, StatusCode, Uri, Version};
use serde::Serialize;
use std::str::{self, Utf8Error};
use tracing::{error, warn};

#[derive(Debug)]
pub struct RequestContext {
    head: Parts,
    body: Bytes,
    params: Params,
    response: ResponseSink,
}

impl RequestContext {
    /// Creates a context with empty params and an uncommitted response.
    pub fn new(head: Parts, body: Bytes) -> Self {
        Self { head, body, params: Params::new(), response: ResponseSink::new() }
    }

    /// Returns the HTTP method of the request
    pub fn method(&self) -> &Method {
        &self.head.method
    }

    /// Returns the URI of the request
    pub fn uri(&self) -> &Uri {
        &self.head.uri
    }

    /// Returns the path component of the request URI
    pub fn path(&self) -> &str {
        self.head.uri.path()
    }

    /// Returns the HTTP version of the request
    pub fn version(&self) -> Version {
        self.head.version
    }

    /// Returns the HTTP headers of the request
    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    /// Returns the buffered request body
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Finds a cookie by name across all `Cookie` headers.
    ///
    /// Pairs that are malformed or not UTF-8 are skipped. Fails only when the
    /// named cookie is present and its value is not UTF-8.
    pub fn cookie(&self, name: &str) -> Result<Option<&str>, Utf8Error> {
        for value in self.head.headers.get_all(header::COOKIE) {
            let found = value
                .as_bytes()
                .split(|byte| *byte == b';')
                .map(<[u8]>::trim_ascii)
                .filter_map(|pair| pair.iter().position(|byte| *byte == b'=').map(|at| (&pair[..at], &pair[at + 1..])))
                .find(|(key, _)| *key == name.as_bytes());
            if let Some((_, raw)) = found {
                return str::from_utf8(raw).map(|value| Some(value.trim_matches('"')));
            }
        }
        Ok(None)
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }

    /// Reads a text parameter.
    pub fn param(&self, name: &str) -> Result<&str, ParamError> {
        self.params.text(name)
    }

    /// Writes a parameter with handler precedence.
    pub fn set_param(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.params.insert(name, value);
    }

    pub fn response(&self) -> &ResponseSink {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut ResponseSink {
        &mut self.response
    }

    /// Issues a `301 Moved Permanently` to `location`.
    pub fn redirect(&mut self, location: &str) {
        self.redirect_with(location, StatusCode::MOVED_PERMANENTLY);
    }

    /// Issues a redirect with the given 3xx status.
    pub fn redirect_with(&mut self, location: &str, status: StatusCode) {
        let Ok(location_value) = HeaderValue::from_str(location) else {
            error!(location, "invalid redirect location");
            self.render_error(StatusCode::INTERNAL_SERVER_ERROR);
            return;
        };

        self.response.insert_header(header::LOCATION, location_value);
        let has_body = self.head.method == Method::GET || self.head.method == Method::HEAD;
        if has_body {
            self.response.insert_header(header::CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
        }
        self.response.write_header(status);
        if self.head.method == Method::GET {
            let reason = status.canonical_reason().unwrap_or("Redirect");
            let body = format!("<a href=\"{}\">{}</a>.\n", render::escape_html(location), reason);
            self.response.write(body.as_bytes());
        }
    }

    /// Writes a plain text response.
    pub fn render_text(&mut self, status: StatusCode, text: &str) {
        self.response.insert_header(header::CONTENT_TYPE, HeaderValue::from_static(render::TEXT_PLAIN_UTF_8));
        self.response.write_header(status);
        self.response.write(text.as_bytes());
    }

    /// Writes the canonical reason phrase of `status` as a plain text error.
    ///
    /// Does nothing but log if the response is already committed.
    pub fn render_error(&mut self, status: StatusCode) {
        if self.response.is_committed() {
            warn!(
                status = %status,
                committed = %self.response.status(),
                "can not render error, response already committed"
            );
            return;
        }

        self.response.insert_header(header::CONTENT_TYPE, HeaderValue::from_static(render::TEXT_PLAIN_UTF_8));
        self.response.insert_header(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
        self.response.write_header(status);
        let reason = status.canonical_reason().unwrap_or("Unknown Status");
        self.response.write(reason.as_bytes());
        self.response.write(b"\n");
    }

    /// Encodes `value` with `renderer` and writes it with `200 OK`.
    ///
    /// The payload is fully encoded before anything is written, so an encoding
    /// failure turns into a clean `500` through [`render_error`](Self::render_error).
    pub fn render_with<R, T>(&mut self, renderer: &R, value: &T) -> Result<(), RenderError>
    where
        R: Renderer + ?Sized,
        T: Serialize + ?Sized,
    {
        match renderer.encode(value) {
            Ok(bytes) => {
                self.write_rendered(renderer.content_type(), &bytes);
                Ok(())
            }
            Err(e) => {
                error!(cause = %e, "render error");
                self.render_error(StatusCode::INTERNAL_SERVER_ERROR);
                Err(e)
            }
        }
    }

    pub fn render_json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), RenderError> {
        self.render_with(&render::JsonRenderer, value)
    }

    /// Renders `value` as XML under a root element named `root`.
    pub fn render_xml<T: Serialize + ?Sized>(&mut self, root: &str, value: &T) -> Result<(), RenderError> {
        self.render_with(&render::XmlRenderer::new(root), value)
    }

    pub(crate) fn write_rendered(&mut self, content_type: HeaderValue, bytes: &[u8]) {
        self.response.insert_header(header::CONTENT_TYPE, content_type);
        self.response.write_header(StatusCode::OK);
        self.response.write(bytes);
    }

    /// Consumes the context, turning the sink into the transport response.
    pub fn into_response(self) -> Response<ResponseBody> {
        self.response.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::RequestContext;
    use bytes::Bytes;
    use http::{HeaderValue, Method, Request, StatusCode, header};
    use serde::Serialize;
    use serde::ser::Error as _;

    fn context(method: Method, uri: &str) -> RequestContext {
        let (parts, ()) = Request::builder().method(method).uri(uri).body(()).unwrap().into_parts();
        RequestContext::new(parts, Bytes::new())
    }

    fn context_with_cookies(cookies: &[&str]) -> RequestContext {
        let mut builder = Request::builder().uri("/");
        for cookie in cookies {
            builder = builder.header(header::COOKIE, *cookie);
        }
        let (parts, ()) = builder.body(()).unwrap().into_parts();
        RequestContext::new(parts, Bytes::new())
    }

    #[test]
    fn test_cookie_lookup() {
        let ctx = context_with_cookies(&["a=1; X_AUTH=token; b=2", "c=3"]);
        assert_eq!(ctx.cookie("X_AUTH").unwrap(), Some("token"));
        assert_eq!(ctx.cookie("c").unwrap(), Some("3"));
        assert_eq!(ctx.cookie("missing").unwrap(), None);
    }

    #[test]
    fn test_cookie_quoted_value() {
        let ctx = context_with_cookies(&["X_AUTH=\"abc\""]);
        assert_eq!(ctx.cookie("X_AUTH").unwrap(), Some("abc"));
    }

    #[test]
    fn test_cookie_lookup_skips_unreadable_pairs() {
        let mut builder = Request::builder().uri("/");
        let mixed = HeaderValue::from_bytes("theme=café; X_AUTH=token".as_bytes()).unwrap();
        builder = builder.header(header::COOKIE, mixed);
        builder = builder.header(header::COOKIE, HeaderValue::from_bytes(b"\xff\xfe=1; broken; lang=en").unwrap());
        let (parts, ()) = builder.body(()).unwrap().into_parts();
        let ctx = RequestContext::new(parts, Bytes::new());

        assert_eq!(ctx.cookie("X_AUTH").unwrap(), Some("token"));
        assert_eq!(ctx.cookie("theme").unwrap(), Some("café"));
        assert_eq!(ctx.cookie("lang").unwrap(), Some("en"));
        assert_eq!(ctx.cookie("broken").unwrap(), None);
    }

    #[test]
    fn test_cookie_unreadable_value_is_error() {
        let mut builder = Request::builder().uri("/");
        builder = builder.header(header::COOKIE, HeaderValue::from_bytes(b"a=1; X_AUTH=\xff").unwrap());
        let (parts, ()) = builder.body(()).unwrap().into_parts();
        let ctx = RequestContext::new(parts, Bytes::new());

        assert!(ctx.cookie("X_AUTH").is_err());
        assert_eq!(ctx.cookie("a").unwrap(), Some("1"));
    }

    #[test]
    fn test_redirect_get() {
        let mut ctx = context(Method::GET, "/private");
        ctx.redirect("/login");

        let response = ctx.response();
        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(response.headers()[header::LOCATION], "/login");
        assert_eq!(response.body(), b"<a href=\"/login\">Moved Permanently</a>.\n");
    }

    #[test]
    fn test_redirect_post_has_no_body() {
        let mut ctx = context(Method::POST, "/login");
        ctx.redirect("/");

        assert_eq!(ctx.response().status(), StatusCode::MOVED_PERMANENTLY);
        assert!(ctx.response().body().is_empty());
        assert!(ctx.response().headers().get(header::CONTENT_TYPE).is_none());
    }

    #[test]
    fn test_render_error() {
        let mut ctx = context(Method::GET, "/");
        ctx.render_error(StatusCode::INTERNAL_SERVER_ERROR);

        let response = ctx.response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(response.body(), b"Internal Server Error\n");
    }

    #[test]
    fn test_render_error_after_commit_keeps_partial_output() {
        let mut ctx = context(Method::GET, "/");
        ctx.response_mut().write(b"partial");
        ctx.render_error(StatusCode::INTERNAL_SERVER_ERROR);

        assert_eq!(ctx.response().status(), StatusCode::OK);
        assert_eq!(ctx.response().body(), b"partial");
    }

    #[test]
    fn test_render_json() {
        #[derive(Serialize)]
        struct User<'a> {
            id: &'a str,
        }

        let mut ctx = context(Method::GET, "/users/42");
        ctx.render_json(&User { id: "42" }).unwrap();

        let response = ctx.response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json; charset=utf-8");
        assert_eq!(response.body(), b"{\"id\":\"42\"}\n");
    }

    #[test]
    fn test_render_failure_becomes_internal_error() {
        struct Broken;
        impl Serialize for Broken {
            fn serialize<S: serde::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
                Err(S::Error::custom("broken"))
            }
        }

        let mut ctx = context(Method::GET, "/");
        assert!(ctx.render_json(&Broken).is_err());
        assert_eq!(ctx.response().status(), StatusCode::INTERNAL_SERVER_ERROR);
        let content_type = ctx.response().headers().get(header::CONTENT_TYPE).unwrap();
        assert!(content_type.to_str().unwrap().starts_with("text/plain"));
    }
}
