//! HTML templates with `{{ name }}` placeholders.
//!
//! Templates are read from a root directory on first use, parsed once and
//! kept in a [`TemplateCache`]. The cache is shared by cloning it into every
//! [`TemplateRenderer`] that should see the same templates. Concurrent first
//! loads of the same path may both parse it; the last insert wins, which is
//! harmless since parsed templates never change.

use crate::RequestContext;
use crate::render::{RenderError, TEXT_HTML_UTF_8, escape_html};
use arc_swap::ArcSwap;
use http::{HeaderValue, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error};

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Text(String),
    Var(Vec<String>),
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pieces: Vec<Piece>,
}

impl Template {
    pub fn parse(name: &str, source: &str) -> Result<Self, RenderError> {
        let mut pieces = Vec::new();
        let mut rest = source;

        while let Some(start) = rest.find(OPEN) {
            if start > 0 {
                pieces.push(Piece::Text(rest[..start].to_string()));
            }

            let after_open = &rest[start + OPEN.len()..];
            let end = after_open
                .find(CLOSE)
                .ok_or_else(|| RenderError::template_syntax(name, format!("unclosed action at byte {start}")))?;

            let key = after_open[..end].trim();
            if key.is_empty() {
                return Err(RenderError::template_syntax(name, "empty action"));
            }
            pieces.push(Piece::Var(key.split('.').map(str::to_string).collect()));

            rest = &after_open[end + CLOSE.len()..];
        }

        if !rest.is_empty() {
            pieces.push(Piece::Text(rest.to_string()));
        }

        Ok(Self { pieces })
    }

    /// Renders the template against `value`.
    ///
    /// Placeholders resolve dotted keys through objects; missing keys render
    /// as nothing, strings are HTML-escaped, other values are written as JSON.
    pub fn render<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, RenderError> {
        let data = serde_json::to_value(value)?;
        let mut out = String::new();

        for piece in &self.pieces {
            match piece {
                Piece::Text(text) => out.push_str(text),
                Piece::Var(keys) => match lookup(&data, keys) {
                    None | Some(Value::Null) => {}
                    Some(Value::String(s)) => out.push_str(&escape_html(s)),
                    Some(other) => out.push_str(&escape_html(&other.to_string())),
                },
            }
        }

        Ok(out)
    }
}

fn lookup<'v>(data: &'v Value, keys: &[String]) -> Option<&'v Value> {
    keys.iter().try_fold(data, |current, key| current.get(key.as_str()))
}

/// A process-wide, lazily populated cache of parsed templates keyed by path.
#[derive(Debug, Clone, Default)]
pub struct TemplateCache {
    inner: Arc<ArcSwap<HashMap<String, Arc<Template>>>>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<Arc<Template>> {
        self.inner.load().get(path).cloned()
    }

    pub fn insert(&self, path: &str, template: Arc<Template>) {
        self.inner.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert(path.to_string(), Arc::clone(&template));
            next
        });
    }

    pub fn len(&self) -> usize {
        self.inner.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.load().is_empty()
    }
}

/// Renders templates from a root directory into the response as HTML.
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    root: PathBuf,
    cache: TemplateCache,
}

impl TemplateRenderer {
    pub fn new(root: impl Into<PathBuf>, cache: TemplateCache) -> Self {
        Self { root: root.into(), cache }
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self::new(root, TemplateCache::new())
    }

    pub fn cache(&self) -> &TemplateCache {
        &self.cache
    }

    /// Returns the cached template for `path`, reading and parsing it on a miss.
    pub async fn load(&self, path: &str) -> Result<Arc<Template>, RenderError> {
        if let Some(template) = self.cache.get(path) {
            return Ok(template);
        }

        let file = self.root.join(path.trim_start_matches('/'));
        debug!(template = path, file = %file.display(), "loading template");
        let source = tokio::fs::read_to_string(&file).await.map_err(|e| RenderError::template_io(path, e))?;
        let template = Arc::new(Template::parse(path, &source)?);
        self.cache.insert(path, Arc::clone(&template));
        Ok(template)
    }

    /// Renders `path` with `value` and writes it with `200 OK`.
    ///
    /// Load and render failures are logged and answered with `500`.
    pub async fn render<T>(&self, ctx: &mut RequestContext, path: &str, value: &T) -> Result<(), RenderError>
    where
        T: Serialize + ?Sized,
    {
        let rendered = match self.load(path).await {
            Ok(template) => template.render(value),
            Err(e) => Err(e),
        };

        match rendered {
            Ok(html) => {
                ctx.write_rendered(HeaderValue::from_static(TEXT_HTML_UTF_8), html.as_bytes());
                Ok(())
            }
            Err(e) => {
                error!(template = path, cause = %e, "render template error");
                ctx.render_error(StatusCode::INTERNAL_SERVER_ERROR);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Template, TemplateCache, TemplateRenderer};
    use crate::RequestContext;
    use crate::render::RenderError;
    use bytes::Bytes;
    use http::{Request, StatusCode, header};
    use serde_json::json;
    use std::sync::Arc;

    fn context() -> RequestContext {
        let (parts, ()) = Request::builder().uri("/").body(()).unwrap().into_parts();
        RequestContext::new(parts, Bytes::new())
    }

    #[test]
    fn test_parse_and_render() {
        let template = Template::parse("t", "<p>{{ message }}</p><i>{{user.name}}</i>{{missing}}!").unwrap();
        let html = template.render(&json!({"message": "<hi>", "user": {"name": "Ann"}})).unwrap();
        assert_eq!(html, "<p>&lt;hi&gt;</p><i>Ann</i>!");
    }

    #[test]
    fn test_render_non_string_values() {
        let template = Template::parse("t", "{{n}} {{b}} {{list}}").unwrap();
        let html = template.render(&json!({"n": 3, "b": false, "list": [1, 2]})).unwrap();
        assert_eq!(html, "3 false [1,2]");
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(Template::parse("t", "a {{ b"), Err(RenderError::TemplateSyntax { .. })));
        assert!(matches!(Template::parse("t", "a {{ }} b"), Err(RenderError::TemplateSyntax { .. })));
    }

    #[test]
    fn test_cache_last_insert_wins() {
        let cache = TemplateCache::new();
        let shared = cache.clone();

        cache.insert("/a.html", Arc::new(Template::parse("a", "first").unwrap()));
        shared.insert("/a.html", Arc::new(Template::parse("a", "second").unwrap()));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("/a.html").unwrap().render(&()).unwrap(), "second");
    }

    #[tokio::test]
    async fn test_renderer_loads_once() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>{{ title }}</h1>").unwrap();

        let renderer = TemplateRenderer::with_root(dir.path());
        let mut ctx = context();
        renderer.render(&mut ctx, "/index.html", &json!({"title": "home"})).await.unwrap();

        assert_eq!(ctx.response().status(), StatusCode::OK);
        assert_eq!(ctx.response().headers()[header::CONTENT_TYPE], "text/html; charset=utf-8");
        assert_eq!(ctx.response().body(), b"<h1>home</h1>");

        // served from the cache even after the file is gone
        std::fs::remove_file(dir.path().join("index.html")).unwrap();
        let mut ctx = context();
        renderer.render(&mut ctx, "/index.html", &json!({"title": "again"})).await.unwrap();
        assert_eq!(ctx.response().body(), b"<h1>again</h1>");
        assert_eq!(renderer.cache().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_template_is_internal_error() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = TemplateRenderer::with_root(dir.path());

        let mut ctx = context();
        let result = renderer.render(&mut ctx, "/nope.html", &()).await;
        assert!(matches!(result, Err(RenderError::TemplateIo { .. })));
        assert_eq!(ctx.response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
