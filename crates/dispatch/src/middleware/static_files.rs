//! Serving files from a directory.
//!
//! The middleware only answers `GET` and `HEAD` requests it can resolve;
//! everything else, including lookups that fail, continues down the chain.

use crate::RequestContext;
use crate::handler::{BoxHandler, RequestHandler};
use crate::middleware::Middleware;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, NaiveDateTime, Utc};
use http::{HeaderValue, Method, StatusCode, header};
use mime::Mime;
use percent_encoding::percent_decode_str;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use thiserror::Error;
use tracing::{debug, warn};

const HTTP_DATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// What a [`StaticResolver`] found for a request path.
#[derive(Debug, Clone, PartialEq)]
pub enum StaticFile {
    /// The path names a directory but was requested without a trailing slash.
    Directory,
    File { content: Bytes, modified: Option<SystemTime>, content_type: Mime },
}

#[derive(Error, Debug)]
pub enum StaticError {
    #[error("path '{path}' escapes the static root")]
    Forbidden { path: String },

    #[error("can not read '{path}': {source}")]
    Io { path: String, source: io::Error },
}

impl StaticError {
    pub fn forbidden<S: ToString>(path: S) -> Self {
        Self::Forbidden { path: path.to_string() }
    }

    pub fn io<S: ToString>(path: S, source: io::Error) -> Self {
        Self::Io { path: path.to_string(), source }
    }
}

#[async_trait]
pub trait StaticResolver: Send + Sync {
    /// Looks up a request path; `Ok(None)` means there is nothing to serve.
    async fn resolve(&self, path: &str) -> Result<Option<StaticFile>, StaticError>;
}

/// Resolves request paths against a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsResolver {
    root: PathBuf,
    index_file: String,
}

impl FsResolver {
    pub fn new(root: impl Into<PathBuf>, index_file: impl Into<String>) -> Self {
        Self { root: root.into(), index_file: index_file.into() }
    }

    /// Maps a request path onto the root, percent-decoding each segment.
    fn local_path(&self, path: &str) -> Result<PathBuf, StaticError> {
        let mut local = self.root.clone();
        for segment in path.split('/') {
            let decoded = percent_decode_str(segment).decode_utf8().map_err(|_| StaticError::forbidden(path))?;
            match decoded.as_ref() {
                "" | "." => {}
                ".." => return Err(StaticError::forbidden(path)),
                name if name.contains(['/', '\\', '\0']) => return Err(StaticError::forbidden(path)),
                name => local.push(name),
            }
        }
        Ok(local)
    }
}

#[async_trait]
impl StaticResolver for FsResolver {
    async fn resolve(&self, path: &str) -> Result<Option<StaticFile>, StaticError> {
        let mut local = self.local_path(path)?;

        let metadata = match tokio::fs::metadata(&local).await {
            Ok(metadata) => metadata,
            Err(e) if is_missing(&e) => return Ok(None),
            Err(e) => return Err(StaticError::io(path, e)),
        };

        if metadata.is_dir() {
            if !path.ends_with('/') {
                return Ok(Some(StaticFile::Directory));
            }
            local.push(&self.index_file);
        } else if path.ends_with('/') {
            return Ok(None);
        }

        let content = match tokio::fs::read(&local).await {
            Ok(content) => content,
            Err(e) if is_missing(&e) => return Ok(None),
            Err(e) => return Err(StaticError::io(path, e)),
        };
        let modified = tokio::fs::metadata(&local).await.and_then(|m| m.modified()).ok();

        Ok(Some(StaticFile::File {
            content: Bytes::from(content),
            modified,
            content_type: content_type_for(&local),
        }))
    }
}

fn is_missing(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory)
}

fn content_type_for(path: &Path) -> Mime {
    let extension = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("html" | "htm") => mime::TEXT_HTML_UTF_8,
        Some("css") => mime::TEXT_CSS_UTF_8,
        Some("js" | "mjs") => mime::TEXT_JAVASCRIPT,
        Some("json") => mime::APPLICATION_JSON,
        Some("txt") => mime::TEXT_PLAIN_UTF_8,
        Some("xml") => mime::TEXT_XML,
        Some("csv") => mime::TEXT_CSV_UTF_8,
        Some("png") => mime::IMAGE_PNG,
        Some("jpg" | "jpeg") => mime::IMAGE_JPEG,
        Some("gif") => mime::IMAGE_GIF,
        Some("svg") => mime::IMAGE_SVG,
        Some("bmp") => mime::IMAGE_BMP,
        Some("pdf") => mime::APPLICATION_PDF,
        Some("woff") => mime::FONT_WOFF,
        Some("woff2") => mime::FONT_WOFF2,
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}

fn format_http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).format(HTTP_DATE).to_string()
}

fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value.trim(), HTTP_DATE).ok().map(|naive| naive.and_utc())
}

#[derive(Clone)]
pub struct StaticFilesMiddleware {
    resolver: Arc<dyn StaticResolver>,
}

impl StaticFilesMiddleware {
    pub fn new<R: StaticResolver + 'static>(resolver: R) -> Self {
        Self { resolver: Arc::new(resolver) }
    }

    /// Serves files below `root`, using `index_file` for directory requests.
    pub fn from_dir(root: impl Into<PathBuf>, index_file: impl Into<String>) -> Self {
        Self::new(FsResolver::new(root, index_file))
    }
}

impl std::fmt::Debug for StaticFilesMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticFilesMiddleware").finish_non_exhaustive()
    }
}

impl Middleware for StaticFilesMiddleware {
    fn wrap(&self, next: BoxHandler) -> BoxHandler {
        Arc::new(StaticFilesStage { resolver: Arc::clone(&self.resolver), next })
    }
}

struct StaticFilesStage {
    resolver: Arc<dyn StaticResolver>,
    next: BoxHandler,
}

#[async_trait]
impl RequestHandler for StaticFilesStage {
    async fn invoke(&self, ctx: &mut RequestContext) {
        let method = ctx.method();
        if method != Method::GET && method != Method::HEAD {
            return self.next.invoke(ctx).await;
        }

        let found = match self.resolver.resolve(ctx.path()).await {
            Ok(found) => found,
            Err(e @ StaticError::Forbidden { .. }) => {
                debug!(cause = %e, "static lookup rejected");
                None
            }
            Err(e) => {
                warn!(cause = %e, "static lookup failed");
                None
            }
        };

        match found {
            None => self.next.invoke(ctx).await,
            Some(StaticFile::Directory) => {
                let location = format!("{}/", ctx.path());
                ctx.redirect_with(&location, StatusCode::FOUND);
            }
            Some(StaticFile::File { content, modified, content_type }) => {
                serve_file(ctx, content, modified, &content_type);
            }
        }
    }
}

fn serve_file(ctx: &mut RequestContext, content: Bytes, modified: Option<SystemTime>, content_type: &Mime) {
    if let Some(modified) = modified {
        let since = ctx
            .headers()
            .get(header::IF_MODIFIED_SINCE)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_http_date);

        // http dates carry whole seconds only
        if let Some(since) = since
            && DateTime::<Utc>::from(modified).timestamp() <= since.timestamp()
        {
            ctx.response_mut().write_header(StatusCode::NOT_MODIFIED);
            return;
        }

        if let Ok(value) = HeaderValue::from_str(&format_http_date(modified)) {
            ctx.response_mut().insert_header(header::LAST_MODIFIED, value);
        }
    }

    let is_head = ctx.method() == Method::HEAD;
    let response = ctx.response_mut();
    if let Ok(value) = HeaderValue::from_str(content_type.as_ref()) {
        response.insert_header(header::CONTENT_TYPE, value);
    }
    response.insert_header(header::CONTENT_LENGTH, HeaderValue::from(content.len()));
    response.write_header(StatusCode::OK);
    if !is_head {
        response.write(&content);
    }
}
