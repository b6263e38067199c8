//! Response renderers.
//!
//! A [`Renderer`] turns a serializable value into a content-type tagged
//! payload. Rendering through [`RequestContext::render_with`] encodes the
//! whole payload before the response sink is touched, so a failing encoder
//! never leaves half a body behind.
//!
//! [`RequestContext::render_with`]: crate::RequestContext::render_with

mod template;
mod xml;

pub use template::{Template, TemplateCache, TemplateRenderer};
pub use xml::XmlRenderer;

use bytes::Bytes;
use http::HeaderValue;
use serde::Serialize;
use std::io;
use thiserror::Error;

pub(crate) const TEXT_PLAIN_UTF_8: &str = "text/plain; charset=utf-8";
pub(crate) const TEXT_HTML_UTF_8: &str = "text/html; charset=utf-8";
const APPLICATION_JSON_UTF_8: &str = "application/json; charset=utf-8";
const APPLICATION_XML_UTF_8: &str = "application/xml; charset=utf-8";

pub trait Renderer: Send + Sync {
    fn content_type(&self) -> HeaderValue;

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Bytes, RenderError>;
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("serialize error: {source}")]
    Serialize {
        #[from]
        source: serde_json::Error,
    },

    #[error("invalid xml: {reason}")]
    Xml { reason: String },

    #[error("can not load template '{path}': {source}")]
    TemplateIo { path: String, source: io::Error },

    #[error("invalid template '{path}': {reason}")]
    TemplateSyntax { path: String, reason: String },
}

impl RenderError {
    pub fn xml<S: ToString>(reason: S) -> Self {
        Self::Xml { reason: reason.to_string() }
    }

    pub fn template_io<S: ToString>(path: S, source: io::Error) -> Self {
        Self::TemplateIo { path: path.to_string(), source }
    }

    pub fn template_syntax<S: ToString, R: ToString>(path: S, reason: R) -> Self {
        Self::TemplateSyntax { path: path.to_string(), reason: reason.to_string() }
    }
}

/// Encodes values as a JSON document followed by a newline.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn content_type(&self) -> HeaderValue {
        HeaderValue::from_static(APPLICATION_JSON_UTF_8)
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Bytes, RenderError> {
        let mut buf = serde_json::to_vec(value)?;
        buf.push(b'\n');
        Ok(Bytes::from(buf))
    }
}

/// Escapes the five characters that are significant in HTML and XML text.
pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&#34;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::{JsonRenderer, Renderer, escape_html};
    use std::collections::BTreeMap;

    #[test]
    fn test_json_renderer() {
        let mut map = BTreeMap::new();
        map.insert("user_id", "1");
        map.insert("address_id", "2");

        let bytes = JsonRenderer.encode(&map).unwrap();
        assert_eq!(&bytes[..], b"{\"address_id\":\"2\",\"user_id\":\"1\"}\n");
        assert_eq!(JsonRenderer.content_type(), "application/json; charset=utf-8");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<a href=\"x\">Tom & 'Jerry'</a>"),
            "&lt;a href=&#34;x&#34;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
        assert_eq!(escape_html("plain"), "plain");
    }
}
