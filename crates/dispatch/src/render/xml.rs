use crate::render::{APPLICATION_XML_UTF_8, RenderError, Renderer, escape_html};
use bytes::Bytes;
use http::HeaderValue;
use serde::Serialize;
use serde_json::Value;

/// Encodes values as nested XML elements.
///
/// Objects become child elements named after their keys, arrays repeat the
/// enclosing element once per item, scalars become escaped text and `null`
/// becomes an empty element.
#[derive(Debug, Clone)]
pub struct XmlRenderer {
    root: String,
}

impl XmlRenderer {
    pub fn new(root: impl Into<String>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for XmlRenderer {
    fn default() -> Self {
        Self::new("response")
    }
}

impl Renderer for XmlRenderer {
    fn content_type(&self) -> HeaderValue {
        HeaderValue::from_static(APPLICATION_XML_UTF_8)
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Bytes, RenderError> {
        let value = serde_json::to_value(value)?;
        let mut out = String::new();
        write_element(&mut out, &self.root, &value)?;
        Ok(Bytes::from(out))
    }
}

fn write_element(out: &mut String, name: &str, value: &Value) -> Result<(), RenderError> {
    if !is_valid_name(name) {
        return Err(RenderError::xml(format!("'{name}' is not a valid element name")));
    }

    match value {
        Value::Array(items) => {
            for item in items {
                write_element(out, name, item)?;
            }
        }
        Value::Object(members) => {
            open(out, name);
            for (key, member) in members {
                write_element(out, key, member)?;
            }
            close(out, name);
        }
        Value::Null => {
            open(out, name);
            close(out, name);
        }
        Value::String(s) => {
            open(out, name);
            out.push_str(&escape_html(s));
            close(out, name);
        }
        scalar => {
            open(out, name);
            out.push_str(&scalar.to_string());
            close(out, name);
        }
    }
    Ok(())
}

fn open(out: &mut String, name: &str) {
    out.push('<');
    out.push_str(name);
    out.push('>');
}

fn close(out: &mut String, name: &str) {
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_alphabetic() || first == '_')
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
        && !name.to_ascii_lowercase().starts_with("xml")
}

#[cfg(test)]
mod tests {
    use super::XmlRenderer;
    use crate::render::{RenderError, Renderer};
    use serde::Serialize;
    use serde_json::json;

    #[derive(Serialize)]
    #[serde(rename_all = "PascalCase")]
    struct User {
        id: String,
        address_id: String,
    }

    #[test]
    fn test_struct() {
        let user = User { id: "42".into(), address_id: String::new() };
        let bytes = XmlRenderer::new("User").encode(&user).unwrap();
        assert_eq!(&bytes[..], b"<User><AddressId></AddressId><Id>42</Id></User>");
    }

    #[test]
    fn test_nested_and_arrays() {
        let value = json!({"tags": ["a", "b"], "meta": {"ok": true, "n": 1, "none": null}});
        let bytes = XmlRenderer::default().encode(&value).unwrap();
        assert_eq!(
            &bytes[..],
            &b"<response><meta><n>1</n><none></none><ok>true</ok></meta><tags>a</tags><tags>b</tags></response>"[..]
        );
    }

    #[test]
    fn test_text_is_escaped() {
        let bytes = XmlRenderer::new("msg").encode("a < b & c").unwrap();
        assert_eq!(&bytes[..], b"<msg>a &lt; b &amp; c</msg>");
    }

    #[test]
    fn test_invalid_element_name() {
        let value = json!({"1st": "x"});
        let err = XmlRenderer::default().encode(&value).unwrap_err();
        assert!(matches!(err, RenderError::Xml { .. }));
    }
}
