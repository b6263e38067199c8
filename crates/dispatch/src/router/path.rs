//! Path pattern matching.
//!
//! A pattern is split on `/` into segments, each either a literal or a named
//! parameter written as `:name`. Matching is closed-arity: the observed path
//! must have exactly as many segments as the pattern, and every parameter
//! segment binds exactly one path segment.
//!
//! ```
//! use micro_dispatch::router::PathPattern;
//!
//! let pattern = PathPattern::new("/users/:user_id/addresses/:address_id");
//! let bindings = pattern.match_path("/users/7/addresses/12").unwrap();
//! assert_eq!(bindings.get("user_id"), Some("7"));
//! assert_eq!(bindings.get("address_id"), Some("12"));
//! ```

const SEPARATOR: char = '/';
const PARAM_SIGIL: char = ':';

/// A segment in a path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Must equal the path segment byte for byte.
    Literal(String),
    /// Matches any single path segment and binds it under this name.
    Param(String),
}

impl Segment {
    fn parse(raw: &str) -> Self {
        match raw.strip_prefix(PARAM_SIGIL) {
            Some(name) => Segment::Param(name.to_string()),
            None => Segment::Literal(raw.to_string()),
        }
    }
}

/// A route template parsed once at registration time.
#[derive(Debug, Clone)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        let raw = pattern.into();
        let segments = raw.split(SEPARATOR).map(Segment::parse).collect();
        Self { raw, segments }
    }

    /// Returns the pattern string as registered.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns true if the pattern has no parameter segment.
    pub fn is_literal(&self) -> bool {
        self.segments.iter().all(|segment| matches!(segment, Segment::Literal(_)))
    }

    /// Matches an observed path against this pattern.
    ///
    /// Identical strings match without bindings. Otherwise both sides are
    /// walked pairwise once; parameter values are the raw path segments,
    /// never decoded or validated.
    pub fn match_path(&self, path: &str) -> Option<Bindings> {
        if self.raw == path {
            return Some(Bindings::empty());
        }

        let path_segments = path.split(SEPARATOR);
        if path_segments.clone().count() != self.segments.len() {
            return None;
        }

        let mut bindings = Bindings::empty();
        for (segment, observed) in self.segments.iter().zip(path_segments) {
            match segment {
                Segment::Literal(literal) if literal == observed => {}
                Segment::Param(name) => bindings.push(name, observed),
                Segment::Literal(_) => return None,
            }
        }

        Some(bindings)
    }
}

/// Shorthand for [`PathPattern::match_path`] on an unparsed pattern.
pub fn match_path(pattern: &str, path: &str) -> Option<Bindings> {
    PathPattern::new(pattern).match_path(path)
}

/// Name to value pairs produced by matching parameter segments.
///
/// When a pattern repeats a parameter name, the right-most binding wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings {
    pairs: Vec<(String, String)>,
}

impl Bindings {
    #[inline]
    pub fn empty() -> Self {
        Self { pairs: Vec::new() }
    }

    fn push(&mut self, name: &str, value: &str) {
        match self.pairs.iter_mut().find(|(key, _)| key == name) {
            Some(pair) => pair.1 = value.to_string(),
            None => self.pairs.push((name.to_string(), value.to_string())),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

impl IntoIterator for Bindings {
    type Item = (String, String);
    type IntoIter = std::vec::IntoIter<(String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.pairs.into_iter()
    }
}
