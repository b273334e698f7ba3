//! Slash-delimited pointer paths into a JSON document.
//!
//! Paths follow the RFC 6901 surface syntax (`/a/b/0`, with `~0`/`~1`
//! escapes), but parsing is total: any string produces a pointer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A parsed pointer path into a JSON document.
///
/// # Examples
///
/// ```
/// use strand_state::Pointer;
///
/// let p = Pointer::parse("/users/0/name");
/// assert_eq!(p.segments(), ["users", "0", "name"]);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Pointer(Vec<String>);

impl Pointer {
    /// The root pointer (empty path, addressing the whole document).
    #[inline]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Parse a slash-delimited pointer string.
    ///
    /// An empty string is the root. A missing leading slash is tolerated
    /// and treated as if it were present; `~1` and `~0` unescape to `/`
    /// and `~` per RFC 6901.
    pub fn parse(raw: &str) -> Self {
        if raw.is_empty() {
            return Self::root();
        }
        let body = raw.strip_prefix('/').unwrap_or(raw);
        Self(body.split('/').map(unescape).collect())
    }

    /// Build a pointer from owned segments.
    #[inline]
    pub fn from_segments(segments: Vec<String>) -> Self {
        Self(segments)
    }

    /// The path segments, in order.
    #[inline]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Whether this pointer addresses the document root.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of segments.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the pointer has no segments.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Split into the intermediate segments and the final segment.
    ///
    /// Returns `None` for the root pointer.
    pub fn split_last(&self) -> Option<(&[String], &str)> {
        let (last, head) = self.0.split_last()?;
        Some((head, last.as_str()))
    }
}

fn unescape(segment: &str) -> String {
    // Order matters: ~1 first so "~01" decodes to "~1", not "/".
    segment.replace("~1", "/").replace("~0", "~")
}

fn escape(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for seg in &self.0 {
            write!(f, "/{}", escape(seg))?;
        }
        Ok(())
    }
}

impl From<String> for Pointer {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<&str> for Pointer {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<Pointer> for String {
    fn from(p: Pointer) -> Self {
        p.to_string()
    }
}
