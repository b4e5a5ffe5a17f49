//! Field paths.
//!
//! A [`Path`] is the only way to address a node in a form's values tree.
//! Two fields bound to equal paths alias the same node.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single step from a container to one of its children.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Seg {
    /// Mapping key.
    Key(String),
    /// Sequence index.
    Index(usize),
}

impl Seg {
    #[inline]
    pub fn key(k: impl Into<String>) -> Self {
        Seg::Key(k.into())
    }

    #[inline]
    pub fn index(i: usize) -> Self {
        Seg::Index(i)
    }

    /// Name of the container kind this segment steps into.
    #[inline]
    pub(crate) fn container_kind(&self) -> &'static str {
        match self {
            Seg::Key(_) => "object",
            Seg::Index(_) => "array",
        }
    }
}

impl fmt::Display for Seg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Seg::Key(k) => write!(f, ".{}", k),
            Seg::Index(i) => write!(f, "[{}]", i),
        }
    }
}

impl From<String> for Seg {
    fn from(s: String) -> Self {
        Seg::Key(s)
    }
}

impl From<&str> for Seg {
    fn from(s: &str) -> Self {
        Seg::Key(s.to_owned())
    }
}

impl From<usize> for Seg {
    fn from(i: usize) -> Self {
        Seg::Index(i)
    }
}

/// A walk from the root of a values tree to one of its nodes.
///
/// # Examples
///
/// ```
/// use tirea_form::{parse_path, Path};
///
/// let built = Path::root().key("names").index(0).key("first");
/// assert_eq!(built, parse_path("names[0].first"));
/// assert_eq!(built.to_string(), "$.names[0].first");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Path(Vec<Seg>);

impl Path {
    /// The empty path, addressing the whole tree.
    #[inline]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    #[inline]
    pub fn from_segments(segments: Vec<Seg>) -> Self {
        Self(segments)
    }

    /// Append a key segment (builder).
    #[inline]
    pub fn key(mut self, k: impl Into<String>) -> Self {
        self.0.push(Seg::Key(k.into()));
        self
    }

    /// Append an index segment (builder).
    #[inline]
    pub fn index(mut self, i: usize) -> Self {
        self.0.push(Seg::Index(i));
        self
    }

    #[inline]
    pub fn push(&mut self, seg: Seg) {
        self.0.push(seg);
    }

    /// Return a new path extended by `seg`; `self` is left untouched.
    #[inline]
    pub fn with_segment(&self, seg: impl Into<Seg>) -> Path {
        let mut result = self.clone();
        result.0.push(seg.into());
        result
    }

    /// Extend by a sub-field name.
    ///
    /// A key is parsed like a field name, so `"0"` steps into a sequence and
    /// `"a.b"` adds two segments.
    pub fn join(&self, sub: impl Into<Seg>) -> Path {
        let mut result = self.clone();
        match sub.into() {
            Seg::Key(name) => result.0.extend(parse_path(&name).0),
            index => result.0.push(index),
        }
        result
    }

    #[inline]
    pub fn segments(&self) -> &[Seg] {
        &self.0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn last(&self) -> Option<&Seg> {
        self.0.last()
    }

    /// Path without its last segment, `None` for the root.
    pub fn parent(&self) -> Option<Path> {
        let (_, init) = self.0.split_last()?;
        Some(Path(init.to_vec()))
    }

    /// True when `prefix` is this path or one of its ancestors.
    #[inline]
    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Prefix of this path made of its first `len` segments.
    #[inline]
    pub(crate) fn prefix(&self, len: usize) -> Path {
        Path(self.0[..len].to_vec())
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Seg> {
        self.0.iter()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$")?;
        for seg in &self.0 {
            write!(f, "{}", seg)?;
        }
        Ok(())
    }
}

impl FromIterator<Seg> for Path {
    fn from_iter<I: IntoIterator<Item = Seg>>(iter: I) -> Self {
        Path(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a Seg;
    type IntoIter = std::slice::Iter<'a, Seg>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl std::ops::Index<usize> for Path {
    type Output = Seg;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl From<&str> for Path {
    fn from(name: &str) -> Self {
        parse_path(name)
    }
}

impl From<String> for Path {
    fn from(name: String) -> Self {
        parse_path(&name)
    }
}

impl From<&Path> for Path {
    fn from(path: &Path) -> Self {
        path.clone()
    }
}

/// Parse a field name such as `"names[0].first"` into a [`Path`].
///
/// - dots separate segments; empty segments are skipped;
/// - `[n]` is an index segment;
/// - a dotted segment made only of digits is an index as well (`"items.0"`);
/// - anything else is a key.
///
/// Parsing never fails: unbalanced brackets are kept as part of a key.
pub fn parse_path(name: &str) -> Path {
    let mut path = Path::root();
    for piece in name.split('.') {
        push_piece(&mut path, piece);
    }
    path
}

fn push_piece(path: &mut Path, piece: &str) {
    let (head, mut rest) = match piece.find('[') {
        Some(at) => piece.split_at(at),
        None => (piece, ""),
    };
    push_token(path, head);

    while let Some(open) = rest.strip_prefix('[') {
        let Some(close) = open.find(']') else {
            push_token(path, rest);
            return;
        };
        push_token(path, &open[..close]);
        rest = &open[close + 1..];
    }
    push_token(path, rest);
}

fn push_token(path: &mut Path, token: &str) {
    if token.is_empty() {
        return;
    }
    match token.parse::<usize>() {
        Ok(i) => path.push(Seg::Index(i)),
        Err(_) => path.push(Seg::key(token)),
    }
}

/// Construct a `Path` from a sequence of segments.
///
/// String expressions become key segments, `usize` expressions become index
/// segments.
///
/// ```
/// use tirea_form::path;
///
/// let p = path!("names", 0, "first");
/// assert_eq!(p.len(), 3);
/// ```
#[macro_export]
macro_rules! path {
    () => {
        $crate::Path::root()
    };
    ($($seg:expr),+ $(,)?) => {{
        let mut p = $crate::Path::root();
        $(
            p.push($crate::Seg::from($seg));
        )+
        p
    }};
}
