// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Structured tree addresses.
//!
//! A [`Path`] is the parsed form of a slash-delimited, module-prefixed,
//! key-qualified address into a document tree, for example
//! `/openconfig-interfaces:interfaces/interface[name='0/2']/state`.
//!
//! Paths compare by structure, not by spelling: the module prefix may be
//! repeated on every segment or only on the first, and both spellings denote
//! the same logical path. [`Path`] preserves the original spelling for
//! display while implementing equality, ordering and hashing over the
//! canonical form (owning module, unprefixed segment names, key values).
//! This makes `Path` usable as an ordered map key with reproducible
//! iteration order.
//!
//! The empty string and `"/"` both parse to the root path: depth zero, no
//! module. A root path is distinct from a module-scoped root such as
//! `/openconfig-interfaces:interfaces` (depth one) — the former addresses
//! everything, the latter a single module's subtree.

use smallvec::SmallVec;
use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
    str::FromStr,
};
use thiserror::Error;

/// Failure to parse a path string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathParseError {
    /// Paths are absolute; anything non-empty must start with `/`.
    #[error("path must start with '/': `{0}`")]
    NotAbsolute(String),

    /// Two consecutive slashes, or a segment consisting only of predicates.
    #[error("empty segment in path `{0}`")]
    EmptySegment(String),

    /// A key predicate that is not `[key='value']` or `['value']`.
    #[error("malformed key predicate `{0}`")]
    BadPredicate(String),
}

/// One step of a [`Path`]: an optional module prefix, a node name, and an
/// ordered list of key predicates.
///
/// A predicate parsed from `['value']` (no key name) keeps an empty key
/// name; consumers resolve it against the schema's first declared key.
#[derive(Debug, Clone)]
pub struct Segment {
    module: Option<String>,
    name: String,
    keys: Vec<(String, String)>,
}

impl Segment {
    /// Creates an unprefixed, unkeyed segment.
    pub fn new(name: impl Into<String>) -> Self {
        Segment {
            module: None,
            name: name.into(),
            keys: Vec::new(),
        }
    }

    /// Attaches a module prefix.
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Attaches key predicates, replacing any existing ones.
    pub fn with_keys(mut self, keys: Vec<(String, String)>) -> Self {
        self.keys = keys;
        self
    }

    /// The module prefix, if spelled on this segment.
    pub fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    /// The node name without any prefix.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The key predicates in spelled order.
    pub fn keys(&self) -> &[(String, String)] {
        &self.keys
    }

    /// Whether this segment carries at least one key predicate.
    pub fn has_keys(&self) -> bool {
        !self.keys.is_empty()
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(module) = &self.module {
            write!(f, "{module}:")?;
        }
        write!(f, "{}", self.name)?;
        for (k, v) in &self.keys {
            if k.is_empty() {
                write!(f, "['{v}']")?;
            } else {
                write!(f, "[{k}='{v}']")?;
            }
        }
        Ok(())
    }
}

/// A parsed, immutable tree address.
///
/// See the [module documentation](self) for the comparison semantics.
#[derive(Debug, Clone, Default)]
pub struct Path {
    segments: SmallVec<[Segment; 8]>,
}

impl Path {
    /// The root path: depth zero, no module.
    pub fn root() -> Self {
        Path::default()
    }

    /// Parses a slash-delimited path string.
    ///
    /// Slashes inside quoted key values do not split segments, so
    /// `/interfaces/interface[name='0/2']` parses as two segments.
    pub fn parse(input: &str) -> Result<Self, PathParseError> {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed == "/" {
            return Ok(Path::root());
        }
        let Some(body) = trimmed.strip_prefix('/') else {
            return Err(PathParseError::NotAbsolute(input.to_string()));
        };

        let mut segments = SmallVec::new();
        for raw in split_segments(body) {
            if raw.is_empty() {
                return Err(PathParseError::EmptySegment(input.to_string()));
            }
            segments.push(parse_segment(raw, input)?);
        }
        Ok(Path { segments })
    }

    /// Number of segments.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Whether this is the root path.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// The segments in order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The last segment, unless this is the root path.
    pub fn last_segment(&self) -> Option<&Segment> {
        self.segments.last()
    }

    /// The module owning this path: the first segment's prefix.
    ///
    /// `None` both for the root path and for paths spelled without any
    /// module prefix.
    pub fn first_module_name(&self) -> Option<&str> {
        self.segments.first().and_then(|s| s.module())
    }

    /// A copy of this path with the last segment removed. The root path is
    /// its own parent.
    pub fn parent(&self) -> Path {
        let mut p = self.clone();
        p.segments.pop();
        p
    }

    /// A copy truncated to the first `depth` segments.
    pub fn truncated(&self, depth: usize) -> Path {
        Path {
            segments: self.segments.iter().take(depth).cloned().collect(),
        }
    }

    /// A copy extended by one segment.
    pub fn join(&self, segment: Segment) -> Path {
        let mut p = self.clone();
        p.segments.push(segment);
        p
    }

    /// A copy with all key predicates stripped.
    pub fn unkeyed(&self) -> Path {
        let mut p = self.clone();
        for seg in &mut p.segments {
            seg.keys.clear();
        }
        p
    }

    /// A copy with all module prefixes stripped.
    pub fn unprefixed(&self) -> Path {
        let mut p = self.clone();
        for seg in &mut p.segments {
            seg.module = None;
        }
        p
    }

    /// A copy whose last segment carries exactly `keys`. No-op on the root
    /// path.
    pub fn with_last_segment_keys(&self, keys: Vec<(String, String)>) -> Path {
        let mut p = self.clone();
        if let Some(last) = p.segments.last_mut() {
            last.keys = keys;
        }
        p
    }

    /// Whether the last segment carries key predicates.
    pub fn is_last_segment_keyed(&self) -> bool {
        self.segments.last().is_some_and(Segment::has_keys)
    }

    /// The key predicates of the first segment named `name`, compared
    /// without prefixes.
    pub fn keys_for_segment(&self, name: &str) -> Option<&[(String, String)]> {
        self.segments
            .iter()
            .find(|s| s.name() == name)
            .map(|s| s.keys())
    }

    /// Structural descendant test ignoring module prefixes and keys:
    /// `self` is strictly deeper than `other` and agrees with it on every
    /// leading segment name.
    pub fn is_descendant_of_unprefixed(&self, other: &Path) -> bool {
        self.depth() > other.depth() && self.names_start_with(other)
    }

    /// Structural equality ignoring module prefixes and keys.
    pub fn equals_unprefixed_unkeyed(&self, other: &Path) -> bool {
        self.depth() == other.depth() && self.names_start_with(other)
    }

    /// The segment-depth difference to `other` when `other` is an
    /// ancestor-or-equal of `self` (by names, ignoring prefixes and keys).
    pub fn segment_distance(&self, other: &Path) -> Option<usize> {
        (self.depth() >= other.depth() && self.names_start_with(other))
            .then(|| self.depth() - other.depth())
    }

    fn names_start_with(&self, other: &Path) -> bool {
        other
            .segments
            .iter()
            .zip(&self.segments)
            .all(|(o, s)| o.name() == s.name())
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "/");
        }
        for seg in &self.segments {
            write!(f, "/{seg}")?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = PathParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Path::parse(s)
    }
}

// Comparison is over the canonical form so that prefix respellings collapse.
impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Path {}

impl PartialOrd for Path {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Path {
    fn cmp(&self, other: &Self) -> Ordering {
        self.first_module_name()
            .cmp(&other.first_module_name())
            .then_with(|| {
                for (a, b) in self.segments.iter().zip(&other.segments) {
                    let ord = a.name().cmp(b.name()).then_with(|| a.keys.cmp(&b.keys));
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                self.depth().cmp(&other.depth())
            })
    }
}

impl Hash for Path {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.first_module_name().hash(state);
        for seg in &self.segments {
            seg.name().hash(state);
            seg.keys.hash(state);
        }
    }
}

/// Splits the path body on `/`, ignoring slashes inside `[...]` predicates
/// and quoted values.
fn split_segments(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_brackets = false;
    let mut in_quotes = false;
    for (i, c) in body.char_indices() {
        match c {
            '\'' if in_brackets => in_quotes = !in_quotes,
            '[' if !in_quotes => in_brackets = true,
            ']' if !in_quotes => in_brackets = false,
            '/' if !in_brackets && !in_quotes => {
                parts.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&body[start..]);
    parts
}

fn parse_segment(raw: &str, whole: &str) -> Result<Segment, PathParseError> {
    let (name_part, keys_part) = match raw.find('[') {
        Some(i) => (&raw[..i], &raw[i..]),
        None => (raw, ""),
    };

    let (module, name) = match name_part.split_once(':') {
        Some((module, name)) => (Some(module), name),
        None => (None, name_part),
    };
    if name.is_empty() {
        return Err(PathParseError::EmptySegment(whole.to_string()));
    }

    let mut keys = Vec::new();
    let mut rest = keys_part;
    while !rest.is_empty() {
        let Some(stripped) = rest.strip_prefix('[') else {
            return Err(PathParseError::BadPredicate(rest.to_string()));
        };
        let Some(end) = find_predicate_end(stripped) else {
            return Err(PathParseError::BadPredicate(rest.to_string()));
        };
        let body = &stripped[..end];
        keys.push(parse_predicate(body)?);
        rest = &stripped[end + 1..];
    }

    let mut segment = Segment::new(name).with_keys(keys);
    if let Some(module) = module {
        segment = segment.with_module(module);
    }
    Ok(segment)
}

/// Index of the `]` closing the current predicate, respecting quotes.
fn find_predicate_end(s: &str) -> Option<usize> {
    let mut in_quotes = false;
    for (i, c) in s.char_indices() {
        match c {
            '\'' => in_quotes = !in_quotes,
            ']' if !in_quotes => return Some(i),
            _ => {}
        }
    }
    None
}

fn parse_predicate(body: &str) -> Result<(String, String), PathParseError> {
    let unquote = |v: &str| -> Option<String> {
        v.strip_prefix('\'')
            .and_then(|v| v.strip_suffix('\''))
            .map(str::to_string)
    };
    // `['value']` names no key; it is resolved against the schema later.
    if let Some(value) = unquote(body) {
        return Ok((String::new(), value));
    }
    let Some((key, value)) = body.split_once('=') else {
        return Err(PathParseError::BadPredicate(body.to_string()));
    };
    let Some(value) = unquote(value) else {
        return Err(PathParseError::BadPredicate(body.to_string()));
    };
    if key.is_empty() {
        return Err(PathParseError::BadPredicate(body.to_string()));
    }
    Ok((key.to_string(), value))
}
