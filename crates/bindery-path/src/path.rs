#![forbid(unsafe_code)]

//! The path type and its parser.
//!
//! Canonical string form: keys joined by `.`, bracket segments appended
//! directly (`movies[3].cast[id=17].name`). The empty string is the root
//! path addressing the whole graph.

use smallvec::SmallVec;

use crate::error::PathError;

/// One step of a [`Path`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Property lookup by name.
    Key(String),
    /// Sequence lookup by position.
    Index(usize),
    /// Sequence lookup by field value: first element whose `key_path`
    /// stringifies to `value`.
    IdMatch { key_path: String, value: String },
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Key(k) => write!(f, "{k}"),
            Self::Index(n) => write!(f, "[{n}]"),
            Self::IdMatch { key_path, value } => write!(f, "[{key_path}={value}]"),
        }
    }
}

/// A normalized segment sequence addressing one node in a state graph.
///
/// Paths are cheap to clone (inline storage for short paths) and
/// prefix-comparable, which is what the notification engine's predicate
/// matching is built on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path {
    segments: SmallVec<[Segment; 4]>,
}

impl Path {
    /// The root path (addresses the whole graph).
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a path from segments.
    #[must_use]
    pub fn from_segments(segments: impl IntoIterator<Item = Segment>) -> Self {
        Self {
            segments: segments.into_iter().collect(),
        }
    }

    /// Whether this is the root (empty) path.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether the path has no segments (same as [`Path::is_root`]).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The segments in order.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The final segment, if any.
    #[must_use]
    pub fn last(&self) -> Option<&Segment> {
        self.segments.last()
    }

    /// Append one segment.
    pub fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    /// This path extended by one segment.
    #[must_use]
    pub fn child(&self, segment: Segment) -> Self {
        let mut out = self.clone();
        out.segments.push(segment);
        out
    }

    /// This path extended by a property key.
    #[must_use]
    pub fn child_key(&self, key: impl Into<String>) -> Self {
        self.child(Segment::Key(key.into()))
    }

    /// This path extended by an index.
    #[must_use]
    pub fn child_index(&self, index: usize) -> Self {
        self.child(Segment::Index(index))
    }

    /// This path extended by an id-match.
    #[must_use]
    pub fn child_id(&self, key_path: impl Into<String>, value: impl Into<String>) -> Self {
        self.child(Segment::IdMatch {
            key_path: key_path.into(),
            value: value.into(),
        })
    }

    /// This path followed by all of `suffix`'s segments.
    #[must_use]
    pub fn join(&self, suffix: &Path) -> Self {
        let mut out = self.clone();
        out.segments.extend(suffix.segments.iter().cloned());
        out
    }

    /// The path with the final segment removed; `None` at the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].iter().cloned().collect(),
        })
    }

    /// Whether every segment of `self` equals the corresponding leading
    /// segment of `other`. The root path is a prefix of everything.
    #[must_use]
    pub fn is_prefix_of(&self, other: &Path) -> bool {
        self.segments.len() <= other.segments.len()
            && self
                .segments
                .iter()
                .zip(other.segments.iter())
                .all(|(a, b)| a == b)
    }

    /// Bidirectional-prefix test used by string predicates: `self` overlaps
    /// a touched path when either is a prefix of the other and the touched
    /// path is non-empty. Ancestor and descendant listeners both fire.
    #[must_use]
    pub fn overlaps(&self, touched: &Path) -> bool {
        !touched.is_root() && (self.is_prefix_of(touched) || touched.is_prefix_of(self))
    }
}

impl std::fmt::Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Key(k) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(k)?;
                }
                other => write!(f, "{other}")?,
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

/// Parse a path string into segments.
///
/// The empty string is the root path. Bracket contents are scanned to the
/// first `]` that sits on a segment boundary (followed by `.`, `[`, or the
/// end of the string), so id values may contain `=`, `.`, and most other
/// punctuation.
pub fn parse(s: &str) -> Result<Path, PathError> {
    let mut segments: SmallVec<[Segment; 4]> = SmallVec::new();
    let b = s.as_bytes();
    let mut i = 0usize;

    while i < b.len() {
        match b[i] {
            b'.' => {
                // Separator between a bracket (or key) and the next key.
                if segments.is_empty() {
                    return Err(PathError::EmptySegment { at: i });
                }
                i += 1;
                if i >= b.len() || b[i] == b'.' || b[i] == b'[' {
                    return Err(PathError::EmptySegment { at: i });
                }
            }
            b'[' => {
                let close = find_bracket_close(b, i + 1)
                    .ok_or(PathError::UnterminatedBracket { at: i })?;
                let content = &s[i + 1..close];
                segments.push(parse_bracket(content)?);
                i = close + 1;
            }
            _ => {
                let start = i;
                while i < b.len() && b[i] != b'.' && b[i] != b'[' {
                    i += 1;
                }
                debug_assert!(i > start);
                segments.push(Segment::Key(s[start..i].to_string()));
            }
        }
    }

    Ok(Path { segments })
}

/// First `]` at or after `from` that is followed by `.`, `[`, or the end.
fn find_bracket_close(b: &[u8], from: usize) -> Option<usize> {
    let mut j = from;
    while j < b.len() {
        if b[j] == b']' {
            let next = j + 1;
            if next == b.len() || b[next] == b'.' || b[next] == b'[' {
                return Some(j);
            }
        }
        j += 1;
    }
    None
}

fn parse_bracket(content: &str) -> Result<Segment, PathError> {
    if content.is_empty() {
        return Err(PathError::BadBracket {
            content: content.to_string(),
        });
    }
    if content.bytes().all(|c| c.is_ascii_digit()) {
        return content
            .parse::<usize>()
            .map(Segment::Index)
            .map_err(|_| PathError::IndexOverflow {
                content: content.to_string(),
            });
    }
    match content.split_once('=') {
        Some((key_path, value)) if !key_path.is_empty() => Ok(Segment::IdMatch {
            key_path: key_path.to_string(),
            value: value.to_string(),
        }),
        _ => Err(PathError::BadBracket {
            content: content.to_string(),
        }),
    }
}
