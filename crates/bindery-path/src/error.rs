#![forbid(unsafe_code)]

//! Errors produced by path parsing and writes.

/// Errors from parsing or writing through a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// A write was attempted at the root (empty) path.
    EmptyWritePath,
    /// A `[` had no matching `]`.
    UnterminatedBracket { at: usize },
    /// A dotted segment was empty (`a..b`, leading or trailing `.`).
    EmptySegment { at: usize },
    /// Bracket contents were neither an index nor a `keyPath=value` pair.
    BadBracket { content: String },
    /// A numeric segment did not fit in `usize`.
    IndexOverflow { content: String },
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyWritePath => write!(f, "cannot write at the root path"),
            Self::UnterminatedBracket { at } => {
                write!(f, "unterminated '[' at byte {at}")
            }
            Self::EmptySegment { at } => write!(f, "empty path segment at byte {at}"),
            Self::BadBracket { content } => {
                write!(f, "bracket segment '[{content}]' is neither an index nor keyPath=value")
            }
            Self::IndexOverflow { content } => {
                write!(f, "index segment '[{content}]' is out of range")
            }
        }
    }
}

impl std::error::Error for PathError {}
