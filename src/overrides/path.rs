//! Override path syntax: dot-separated segments, all-digit segments are
//! sequence indices.

use std::fmt;
use std::str::FromStr;

/// One step of an override path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    /// All-digit segment. `raw` keeps the original text for use as a
    /// mapping key when the container turns out to be a mapping.
    Index { position: usize, raw: String },
}

impl Segment {
    /// The segment as written
    pub fn as_str(&self) -> &str {
        match self {
            Segment::Key(k) => k,
            Segment::Index { raw, .. } => raw,
        }
    }
}

/// Parsed override path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverridePath {
    raw: String,
    segments: Vec<Segment>,
}

/// Errors parsing an override path
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathParseError {
    #[error("override path is empty")]
    Empty,

    #[error("empty segment at position {0}")]
    EmptySegment(usize),

    #[error("index segment '{0}' is too large")]
    IndexTooLarge(String),
}

impl OverridePath {
    /// Segments in walk order
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The path as written
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Text of the first `n` segments, for error messages
    pub fn prefix(&self, n: usize) -> String {
        self.segments[..n.min(self.segments.len())]
            .iter()
            .map(Segment::as_str)
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl FromStr for OverridePath {
    type Err = PathParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(PathParseError::Empty);
        }

        let mut segments = Vec::new();
        for (i, part) in s.split('.').enumerate() {
            if part.is_empty() {
                return Err(PathParseError::EmptySegment(i));
            }
            if part.bytes().all(|b| b.is_ascii_digit()) {
                let position = part
                    .parse::<usize>()
                    .map_err(|_| PathParseError::IndexTooLarge(part.to_string()))?;
                segments.push(Segment::Index {
                    position,
                    raw: part.to_string(),
                });
            } else {
                segments.push(Segment::Key(part.to_string()));
            }
        }

        Ok(Self {
            raw: s.to_string(),
            segments,
        })
    }
}

impl fmt::Display for OverridePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}
