//! Element paths: dot-separated idShort keys with bracketed list indices.
//!
//! `a.b[2].c` addresses key `a`, then key `b`, then position 2 of the List
//! `b`, then key `c`. A path may start with an index (`[0].x`) when the root
//! is ordered.

use std::fmt;
use std::str::FromStr;

use crate::error::PathError;
use crate::limits::MAX_PATH_SEGMENTS;

/// One step of a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// A parsed element path. The empty path addresses the root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ElementPath {
    segments: Vec<PathSegment>,
}

impl ElementPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn from_segments(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn push(&mut self, segment: PathSegment) {
        self.segments.push(segment);
    }

    /// Returns a new path with `segment` appended.
    pub fn join(&self, segment: PathSegment) -> Self {
        let mut out = self.clone();
        out.push(segment);
        out
    }

    /// Splits off the last segment.
    pub fn split_last(&self) -> Option<(ElementPath, &PathSegment)> {
        let (last, rest) = self.segments.split_last()?;
        Some((ElementPath::from_segments(rest.to_vec()), last))
    }

    /// Parses a path. The empty string is rejected; use [`ElementPath::root`].
    pub fn parse(text: &str) -> Result<Self, PathError> {
        if text.is_empty() {
            return Err(PathError::Empty);
        }
        let bytes = text.as_bytes();
        let len = bytes.len();
        let mut segments = Vec::new();
        let mut i = 0;

        loop {
            let start = i;
            while i < len && !matches!(bytes[i], b'.' | b'[' | b']') {
                i += 1;
            }
            if i > start {
                segments.push(PathSegment::Key(text[start..i].to_string()));
            } else if !(segments.is_empty() && i < len && bytes[i] == b'[') {
                return Err(PathError::EmptySegment { offset: start });
            }

            while i < len && bytes[i] == b'[' {
                let open = i;
                let close = text[open..]
                    .find(']')
                    .map(|rel| open + rel)
                    .ok_or(PathError::UnclosedBracket { offset: open })?;
                let token = &text[open + 1..close];
                if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(PathError::InvalidIndex {
                        token: token.to_string(),
                        offset: open + 1,
                    });
                }
                let index = token.parse().map_err(|_| PathError::InvalidIndex {
                    token: token.to_string(),
                    offset: open + 1,
                })?;
                segments.push(PathSegment::Index(index));
                i = close + 1;
            }

            if segments.len() > MAX_PATH_SEGMENTS {
                return Err(PathError::TooManySegments {
                    max: MAX_PATH_SEGMENTS,
                });
            }
            if i == len {
                break;
            }
            if bytes[i] != b'.' {
                let ch = text[i..].chars().next().unwrap_or_default();
                return Err(PathError::UnexpectedCharacter { ch, offset: i });
            }
            i += 1;
        }

        Ok(Self { segments })
    }
}

impl FromStr for ElementPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ElementPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Key(key) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(key)?;
                }
                PathSegment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(k: &str) -> PathSegment {
        PathSegment::Key(k.to_string())
    }

    #[test]
    fn test_parse_mixed_path() {
        let p = ElementPath::parse("a.b[2].c").unwrap();
        assert_eq!(
            p.segments(),
            &[key("a"), key("b"), PathSegment::Index(2), key("c")]
        );
        assert_eq!(p.to_string(), "a.b[2].c");
    }

    #[test]
    fn test_parse_nested_indices_and_leading_index() {
        let p = ElementPath::parse("Matrix[1][0]").unwrap();
        assert_eq!(
            p.segments(),
            &[key("Matrix"), PathSegment::Index(1), PathSegment::Index(0)]
        );
        let p = ElementPath::parse("[0].x").unwrap();
        assert_eq!(p.segments(), &[PathSegment::Index(0), key("x")]);
        assert_eq!(p.to_string(), "[0].x");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(ElementPath::parse(""), Err(PathError::Empty));
        assert_eq!(
            ElementPath::parse(".a"),
            Err(PathError::EmptySegment { offset: 0 })
        );
        assert_eq!(
            ElementPath::parse("a..b"),
            Err(PathError::EmptySegment { offset: 2 })
        );
        assert_eq!(
            ElementPath::parse("a."),
            Err(PathError::EmptySegment { offset: 2 })
        );
        assert_eq!(
            ElementPath::parse("a[1"),
            Err(PathError::UnclosedBracket { offset: 1 })
        );
        assert!(matches!(
            ElementPath::parse("a[x]"),
            Err(PathError::InvalidIndex { .. })
        ));
        assert!(matches!(
            ElementPath::parse("a[-1]"),
            Err(PathError::InvalidIndex { .. })
        ));
        assert_eq!(
            ElementPath::parse("a[0]b"),
            Err(PathError::UnexpectedCharacter { ch: 'b', offset: 4 })
        );
        assert_eq!(
            ElementPath::parse("a]"),
            Err(PathError::UnexpectedCharacter { ch: ']', offset: 1 })
        );
        assert!(matches!(
            ElementPath::parse("a.[0]"),
            Err(PathError::EmptySegment { .. })
        ));
    }

    #[test]
    fn test_segment_limit() {
        let long = vec!["a"; MAX_PATH_SEGMENTS + 1].join(".");
        assert_eq!(
            ElementPath::parse(&long),
            Err(PathError::TooManySegments {
                max: MAX_PATH_SEGMENTS
            })
        );
    }

    #[test]
    fn test_split_last() {
        let p = ElementPath::parse("a.b[3]").unwrap();
        let (parent, last) = p.split_last().unwrap();
        assert_eq!(parent.to_string(), "a.b");
        assert_eq!(last, &PathSegment::Index(3));
        assert!(ElementPath::root().split_last().is_none());
    }
}
