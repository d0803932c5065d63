use std::{fmt, iter::Peekable, str::Chars, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Address of a function inside a nested function tree.
///
/// Paths are written with dots (`nestedObject.nested`). Bracket segments
/// (`a[b]`, `a["b.c"]`, `a['b']`) are also accepted so that names containing
/// separators stay addressable. Rendering quotes such names, so a rendered
/// path always parses back to the same segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CallPath(Vec<String>);

impl CallPath {
    /// A single-segment path
    pub fn root(name: impl Into<String>) -> Self {
        Self(vec![name.into()])
    }

    /// Builds a path from its segments, `None` when there are none
    pub fn from_segments<I, S>(segments: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        (!segments.is_empty()).then_some(Self(segments))
    }

    /// This path extended by one segment
    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(name.into());
        Self(segments)
    }

    /// Path segments, outermost first
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// The last segment, i.e. the function name
    pub fn name(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or_default()
    }

    /// Parses a dot/bracket path
    pub fn parse(input: &str) -> Result<Self> {
        #[derive(Clone, Copy)]
        enum Prev {
            Start,
            Dot,
            Name,
            Bracket,
        }

        let invalid = |reason| Error::InvalidPath {
            path: input.to_string(),
            reason,
        };

        let mut segments = Vec::new();
        let mut current = String::new();
        let mut prev = Prev::Start;
        let mut chars = input.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '.' => {
                    match prev {
                        Prev::Name => segments.push(std::mem::take(&mut current)),
                        Prev::Bracket => {}
                        Prev::Start | Prev::Dot => return Err(invalid("empty segment")),
                    }
                    prev = Prev::Dot;
                }
                '[' => {
                    match prev {
                        Prev::Name => segments.push(std::mem::take(&mut current)),
                        Prev::Dot => return Err(invalid("empty segment")),
                        Prev::Start | Prev::Bracket => {}
                    }
                    segments.push(bracket_segment(&mut chars).map_err(invalid)?);
                    prev = Prev::Bracket;
                }
                ']' => return Err(invalid("unexpected `]`")),
                c => {
                    if let Prev::Bracket = prev {
                        return Err(invalid("expected `.` or `[` after `]`"));
                    }
                    current.push(c);
                    prev = Prev::Name;
                }
            }
        }

        match prev {
            Prev::Name => segments.push(current),
            Prev::Bracket => {}
            Prev::Start => return Err(invalid("empty path")),
            Prev::Dot => return Err(invalid("trailing `.`")),
        }

        Ok(Self(segments))
    }
}

// Reads the inside of `[...]`, the opening bracket already consumed
fn bracket_segment(chars: &mut Peekable<Chars<'_>>) -> Result<String, &'static str> {
    let mut segment = String::new();

    match chars.peek().copied() {
        Some(quote @ ('"' | '\'')) => {
            chars.next();
            loop {
                match chars.next() {
                    Some('\\') => match chars.next() {
                        Some(escaped) => segment.push(escaped),
                        None => return Err("unterminated string"),
                    },
                    Some(c) if c == quote => break,
                    Some(c) => segment.push(c),
                    None => return Err("unterminated string"),
                }
            }
            match chars.next() {
                Some(']') => Ok(segment),
                _ => Err("expected `]` after quoted segment"),
            }
        }
        _ => {
            loop {
                match chars.next() {
                    Some(']') => break,
                    Some('[') => return Err("nested `[`"),
                    Some(c) => segment.push(c),
                    None => return Err("unterminated `[`"),
                }
            }
            if segment.is_empty() {
                Err("empty segment")
            } else {
                Ok(segment)
            }
        }
    }
}

fn needs_quoting(segment: &str) -> bool {
    segment.is_empty()
        || segment
            .chars()
            .any(|c| matches!(c, '.' | '[' | ']' | '"' | '\'' | '\\'))
}

impl fmt::Display for CallPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if needs_quoting(segment) {
                f.write_str("[\"")?;
                for c in segment.chars() {
                    if matches!(c, '"' | '\\') {
                        f.write_str("\\")?;
                    }
                    write!(f, "{c}")?;
                }
                f.write_str("\"]")?;
            } else {
                if i > 0 {
                    f.write_str(".")?;
                }
                f.write_str(segment)?;
            }
        }
        Ok(())
    }
}

impl FromStr for CallPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CallPath {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<CallPath> for String {
    fn from(path: CallPath) -> Self {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segments(input: &str) -> Vec<String> {
        CallPath::parse(input).unwrap().segments().to_vec()
    }

    #[test]
    fn test_dotted_paths() {
        assert_eq!(segments("syncCall"), ["syncCall"]);
        assert_eq!(segments("nestedObject.nested"), ["nestedObject", "nested"]);
        assert_eq!(segments("a.b.c"), ["a", "b", "c"]);
    }

    #[test]
    fn test_bracket_paths() {
        assert_eq!(segments("a[b]"), ["a", "b"]);
        assert_eq!(segments("a[\"b.c\"].d"), ["a", "b.c", "d"]);
        assert_eq!(segments("a['b'][c]"), ["a", "b", "c"]);
        assert_eq!(segments("[\"\"]"), [""]);
        assert_eq!(segments(r#"a["q\"uote"]"#), ["a", "q\"uote"]);
    }

    #[test]
    fn test_invalid_paths() {
        for input in ["", ".", "a.", ".a", "a..b", "a[", "a[]", "a[b]c", "a]", "a.[b]", "a[\"b]"] {
            let err = CallPath::parse(input).unwrap_err();
            assert!(
                matches!(err, Error::InvalidPath { ref path, .. } if path == input),
                "{input:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_display_quotes_awkward_segments() {
        let path = CallPath::root("api").child("v1.2").child("get");
        assert_eq!(path.to_string(), "api[\"v1.2\"].get");
        assert_eq!(CallPath::parse(&path.to_string()).unwrap(), path);

        let path = CallPath::from_segments(["", "back\\slash", "x"]).unwrap();
        assert_eq!(CallPath::parse(&path.to_string()).unwrap(), path);
    }

    #[test]
    fn test_serde_as_string() {
        let path: CallPath = serde_json::from_str("\"nestedObject.nested\"").unwrap();
        assert_eq!(path.name(), "nested");
        assert_eq!(
            serde_json::to_string(&path).unwrap(),
            "\"nestedObject.nested\""
        );
        assert!(serde_json::from_str::<CallPath>("\"a..b\"").is_err());
    }
}
