//! Splits a source file into its YAML frontmatter and markdown body, and
//! provides typed accessors over the untyped frontmatter mapping. Every
//! content file must begin with a line that is exactly `---`; the next
//! standalone `---` line closes the header. The text between the fences is
//! decoded as a string-keyed YAML mapping.

use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::convert::TryFrom;
use std::fmt;

const FENCE: &str = "---";

/// An untyped frontmatter mapping with typed accessors. Unknown keys are
/// preserved so callers can pick out whatever they recognize.
#[derive(Debug, Clone, Default)]
pub struct Frontmatter(Mapping);

/// Splits `input` into a [`Frontmatter`] and the markdown body that follows
/// the closing fence. The body has the newline terminating the closing fence
/// stripped; everything else is preserved verbatim.
pub fn split(input: &str) -> Result<(Frontmatter, &str)> {
    let first_line_end = input.find('\n').unwrap_or_else(|| input.len());
    if !is_fence(&input[..first_line_end]) {
        return Err(Error::MissingOpeningDelimiter);
    }

    let yaml_start = (first_line_end + 1).min(input.len());
    let mut pos = yaml_start;
    while pos < input.len() {
        let line_end = match input[pos..].find('\n') {
            Some(offset) => pos + offset,
            None => input.len(),
        };
        if is_fence(&input[pos..line_end]) {
            let yaml = &input[yaml_start..pos];
            let body_start = (line_end + 1).min(input.len());
            let mapping = if yaml.trim().is_empty() {
                Mapping::new()
            } else {
                serde_yaml::from_str(yaml)?
            };
            return Ok((Frontmatter(mapping), &input[body_start..]));
        }
        pos = line_end + 1;
    }
    Err(Error::MissingClosingDelimiter)
}

// A fence line is exactly `---`, tolerating a trailing carriage return from
// CRLF sources.
fn is_fence(line: &str) -> bool {
    line.trim_end_matches('\r') == FENCE
}

impl Frontmatter {
    /// Returns the raw value for `key`, if present.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(&Value::String(key.to_owned()))
    }

    /// Returns the string value for `key`, if present and a string.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer value for `key`. Accepts signed and unsigned YAML
    /// integers as well as floats with a zero fractional part, which YAML
    /// emitters in the wild produce for whole numbers.
    pub fn int_field(&self, key: &str) -> Option<i64> {
        let n = match self.get(key)? {
            Value::Number(n) => n,
            _ => return None,
        };
        if let Some(i) = n.as_i64() {
            return Some(i);
        }
        if let Some(u) = n.as_u64() {
            return i64::try_from(u).ok();
        }
        match n.as_f64() {
            Some(f) if f.fract() == 0.0 => Some(f as i64),
            _ => None,
        }
    }

    /// Returns the float value for `key`, if present and numeric.
    pub fn float_field(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    /// Returns the list-of-string value for `key`. Entries that aren't
    /// strings are dropped; an absent or non-sequence value yields an empty
    /// list.
    pub fn string_list(&self, key: &str) -> Vec<String> {
        match self.get(key) {
            Some(Value::Sequence(seq)) => seq
                .iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s.clone()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Returns the map-of-string value for `key`, if present and a mapping
    /// with string keys and values.
    pub fn string_map(&self, key: &str) -> Option<BTreeMap<String, String>> {
        match self.get(key)? {
            Value::Mapping(m) => {
                let mut out = BTreeMap::new();
                for (k, v) in m.iter() {
                    match (k, v) {
                        (Value::String(k), Value::String(v)) => {
                            out.insert(k.clone(), v.clone());
                        }
                        _ => return None,
                    }
                }
                Some(out)
            }
            _ => None,
        }
    }
}

/// The result of a frontmatter-splitting operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error splitting or decoding frontmatter.
#[derive(Debug)]
pub enum Error {
    /// Returned when a source file doesn't begin with a `---` line.
    MissingOpeningDelimiter,

    /// Returned when the opening `---` line was found but no closing `---`
    /// line follows it.
    MissingClosingDelimiter,

    /// Returned when the header text between the fences isn't a valid YAML
    /// mapping.
    Decode(serde_yaml::Error),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::MissingOpeningDelimiter => {
                write!(f, "file must begin with a `---` line")
            }
            Error::MissingClosingDelimiter => {
                write!(f, "missing closing `---` line")
            }
            Error::Decode(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::MissingOpeningDelimiter => None,
            Error::MissingClosingDelimiter => None,
            Error::Decode(err) => Some(err),
        }
    }
}

impl From<serde_yaml::Error> for Error {
    /// Converts a [`serde_yaml::Error`] into an [`Error`]. It allows us to
    /// use the `?` operator for YAML deserialization.
    fn from(err: serde_yaml::Error) -> Error {
        Error::Decode(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_basic() -> Result<()> {
        let (fm, body) = split("---\ntitle: Hello\n---\n# Body\n")?;
        assert_eq!(fm.str_field("title"), Some("Hello"));
        assert_eq!(body, "# Body\n");
        Ok(())
    }

    #[test]
    fn test_split_strips_one_leading_newline_only() -> Result<()> {
        let (_, body) = split("---\ntitle: x\n---\n\nBody")?;
        assert_eq!(body, "\nBody");
        Ok(())
    }

    #[test]
    fn test_split_missing_opening() {
        match split("title: Hello\n---\n") {
            Err(Error::MissingOpeningDelimiter) => (),
            other => panic!("wanted MissingOpeningDelimiter; found {:?}", other),
        }
    }

    #[test]
    fn test_split_missing_closing() {
        match split("---\ntitle: Hello\n") {
            Err(Error::MissingClosingDelimiter) => (),
            other => panic!("wanted MissingClosingDelimiter; found {:?}", other),
        }
    }

    #[test]
    fn test_split_fence_must_be_standalone_line() {
        // A line that merely starts with `---` doesn't close the header.
        match split("---\ntitle: Hello\n--- not a fence\n") {
            Err(Error::MissingClosingDelimiter) => (),
            other => panic!("wanted MissingClosingDelimiter; found {:?}", other),
        }
    }

    #[test]
    fn test_split_crlf() -> Result<()> {
        let (fm, body) = split("---\r\ntitle: Hello\r\n---\r\nBody\r\n")?;
        assert_eq!(fm.str_field("title"), Some("Hello"));
        assert_eq!(body, "Body\r\n");
        Ok(())
    }

    #[test]
    fn test_split_empty_header() -> Result<()> {
        let (fm, body) = split("---\n---\nBody")?;
        assert_eq!(fm.str_field("title"), None);
        assert_eq!(body, "Body");
        Ok(())
    }

    #[test]
    fn test_split_decode_error() {
        match split("---\n: : :\n---\n") {
            Err(Error::Decode(_)) => (),
            other => panic!("wanted Decode; found {:?}", other),
        }
    }

    #[test]
    fn test_int_field_coercions() -> Result<()> {
        let (fm, _) = split("---\na: 3\nb: 3.0\nc: 3.5\nd: 18446744073709551615\ne: foo\n---\n")?;
        assert_eq!(fm.int_field("a"), Some(3));
        assert_eq!(fm.int_field("b"), Some(3));
        assert_eq!(fm.int_field("c"), None);
        assert_eq!(fm.int_field("d"), None); // exceeds i64
        assert_eq!(fm.int_field("e"), None);
        assert_eq!(fm.int_field("missing"), None);
        Ok(())
    }

    #[test]
    fn test_string_list() -> Result<()> {
        let (fm, _) = split("---\ntags: [a, b]\nmixed: [a, 3]\nscalar: a\n---\n")?;
        assert_eq!(fm.string_list("tags"), vec!["a", "b"]);
        assert_eq!(fm.string_list("mixed"), vec!["a"]);
        assert!(fm.string_list("scalar").is_empty());
        assert!(fm.string_list("missing").is_empty());
        Ok(())
    }

    #[test]
    fn test_string_map() -> Result<()> {
        let (fm, _) = split("---\nlinks:\n  docs: https://example.org\n---\n")?;
        let links = fm.string_map("links").unwrap();
        assert_eq!(links.get("docs").map(String::as_str), Some("https://example.org"));
        assert_eq!(fm.string_map("missing"), None);
        Ok(())
    }
}
