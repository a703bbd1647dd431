//! JSON Pointer (RFC 6901).
//!
//! `""` is the whole document; `/a/b` walks object members or array indices.
//! `~1` decodes to `/` and `~0` to `~`. The token `-` names the slot past
//! the end of an array and is only meaningful as an `add` target.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::PointerError;

/// Token naming the append position of an array.
pub const APPEND_TOKEN: &str = "-";

/// A parsed JSON Pointer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Pointer {
    tokens: Vec<String>,
}

impl Pointer {
    /// The pointer to the whole document.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn parse(s: &str) -> Result<Self, PointerError> {
        if s.is_empty() {
            return Ok(Self::root());
        }
        let Some(rest) = s.strip_prefix('/') else {
            return Err(PointerError::MissingLeadingSlash(s.to_string()));
        };
        let tokens = rest
            .split('/')
            .map(|raw| unescape(raw).ok_or_else(|| PointerError::InvalidEscape(s.to_string())))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { tokens })
    }

    /// Build a pointer from already-decoded tokens.
    pub fn from_tokens<I, T>(tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }

    /// Decoded reference tokens.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn is_root(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Split into parent tokens and the final token. `None` for the root.
    pub fn split_last(&self) -> Option<(&[String], &str)> {
        self.tokens
            .split_last()
            .map(|(last, parent)| (parent, last.as_str()))
    }

    /// Append a token.
    pub fn push(&mut self, token: impl Into<String>) {
        self.tokens.push(token.into());
    }

    /// True if `other` lies strictly below this pointer.
    pub fn is_proper_prefix_of(&self, other: &Pointer) -> bool {
        self.tokens.len() < other.tokens.len() && other.tokens.starts_with(&self.tokens)
    }

    /// Look up the value this pointer names.
    pub fn resolve<'v>(&self, document: &'v Value) -> Option<&'v Value> {
        walk(document, &self.tokens)
    }

    pub fn resolve_mut<'v>(&self, document: &'v mut Value) -> Option<&'v mut Value> {
        walk_mut(document, &self.tokens)
    }
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in &self.tokens {
            f.write_str("/")?;
            f.write_str(&token.replace('~', "~0").replace('/', "~1"))?;
        }
        Ok(())
    }
}

impl FromStr for Pointer {
    type Err = PointerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Parse an array index token: decimal, no sign, no leading zeros.
pub fn parse_index(token: &str) -> Option<usize> {
    let valid = !token.is_empty()
        && token.bytes().all(|b| b.is_ascii_digit())
        && (token == "0" || !token.starts_with('0'));
    if valid { token.parse().ok() } else { None }
}

pub(crate) fn walk<'v>(mut value: &'v Value, tokens: &[String]) -> Option<&'v Value> {
    for token in tokens {
        value = match value {
            Value::Object(map) => map.get(token)?,
            Value::Array(items) => items.get(parse_index(token)?)?,
            _ => return None,
        };
    }
    Some(value)
}

pub(crate) fn walk_mut<'v>(value: &'v mut Value, tokens: &[String]) -> Option<&'v mut Value> {
    tokens.iter().try_fold(value, |target, token| match target {
        Value::Object(map) => map.get_mut(token),
        Value::Array(items) => parse_index(token).and_then(move |i| items.get_mut(i)),
        _ => None,
    })
}

fn unescape(raw: &str) -> Option<String> {
    if !raw.contains('~') {
        return Some(raw.to_string());
    }
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '~' {
            match chars.next() {
                Some('0') => out.push('~'),
                Some('1') => out.push('/'),
                _ => return None,
            }
        } else {
            out.push(c);
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_root_and_tokens() {
        assert!(Pointer::parse("").unwrap().is_root());
        let p = Pointer::parse("/documents/42/title").unwrap();
        assert_eq!(p.tokens(), &["documents", "42", "title"]);
        // "/" is a single empty-string member, not the root.
        assert_eq!(Pointer::parse("/").unwrap().tokens(), &[""]);
    }

    #[test]
    fn test_escapes() {
        let p = Pointer::parse("/a~1b/m~0n").unwrap();
        assert_eq!(p.tokens(), &["a/b", "m~n"]);
        assert_eq!(p.to_string(), "/a~1b/m~0n");
        assert_eq!(
            Pointer::parse("/bad~2").unwrap_err(),
            PointerError::InvalidEscape("/bad~2".into())
        );
        assert_eq!(
            Pointer::parse("/trailing~").unwrap_err(),
            PointerError::InvalidEscape("/trailing~".into())
        );
    }

    #[test]
    fn test_missing_slash() {
        assert_eq!(
            Pointer::parse("a/b").unwrap_err(),
            PointerError::MissingLeadingSlash("a/b".into())
        );
    }

    #[test]
    fn test_resolve() {
        let doc = json!({"a": {"b": [10, 20, {"c": true}]}, "": 1});
        assert_eq!(Pointer::parse("/a/b/1").unwrap().resolve(&doc), Some(&json!(20)));
        assert_eq!(Pointer::parse("/a/b/2/c").unwrap().resolve(&doc), Some(&json!(true)));
        assert_eq!(Pointer::parse("/").unwrap().resolve(&doc), Some(&json!(1)));
        assert_eq!(Pointer::parse("").unwrap().resolve(&doc), Some(&doc));
        assert_eq!(Pointer::parse("/a/b/3").unwrap().resolve(&doc), None);
        assert_eq!(Pointer::parse("/a/b/-").unwrap().resolve(&doc), None);
        assert_eq!(Pointer::parse("/a/b/01").unwrap().resolve(&doc), None);
        assert_eq!(Pointer::parse("/a/x").unwrap().resolve(&doc), None);
    }

    #[test]
    fn test_parse_index() {
        assert_eq!(parse_index("0"), Some(0));
        assert_eq!(parse_index("17"), Some(17));
        assert_eq!(parse_index("007"), None);
        assert_eq!(parse_index("-"), None);
        assert_eq!(parse_index("+1"), None);
        assert_eq!(parse_index(""), None);
    }

    #[test]
    fn test_prefix() {
        let a = Pointer::parse("/a").unwrap();
        let ab = Pointer::parse("/a/b").unwrap();
        assert!(a.is_proper_prefix_of(&ab));
        assert!(!ab.is_proper_prefix_of(&a));
        assert!(!a.is_proper_prefix_of(&a));
        assert!(Pointer::root().is_proper_prefix_of(&a));
    }
}
