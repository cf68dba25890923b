//! Tag delimiter pair.

use std::fmt;

/// The open/close strings that surround a tag, `{{` and `}}` by default.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Delimiters {
    pub open: String,
    pub close: String,
}

impl Delimiters {
    /// Create a delimiter pair.
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
        }
    }

    /// Parse the body of a `{{=<% %>=}}` tag.
    ///
    /// The content must split into exactly two whitespace separated words.
    pub fn parse(content: &str) -> Option<Self> {
        let mut words = content.split_whitespace();
        let open = words.next()?;
        let close = words.next()?;
        if words.next().is_some() {
            return None;
        }
        Some(Self::new(open, close))
    }
}

impl Default for Delimiters {
    fn default() -> Self {
        Self::new("{{", "}}")
    }
}

impl fmt::Display for Delimiters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.open, self.close)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let d = Delimiters::default();
        assert_eq!(d.open, "{{");
        assert_eq!(d.close, "}}");
    }

    #[test]
    fn test_parse() {
        assert_eq!(Delimiters::parse("<% %>"), Some(Delimiters::new("<%", "%>")));
        assert_eq!(Delimiters::parse("  | |  "), Some(Delimiters::new("|", "|")));
        assert_eq!(Delimiters::parse("<%"), None);
        assert_eq!(Delimiters::parse("a b c"), None);
        assert_eq!(Delimiters::parse(""), None);
    }
}
