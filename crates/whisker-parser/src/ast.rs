//! Token tree produced by the Whisker parser.

use std::fmt;
use whisker_scanner::{Delimiters, Position};

/// A dotted name such as `user.address.city`.
///
/// The implicit iterator `{{.}}` is a path with no segments and resolves
/// to the top context frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Path {
    pub segments: Vec<String>,
}

impl Path {
    /// Split tag content on `.`, dropping trailing empty segments.
    pub fn parse(content: &str) -> Self {
        let mut segments: Vec<String> = content.split('.').map(str::to_string).collect();
        while segments.last().is_some_and(|s| s.is_empty()) {
            segments.pop();
        }
        Self { segments }
    }

    /// Check if this is the implicit iterator `.`.
    pub fn is_implicit(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_implicit() {
            write!(f, ".")
        } else {
            write!(f, "{}", self.segments.join("."))
        }
    }
}

/// Token tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Ordered children; the root and every section body.
    Sequence(Vec<Token>),
    /// Literal output.
    Static(String),
    /// `{{name}}`
    EscapedTag(Tag),
    /// `{{{name}}}` or `{{&name}}`
    UnescapedTag(Tag),
    /// `{{#name}}...{{/name}}`
    Section(Box<Section>),
    /// `{{^name}}...{{/name}}`
    InvertedSection(Box<InvertedSection>),
    /// `{{>name}}` or `{{<name}}`
    Partial(Partial),
    /// `{{! text }}`
    Comment(Comment),
    /// `{{=<% %>=}}`
    DelimiterChange(DelimiterChange),
}

impl Token {
    /// Source position of the tag that produced this token, if any.
    pub fn position(&self) -> Option<Position> {
        match self {
            Token::Sequence(_) | Token::Static(_) => None,
            Token::EscapedTag(t) | Token::UnescapedTag(t) => Some(t.position),
            Token::Section(s) => Some(s.position),
            Token::InvertedSection(s) => Some(s.position),
            Token::Partial(p) => Some(p.position),
            Token::Comment(c) => Some(c.position),
            Token::DelimiterChange(d) => Some(d.position),
        }
    }

    /// Children of a sequence; empty for every other token.
    pub fn children(&self) -> &[Token] {
        match self {
            Token::Sequence(children) => children,
            _ => &[],
        }
    }
}

/// A value substitution tag.
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub path: Path,
    pub position: Position,
}

/// A section block.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub path: Path,
    pub body: Vec<Token>,
    /// Unparsed source of the body, handed to lambdas.
    pub raw: String,
    /// Delimiters in effect where the body starts.
    pub delimiters: Delimiters,
    pub position: Position,
}

/// An inverted section block.
#[derive(Debug, Clone, PartialEq)]
pub struct InvertedSection {
    pub path: Path,
    pub body: Vec<Token>,
    pub position: Position,
}

/// A partial reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Partial {
    pub name: String,
    /// Whitespace preceding a standalone partial tag.
    pub indentation: String,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub text: String,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DelimiterChange {
    pub delimiters: Delimiters,
    pub position: Position,
}

fn write_body(f: &mut fmt::Formatter<'_>, body: &[Token]) -> fmt::Result {
    for token in body {
        write!(f, " {}", token)?;
    }
    Ok(())
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Sequence(children) => {
                write!(f, "(multi")?;
                write_body(f, children)?;
                write!(f, ")")
            }
            Token::Static(text) => write!(f, "(static {:?})", text),
            Token::EscapedTag(t) => write!(f, "(etag {})", t.path),
            Token::UnescapedTag(t) => write!(f, "(utag {})", t.path),
            Token::Section(s) => {
                write!(f, "(section {}", s.path)?;
                write_body(f, &s.body)?;
                write!(f, ")")
            }
            Token::InvertedSection(s) => {
                write!(f, "(inverted {}", s.path)?;
                write_body(f, &s.body)?;
                write!(f, ")")
            }
            Token::Partial(p) => write!(f, "(partial {} {:?})", p.name, p.indentation),
            Token::Comment(_) => write!(f, "(comment)"),
            Token::DelimiterChange(d) => write!(f, "(delimiters {})", d.delimiters),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_parse() {
        assert_eq!(Path::parse("a.b.c").segments, vec!["a", "b", "c"]);
        assert_eq!(Path::parse("name").segments, vec!["name"]);
        assert!(Path::parse(".").is_implicit());
        assert_eq!(Path::parse("a.").segments, vec!["a"]);
        assert_eq!(Path::parse(".a").segments, vec!["", "a"]);
    }

    #[test]
    fn test_path_display() {
        assert_eq!(Path::parse("a.b").to_string(), "a.b");
        assert_eq!(Path::parse(".").to_string(), ".");
    }

    #[test]
    fn test_token_display() {
        let token = Token::Sequence(vec![
            Token::Static("Hi ".to_string()),
            Token::EscapedTag(Tag {
                path: Path::parse("name"),
                position: Position::default(),
            }),
        ]);
        assert_eq!(token.to_string(), r#"(multi (static "Hi ") (etag name))"#);
    }
}
