//! Scanner-driven parser for Mustache templates.
//!
//! The parser alternates between text mode, which collects literal output
//! up to the next open delimiter, and tag mode, which classifies a tag by
//! its sigil and updates the token tree. Block-level tags that sit alone
//! on their line are "standalone": their indentation and line break are
//! removed from the output.

use crate::ast::*;
use std::fmt;
use std::mem;
use thiserror::Error;
use whisker_scanner::{Delimiters, Position, Scanner};

/// The kinds of parse failure. All of them abort compilation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    #[error("Illegal content in tag")]
    IllegalContent,

    #[error("Unclosed tag")]
    UnclosedTag,

    #[error("Closing unopened {name:?}")]
    ClosingUnopenedSection { name: String },

    #[error("Unclosed section {name:?}")]
    UnclosedSection { name: String },

    #[error("Malformed delimiter change {content:?}")]
    DelimiterChangeMalformed { content: String },
}

/// A parse failure with the location it was detected at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    /// 1-indexed line number.
    pub line: usize,
    /// 1-indexed column number.
    pub column: usize,
    /// Text of the offending line.
    pub context: String,
}

impl ParseError {
    fn new(kind: ParseErrorKind, source: &str, pos: Position) -> Self {
        Self {
            kind,
            line: pos.line_number(),
            column: pos.column_number(),
            context: pos.line_text(source).to_string(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.kind)?;
        writeln!(f, "  Line {}", self.line)?;
        writeln!(f, "    {}", self.context)?;
        write!(f, "    {}^", " ".repeat(self.column.saturating_sub(1)))
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

/// Parser configuration.
#[derive(Debug, Clone, Default)]
pub struct ParserConfig {
    /// Delimiters in effect at the start of the template.
    pub delimiters: Delimiters,
}

/// Tag sigils recognised directly after the open delimiter.
const SIGILS: &[u8] = b"#^/=!<>&{";

/// Sigils whose tags may stand alone on a line.
const STANDALONE_SIGILS: &[u8] = b"#^/<>=!";

/// Sigils whose content is free text up to the close delimiter.
const ANY_CONTENT_SIGILS: &[u8] = b"!=";

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'?' | b'!' | b'/' | b'.' | b'-')
}

/// The character that may precede the close delimiter for a sigil.
fn closing_sigil(sigil: u8) -> u8 {
    if sigil == b'{' { b'}' } else { sigil }
}

/// A section whose close tag has not been seen yet.
struct OpenSection {
    name: String,
    inverted: bool,
    position: Position,
    body_start: usize,
    delimiters: Delimiters,
    parent: Vec<Token>,
}

/// Parser for Mustache template text.
///
/// A parser is consumed by [`Parser::parse`]; all scanning state lives on
/// the instance and never outlives a single template.
pub struct Parser<'a> {
    scanner: Scanner<'a>,
    delimiters: Delimiters,
    sections: Vec<OpenSection>,
    result: Vec<Token>,
}

impl<'a> Parser<'a> {
    /// Create a new parser for the given template.
    pub fn new(source: &'a str, config: ParserConfig) -> Self {
        Self {
            scanner: Scanner::new(source),
            delimiters: config.delimiters,
            sections: Vec::new(),
            result: Vec::new(),
        }
    }

    /// Parse the whole template into a balanced token tree.
    pub fn parse(mut self) -> Result<Token, ParseError> {
        while !self.scanner.is_eos() {
            if !self.scan_tag()? {
                self.scan_text();
            }
        }

        if let Some(open) = self.sections.pop() {
            return Err(self.error_at(
                ParseErrorKind::UnclosedSection { name: open.name },
                open.position,
            ));
        }

        Ok(Token::Sequence(self.result))
    }

    fn error_at(&self, kind: ParseErrorKind, pos: Position) -> ParseError {
        ParseError::new(kind, self.scanner.input(), pos)
    }

    fn error(&self, kind: ParseErrorKind) -> ParseError {
        self.error_at(kind, self.scanner.position())
    }

    fn push_static(&mut self, text: &str) {
        if !text.is_empty() {
            self.result.push(Token::Static(text.to_string()));
        }
    }

    // =========================================================================
    // Text Mode
    // =========================================================================

    /// Collect literal text up to the next tag.
    ///
    /// Indentation between the start of a line and a tag is left in place
    /// so the tag scanner can decide whether the tag is standalone.
    fn scan_text(&mut self) {
        let start = self.scanner.pos();
        let Some(tag_start) = self.scanner.find(&self.delimiters.open) else {
            let text = self.scanner.terminate();
            self.push_static(text);
            return;
        };

        let bytes = self.scanner.input().as_bytes();
        let mut end = tag_start;
        while end > start && matches!(bytes[end - 1], b' ' | b'\t') {
            end -= 1;
        }
        if end != 0 && bytes[end - 1] != b'\n' {
            end = tag_start;
        }

        let text = self.scanner.slice(start, end);
        self.scanner.advance_to(end);
        self.push_static(text);
    }

    // =========================================================================
    // Tag Mode
    // =========================================================================

    /// Try to scan one tag at the cursor.
    ///
    /// Returns `Ok(false)` without consuming input when no tag starts here.
    fn scan_tag(&mut self) -> Result<bool, ParseError> {
        let start_of_line = self.scanner.is_beginning_of_line();
        let state = self.scanner.save_state();

        let mut padding = self.scanner.scan_padding();
        if !self.scanner.scan_literal(&self.delimiters.open) {
            self.scanner.restore_state(state);
            return Ok(false);
        }
        let tag_start = self.scanner.pos() - self.delimiters.open.len();
        let position = self.scanner.position_at(tag_start);

        if !start_of_line {
            self.push_static(padding);
            padding = "";
        }

        let close = self.delimiters.close.clone();
        let sigil = self.scanner.scan_byte(SIGILS);
        self.scanner.skip_whitespace();

        let content = match sigil {
            Some(s) if ANY_CONTENT_SIGILS.contains(&s) => {
                self.scan_any_content(s, &close, position)?
            }
            _ => self.scanner.scan_while(is_name_byte),
        };
        if content.is_empty() {
            return Err(self.error(ParseErrorKind::IllegalContent));
        }

        self.scanner.skip_whitespace();
        if let Some(s) = sigil {
            self.scanner.scan_byte(&[closing_sigil(s)]);
        }
        if !self.scanner.scan_literal(&close) {
            return Err(self.error_at(ParseErrorKind::UnclosedTag, position));
        }

        let standalone = start_of_line
            && sigil.is_some_and(|s| STANDALONE_SIGILS.contains(&s))
            && self.scanner.rest_of_line_is_blank();
        if standalone {
            self.scanner.scan_padding();
            self.scanner.scan_newline();
        } else {
            self.push_static(padding);
        }

        match sigil {
            Some(b'#') | Some(b'^') => {
                tracing::trace!(name = content, line = position.line_number(), "open section");
                let parent = mem::take(&mut self.result);
                self.sections.push(OpenSection {
                    name: content.to_string(),
                    inverted: sigil == Some(b'^'),
                    position,
                    body_start: self.scanner.pos(),
                    delimiters: self.delimiters.clone(),
                    parent,
                });
            }
            Some(b'/') => self.close_section(content, tag_start, position)?,
            Some(b'=') => {
                let delimiters = Delimiters::parse(content).ok_or_else(|| {
                    self.error_at(
                        ParseErrorKind::DelimiterChangeMalformed {
                            content: content.to_string(),
                        },
                        position,
                    )
                })?;
                self.delimiters = delimiters.clone();
                self.result
                    .push(Token::DelimiterChange(DelimiterChange { delimiters, position }));
            }
            Some(b'!') => {
                self.result.push(Token::Comment(Comment {
                    text: content.to_string(),
                    position,
                }));
            }
            Some(b'>') | Some(b'<') => {
                let indentation = if standalone { padding } else { "" };
                self.result.push(Token::Partial(Partial {
                    name: content.to_string(),
                    indentation: indentation.to_string(),
                    position,
                }));
            }
            Some(b'{') | Some(b'&') => {
                self.result.push(Token::UnescapedTag(Tag {
                    path: Path::parse(content),
                    position,
                }));
            }
            _ => {
                self.result.push(Token::EscapedTag(Tag {
                    path: Path::parse(content),
                    position,
                }));
            }
        }

        Ok(true)
    }

    /// Scan free-form tag content, which ends at the first close delimiter.
    ///
    /// The sigil may be repeated right before the close delimiter, as in
    /// `{{=<% %>=}}`; it is not part of the content.
    fn scan_any_content(
        &mut self,
        sigil: u8,
        close: &str,
        position: Position,
    ) -> Result<&'a str, ParseError> {
        let start = self.scanner.pos();
        let Some(end) = self.scanner.find(close) else {
            return Err(self.error_at(ParseErrorKind::UnclosedTag, position));
        };
        let raw = self.scanner.slice(start, end);
        let content = raw
            .strip_suffix(char::from(sigil))
            .unwrap_or(raw)
            .trim_end();
        self.scanner.advance_to(start + content.len());
        Ok(content)
    }

    fn close_section(
        &mut self,
        name: &str,
        tag_start: usize,
        position: Position,
    ) -> Result<(), ParseError> {
        let Some(open) = self.sections.pop() else {
            return Err(self.error_at(
                ParseErrorKind::ClosingUnopenedSection {
                    name: name.to_string(),
                },
                position,
            ));
        };
        if open.name != name {
            return Err(self.error_at(
                ParseErrorKind::UnclosedSection { name: open.name },
                open.position,
            ));
        }

        tracing::trace!(name, line = position.line_number(), "close section");
        let raw = self.scanner.slice(open.body_start, tag_start).to_string();
        let body = mem::replace(&mut self.result, open.parent);
        let path = Path::parse(&open.name);

        let token = if open.inverted {
            Token::InvertedSection(Box::new(InvertedSection {
                path,
                body,
                position: open.position,
            }))
        } else {
            Token::Section(Box::new(Section {
                path,
                body,
                raw,
                delimiters: open.delimiters,
                position: open.position,
            }))
        };
        self.result.push(token);
        Ok(())
    }
}

/// Parse a template with the default `{{ }}` delimiters.
pub fn parse(source: &str) -> Result<Token, ParseError> {
    Parser::new(source, ParserConfig::default()).parse()
}

/// Parse a template starting from the given delimiters.
pub fn parse_with_delimiters(source: &str, delimiters: Delimiters) -> Result<Token, ParseError> {
    Parser::new(source, ParserConfig { delimiters }).parse()
}
