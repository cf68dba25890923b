//! Whisker parser - token tree construction for Mustache templates.
//!
//! This crate turns template text into a balanced [`Token`] tree, or fails
//! with a [`ParseError`] that carries the line, column and source line of
//! the problem.
//!
//! # Example
//!
//! ```
//! use whisker_parser::{parse, Token};
//!
//! let tree = parse("Hello {{name}}!").unwrap();
//! assert_eq!(tree.children().len(), 3);
//! assert!(matches!(tree.children()[1], Token::EscapedTag(_)));
//! ```

pub mod ast;
pub mod parser;

pub use ast::*;
pub use parser::{parse, parse_with_delimiters, ParseError, ParseErrorKind, Parser, ParserConfig};
