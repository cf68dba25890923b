//! Whisker scanner - byte cursor over Mustache template text.
//!
//! This crate provides the low-level scanning primitives the parser is
//! built on: a position-tracking cursor, source positions for diagnostics,
//! and the tag delimiter pair.
//!
//! # Example
//!
//! ```
//! use whisker_scanner::{Delimiters, Scanner};
//!
//! let delimiters = Delimiters::default();
//! let mut scanner = Scanner::new("Hello {{name}}");
//! let text = scanner.scan_until(&delimiters.open).unwrap();
//! assert_eq!(text, "Hello ");
//! assert!(scanner.scan_literal("{{"));
//! ```

pub mod delimiters;
pub mod position;
pub mod scanner;

pub use delimiters::Delimiters;
pub use position::Position;
pub use scanner::{Scanner, ScannerState};
