//! Whisker bytecode - render operation definitions for the Whisker VM.
//!
//! A compiled template is a [`Code`] block: a flat `u16` instruction
//! stream plus the constant, name and section tables its operands index.

pub mod code;
pub mod opcode;

pub use code::{Code, CodeBuilder, SectionInfo, SourceLocation};
pub use opcode::Op;
