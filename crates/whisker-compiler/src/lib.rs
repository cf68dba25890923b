//! Whisker compiler - token tree to render code compilation.
//!
//! This crate provides the generator, which converts the parser's token
//! tree into the instruction stream executed by the Whisker VM.

pub mod compiler;

pub use compiler::{compile, compile_with_delimiters, generate, Compiler, CompilerConfig, CompilerError};
