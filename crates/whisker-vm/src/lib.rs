//! Whisker VM - render code execution for Whisker templates.
//!
//! This crate provides the context runtime (frames, lookups, section
//! semantics) and the virtual machine that executes compiled templates.

pub mod buffer;
pub mod context;
pub mod frame;
pub mod value;
pub mod vm;

pub use buffer::{escape_html, EscapeMode, OutputBuffer};
pub use context::{Context, SectionValue};
pub use frame::Frame;
pub use value::{Lambda, LambdaFn, Object, SectionLambdaFn, Value, ValueMap};
pub use vm::{Host, VMConfig, VMError, DEFAULT_MAX_DEPTH, VM};
