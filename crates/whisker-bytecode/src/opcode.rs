//! Whisker render opcode definitions.
//!
//! Opcodes are organized by category for clarity.
//! Each instruction consists of an opcode followed by 0-2 operands.

use std::fmt;

/// Render opcodes for the Whisker VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Op {
    // =========================================================================
    // Execution Control (1-9)
    // =========================================================================
    /// Stop execution.
    Halt = 1,

    // =========================================================================
    // Output (10-19)
    // =========================================================================
    /// Append constant text without escaping.
    Text = 10,
    /// Pop a value and append it escaped.
    EscapedTag = 11,
    /// Pop a value and append it verbatim.
    UnescapedTag = 12,

    // =========================================================================
    // Lookup (20-29)
    // =========================================================================
    /// Push the first frame value bound to a name.
    Fetch = 20,
    /// Push the top frame itself.
    FetchImplicit = 21,
    /// Pop a container and push its member.
    Find = 22,

    // =========================================================================
    // Blocks (30-39)
    // =========================================================================
    /// Pop a value and evaluate a section body against it.
    Section = 30,
    /// Pop a value and evaluate a body if it is falsy or empty.
    InvertedSection = 31,
    /// Render a partial in place.
    Partial = 32,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl Op {
    /// Decode an instruction word.
    pub fn from_u16(word: u16) -> Option<Op> {
        let op = match word {
            1 => Op::Halt,
            10 => Op::Text,
            11 => Op::EscapedTag,
            12 => Op::UnescapedTag,
            20 => Op::Fetch,
            21 => Op::FetchImplicit,
            22 => Op::Find,
            30 => Op::Section,
            31 => Op::InvertedSection,
            32 => Op::Partial,
            _ => return None,
        };
        Some(op)
    }

    /// Get number of operands for this opcode.
    pub fn operand_count(self) -> usize {
        match self {
            // No operands
            Op::Halt | Op::EscapedTag | Op::UnescapedTag | Op::FetchImplicit => 0,

            // One operand
            Op::Text | Op::Fetch | Op::Find | Op::Section | Op::InvertedSection => 1,

            // Two operands
            Op::Partial => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operand_count() {
        assert_eq!(Op::Halt.operand_count(), 0);
        assert_eq!(Op::EscapedTag.operand_count(), 0);
        assert_eq!(Op::Text.operand_count(), 1);
        assert_eq!(Op::Section.operand_count(), 1);
        assert_eq!(Op::Partial.operand_count(), 2);
    }

    #[test]
    fn test_from_u16() {
        for op in [
            Op::Halt,
            Op::Text,
            Op::EscapedTag,
            Op::UnescapedTag,
            Op::Fetch,
            Op::FetchImplicit,
            Op::Find,
            Op::Section,
            Op::InvertedSection,
            Op::Partial,
        ] {
            assert_eq!(Op::from_u16(op as u16), Some(op));
        }
        assert_eq!(Op::from_u16(0), None);
        assert_eq!(Op::from_u16(999), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Op::Text), "Text");
        assert_eq!(format!("{}", Op::InvertedSection), "InvertedSection");
    }
}
