//! Execution frame for one block of render code.

use whisker_bytecode::{Code, SectionInfo, SourceLocation};

/// Cursor over a code block's instructions.
#[derive(Debug)]
pub struct Frame<'a> {
    /// Instruction pointer - current position in the block.
    pub ip: usize,
    /// The code being executed.
    pub code: &'a Code,
}

impl<'a> Frame<'a> {
    pub fn new(code: &'a Code) -> Self {
        Self { ip: 0, code }
    }

    /// Read the current instruction and advance IP.
    pub fn read_op(&mut self) -> u16 {
        let op = self.code.instructions[self.ip];
        self.ip += 1;
        op
    }

    /// Read an operand word and advance IP.
    pub fn read_operand(&mut self) -> usize {
        self.read_op() as usize
    }

    /// Check if we've reached the end of the block.
    pub fn is_at_end(&self) -> bool {
        self.ip >= self.code.instructions.len()
    }

    pub fn constant(&self, index: usize) -> &'a str {
        &self.code.constants[index]
    }

    pub fn name(&self, index: usize) -> &'a str {
        &self.code.names[index]
    }

    pub fn section(&self, index: usize) -> &'a SectionInfo {
        &self.code.sections[index]
    }

    pub fn child(&self, index: usize) -> &'a Code {
        &self.code.children[index]
    }

    /// Source location of an instruction in this block.
    pub fn location(&self, ip: usize) -> Option<SourceLocation> {
        self.code.get_location(ip).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use whisker_bytecode::{CodeBuilder, Op};

    #[test]
    fn test_read_sequence() {
        let mut builder = CodeBuilder::new(String::new());
        let hello = builder.add_constant("hello");
        builder.set_position(2, 4);
        builder.emit1(Op::Text as u16, hello as u16);
        builder.emit(Op::Halt as u16);
        let code = builder.to_code();

        let mut frame = Frame::new(&code);
        assert_eq!(frame.read_op(), Op::Text as u16);
        let index = frame.read_operand();
        assert_eq!(frame.constant(index), "hello");
        assert_eq!(frame.read_op(), Op::Halt as u16);
        assert!(frame.is_at_end());
        assert_eq!(frame.location(0), Some(SourceLocation { line: 2, column: 4 }));
    }
}
