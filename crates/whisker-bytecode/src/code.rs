//! Compiled render code container.

use std::collections::HashMap;
use std::fmt::Write;
use std::rc::Rc;

use crate::opcode::Op;

/// Source location for an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    /// 1-indexed template line.
    pub line: usize,
    /// 1-indexed template column.
    pub column: usize,
}

/// Section table entry referenced by [`Op::Section`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionInfo {
    /// Index of the body in the code's children.
    pub body: usize,
    /// Unparsed body text, passed to lambdas.
    pub raw: Rc<str>,
    /// Open delimiter in effect for the body.
    pub open: Rc<str>,
    /// Close delimiter in effect for the body.
    pub close: Rc<str>,
}

/// Immutable compiled render code.
#[derive(Debug, Clone)]
pub struct Code {
    /// Template name (empty for inline templates and section bodies).
    pub name: String,
    /// Instructions (opcodes + operands).
    pub instructions: Vec<u16>,
    /// Text constant pool.
    pub constants: Vec<Rc<str>>,
    /// Lookup name pool.
    pub names: Vec<String>,
    /// Section table.
    pub sections: Vec<SectionInfo>,
    /// Child code blocks (section bodies).
    pub children: Vec<Rc<Code>>,
    /// Source locations for each instruction word.
    pub locations: Vec<SourceLocation>,
}

impl Code {
    /// Get the source location for an instruction index.
    pub fn get_location(&self, instr_index: usize) -> Option<&SourceLocation> {
        self.locations.get(instr_index)
    }

    /// Get a child code block by index.
    pub fn get_child(&self, index: usize) -> Option<&Rc<Code>> {
        self.children.get(index)
    }

    fn constant_text(&self, index: usize) -> &str {
        self.constants.get(index).map_or("?", |s| &**s)
    }

    /// Render a readable instruction listing, section bodies included.
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        self.disassemble_into(&mut out, 0);
        out
    }

    fn disassemble_into(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        let mut ip = 0;
        while ip < self.instructions.len() {
            let offset = ip;
            let Some(op) = Op::from_u16(self.instructions[ip]) else {
                let _ = writeln!(out, "{indent}{offset:04} <invalid {}>", self.instructions[ip]);
                ip += 1;
                continue;
            };
            let operands: Vec<usize> = self.instructions[ip + 1..]
                .iter()
                .take(op.operand_count())
                .map(|&w| w as usize)
                .collect();
            ip += 1 + op.operand_count();

            let _ = write!(out, "{indent}{offset:04} {op}");
            match (op, operands.as_slice()) {
                (Op::Text, [c]) => {
                    let _ = write!(out, " {c} ({:?})", self.constant_text(*c));
                }
                (Op::Fetch | Op::Find, [n]) => {
                    let _ = write!(out, " {n} ({})", self.names.get(*n).map_or("?", |s| s.as_str()));
                }
                (Op::Partial, [name, padding]) => {
                    let _ = write!(
                        out,
                        " {name} {padding} ({:?}, {:?})",
                        self.constant_text(*name),
                        self.constant_text(*padding),
                    );
                }
                (Op::Section, [s]) => {
                    let _ = writeln!(out, " {s}");
                    if let Some(child) = self.sections.get(*s).and_then(|info| self.get_child(info.body)) {
                        child.disassemble_into(out, depth + 1);
                    }
                    continue;
                }
                (Op::InvertedSection, [c]) => {
                    let _ = writeln!(out, " {c}");
                    if let Some(child) = self.get_child(*c) {
                        child.disassemble_into(out, depth + 1);
                    }
                    continue;
                }
                _ => {}
            }
            let _ = writeln!(out);
        }
    }
}

/// Mutable code builder used during compilation.
#[derive(Debug, Default)]
pub struct CodeBuilder {
    pub name: String,
    pub instructions: Vec<u16>,
    pub constants: Vec<Rc<str>>,
    pub names: Vec<String>,
    pub name_map: HashMap<String, usize>,
    pub sections: Vec<SectionInfo>,
    pub children: Vec<Rc<Code>>,
    pub locations: Vec<SourceLocation>,
    pub current_line: usize,
    pub current_column: usize,
}

impl CodeBuilder {
    /// Create a new code builder.
    pub fn new(name: String) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    /// Set current source position for subsequent instructions.
    pub fn set_position(&mut self, line: usize, column: usize) {
        self.current_line = line;
        self.current_column = column;
    }

    fn location(&self) -> SourceLocation {
        SourceLocation {
            line: self.current_line,
            column: self.current_column,
        }
    }

    /// Emit a single instruction with no operands.
    pub fn emit(&mut self, opcode: u16) -> usize {
        let offset = self.instructions.len();
        self.instructions.push(opcode);
        self.locations.push(self.location());
        offset
    }

    /// Emit an instruction with one operand.
    pub fn emit1(&mut self, opcode: u16, operand: u16) -> usize {
        let offset = self.emit(opcode);
        self.instructions.push(operand);
        self.locations.push(self.location());
        offset
    }

    /// Emit an instruction with two operands.
    pub fn emit2(&mut self, opcode: u16, operand1: u16, operand2: u16) -> usize {
        let offset = self.emit1(opcode, operand1);
        self.instructions.push(operand2);
        self.locations.push(self.location());
        offset
    }

    /// Get current instruction offset.
    pub fn offset(&self) -> usize {
        self.instructions.len()
    }

    /// Add a text constant and return its index.
    pub fn add_constant(&mut self, value: &str) -> usize {
        // Check for existing constant (for deduplication)
        if let Some(i) = self.constants.iter().position(|c| &**c == value) {
            return i;
        }
        let index = self.constants.len();
        self.constants.push(Rc::from(value));
        index
    }

    /// Add a lookup name and return its index.
    pub fn add_name(&mut self, name: &str) -> usize {
        if let Some(&index) = self.name_map.get(name) {
            return index;
        }
        let index = self.names.len();
        self.names.push(name.to_string());
        self.name_map.insert(name.to_string(), index);
        index
    }

    /// Add a compiled child block and return its index.
    pub fn add_child(&mut self, child: Rc<Code>) -> usize {
        let index = self.children.len();
        self.children.push(child);
        index
    }

    /// Add a section table entry and return its index.
    pub fn add_section(&mut self, info: SectionInfo) -> usize {
        let index = self.sections.len();
        self.sections.push(info);
        index
    }

    /// Convert to immutable Code.
    pub fn to_code(self) -> Rc<Code> {
        Rc::new(Code {
            name: self.name,
            instructions: self.instructions,
            constants: self.constants,
            names: self.names,
            sections: self.sections,
            children: self.children,
            locations: self.locations,
        })
    }
}
