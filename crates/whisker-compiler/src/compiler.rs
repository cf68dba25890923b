//! Render code generator for Whisker.
//!
//! Walks a token tree and emits a flat instruction stream. Section bodies
//! are compiled into child blocks by a fresh compiler, so no generation
//! state is shared between blocks or between templates.

use std::rc::Rc;

use thiserror::Error;
use whisker_bytecode::{Code, CodeBuilder, Op, SectionInfo};
use whisker_parser::*;
use whisker_scanner::{Delimiters, Position};

/// Compilation errors.
#[derive(Error, Debug, Clone)]
pub enum CompilerError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("too many {pool} in one block at line {line}, column {column}")]
    TooLarge {
        pool: &'static str,
        line: usize,
        column: usize,
    },
}

/// Compiler configuration.
#[derive(Debug, Clone, Default)]
pub struct CompilerConfig {
    /// Template name, recorded on the compiled code.
    pub name: String,
}

/// Token tree to render code compiler.
pub struct Compiler {
    builder: CodeBuilder,
    position: Position,
}

impl Compiler {
    /// Create a new compiler.
    pub fn new(config: CompilerConfig) -> Self {
        Self {
            builder: CodeBuilder::new(config.name),
            position: Position::default(),
        }
    }

    /// Compile a token tree to render code.
    pub fn compile(mut self, tree: &Token) -> Result<Rc<Code>, CompilerError> {
        self.compile_token(tree)?;
        self.emit(Op::Halt);

        let code = self.builder.to_code();
        tracing::debug!(
            name = %code.name,
            instructions = code.instructions.len(),
            sections = code.sections.len(),
            "compiled template"
        );
        Ok(code)
    }

    fn compile_tokens(&mut self, tokens: &[Token]) -> Result<(), CompilerError> {
        for token in tokens {
            self.compile_token(token)?;
        }
        Ok(())
    }

    fn compile_token(&mut self, token: &Token) -> Result<(), CompilerError> {
        match token {
            Token::Sequence(children) => self.compile_tokens(children)?,
            Token::Static(text) => self.compile_static(text)?,
            Token::EscapedTag(tag) => {
                self.set_position(tag.position);
                self.compile_path(&tag.path)?;
                self.emit(Op::EscapedTag);
            }
            Token::UnescapedTag(tag) => {
                self.set_position(tag.position);
                self.compile_path(&tag.path)?;
                self.emit(Op::UnescapedTag);
            }
            Token::Section(section) => self.compile_section(section)?,
            Token::InvertedSection(section) => self.compile_inverted_section(section)?,
            Token::Partial(partial) => self.compile_partial(partial)?,
            Token::Comment(_) | Token::DelimiterChange(_) => {}
        }
        Ok(())
    }

    fn compile_static(&mut self, text: &str) -> Result<(), CompilerError> {
        if text.is_empty() {
            return Ok(());
        }
        let index = self.builder.add_constant(text);
        let index = self.operand(index, "text constants")?;
        self.emit1(Op::Text, index);
        Ok(())
    }

    /// Emit the lookup of a dotted path: fetch the first segment from the
    /// context, then find each following segment on the previous result.
    fn compile_path(&mut self, path: &Path) -> Result<(), CompilerError> {
        let Some((first, rest)) = path.segments.split_first() else {
            self.emit(Op::FetchImplicit);
            return Ok(());
        };

        let index = self.name(first)?;
        self.emit1(Op::Fetch, index);
        for segment in rest {
            let index = self.name(segment)?;
            self.emit1(Op::Find, index);
        }
        Ok(())
    }

    fn compile_section(&mut self, section: &Section) -> Result<(), CompilerError> {
        self.set_position(section.position);
        self.compile_path(&section.path)?;

        let body = compile_block(&section.body)?;
        let Delimiters { open, close } = &section.delimiters;
        let info = SectionInfo {
            body: self.builder.add_child(body),
            raw: Rc::from(section.raw.as_str()),
            open: Rc::from(open.as_str()),
            close: Rc::from(close.as_str()),
        };
        self.operand(info.body, "section bodies")?;
        let index = self.builder.add_section(info);
        let index = self.operand(index, "sections")?;

        self.set_position(section.position);
        self.emit1(Op::Section, index);
        Ok(())
    }

    fn compile_inverted_section(&mut self, section: &InvertedSection) -> Result<(), CompilerError> {
        self.set_position(section.position);
        self.compile_path(&section.path)?;

        let body = compile_block(&section.body)?;
        let index = self.builder.add_child(body);
        let index = self.operand(index, "section bodies")?;

        self.set_position(section.position);
        self.emit1(Op::InvertedSection, index);
        Ok(())
    }

    fn compile_partial(&mut self, partial: &Partial) -> Result<(), CompilerError> {
        self.set_position(partial.position);
        let name = self.builder.add_constant(&partial.name);
        let name = self.operand(name, "text constants")?;
        let indentation = self.builder.add_constant(&partial.indentation);
        let indentation = self.operand(indentation, "text constants")?;
        self.emit2(Op::Partial, name, indentation);
        Ok(())
    }

    // ===========================================================================
    // Helper Methods
    // ===========================================================================

    fn set_position(&mut self, position: Position) {
        self.position = position;
        self.builder
            .set_position(position.line_number(), position.column_number());
    }

    fn emit(&mut self, opcode: Op) -> usize {
        self.builder.emit(opcode as u16)
    }

    fn emit1(&mut self, opcode: Op, operand: u16) -> usize {
        self.builder.emit1(opcode as u16, operand)
    }

    fn emit2(&mut self, opcode: Op, operand1: u16, operand2: u16) -> usize {
        self.builder.emit2(opcode as u16, operand1, operand2)
    }

    fn name(&mut self, name: &str) -> Result<u16, CompilerError> {
        let index = self.builder.add_name(name);
        self.operand(index, "names")
    }

    fn operand(&self, index: usize, pool: &'static str) -> Result<u16, CompilerError> {
        u16::try_from(index).map_err(|_| CompilerError::TooLarge {
            pool,
            line: self.position.line_number(),
            column: self.position.column_number(),
        })
    }
}

/// Compile a section body into its own block.
fn compile_block(body: &[Token]) -> Result<Rc<Code>, CompilerError> {
    let mut compiler = Compiler::new(CompilerConfig::default());
    compiler.compile_tokens(body)?;
    compiler.emit(Op::Halt);
    Ok(compiler.builder.to_code())
}

/// Generate render code for an already parsed token tree.
pub fn generate(tree: &Token, config: CompilerConfig) -> Result<Rc<Code>, CompilerError> {
    Compiler::new(config).compile(tree)
}

/// Parse and compile template source.
pub fn compile(source: &str, config: CompilerConfig) -> Result<Rc<Code>, CompilerError> {
    let tree = whisker_parser::parse(source)?;
    generate(&tree, config)
}

/// Parse and compile template source that starts with custom delimiters.
pub fn compile_with_delimiters(
    source: &str,
    delimiters: Delimiters,
    config: CompilerConfig,
) -> Result<Rc<Code>, CompilerError> {
    let tree = whisker_parser::parse_with_delimiters(source, delimiters)?;
    generate(&tree, config)
}
