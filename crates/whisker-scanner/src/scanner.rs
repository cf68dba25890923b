//! Byte-oriented cursor over template text.

use crate::position::Position;

/// Saved scanner state for backtracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScannerState {
    pos: usize,
}

/// Scanner walks a template one byte at a time.
///
/// All matching is done on bytes; delimiters and tag sigils are ASCII or
/// arbitrary strings, so every position the scanner stops at is a valid
/// `str` boundary as long as callers only advance by matched text.
pub struct Scanner<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    /// Create a new scanner for the given input.
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    /// Save the current scanner state for backtracking.
    pub fn save_state(&self) -> ScannerState {
        ScannerState { pos: self.pos }
    }

    /// Restore a previously saved scanner state.
    pub fn restore_state(&mut self, state: ScannerState) {
        self.pos = state.pos;
    }

    /// The whole input.
    pub fn input(&self) -> &'a str {
        self.input
    }

    /// Current byte offset.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Check if the whole input has been consumed.
    pub fn is_eos(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Check if the cursor sits at the start of a line.
    pub fn is_beginning_of_line(&self) -> bool {
        self.pos == 0 || self.input.as_bytes().get(self.pos - 1) == Some(&b'\n')
    }

    /// Unconsumed input.
    pub fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    /// Text between two offsets.
    pub fn slice(&self, start: usize, end: usize) -> &'a str {
        &self.input[start..end]
    }

    /// Peek at the next byte without consuming it.
    pub fn peek_byte(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    /// Check whether the unconsumed input starts with `literal`.
    pub fn check(&self, literal: &str) -> bool {
        self.rest().starts_with(literal)
    }

    /// Consume `literal` if the input continues with it.
    pub fn scan_literal(&mut self, literal: &str) -> bool {
        if !literal.is_empty() && self.check(literal) {
            self.pos += literal.len();
            true
        } else {
            false
        }
    }

    /// Consume one byte if it is contained in `set`.
    pub fn scan_byte(&mut self, set: &[u8]) -> Option<u8> {
        let b = self.peek_byte()?;
        if set.contains(&b) {
            self.pos += 1;
            Some(b)
        } else {
            None
        }
    }

    /// Consume bytes while `pred` holds and return them.
    pub fn scan_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a str {
        let start = self.pos;
        let bytes = self.input.as_bytes();
        while self.pos < bytes.len() && pred(bytes[self.pos]) {
            self.pos += 1;
        }
        &self.input[start..self.pos]
    }

    /// Skip spaces and tabs (not newlines).
    pub fn scan_padding(&mut self) -> &'a str {
        self.scan_while(|b| b == b' ' || b == b'\t')
    }

    /// Skip any whitespace, newlines included.
    pub fn skip_whitespace(&mut self) -> usize {
        self.scan_while(|b| b.is_ascii_whitespace()).len()
    }

    /// Absolute offset of the next occurrence of `needle`.
    pub fn find(&self, needle: &str) -> Option<usize> {
        if needle.is_empty() {
            return None;
        }
        self.rest().find(needle).map(|i| self.pos + i)
    }

    /// Consume everything up to, but not including, `needle`.
    ///
    /// Returns `None` and leaves the cursor untouched when `needle` never
    /// occurs.
    pub fn scan_until(&mut self, needle: &str) -> Option<&'a str> {
        let end = self.find(needle)?;
        let text = &self.input[self.pos..end];
        self.pos = end;
        Some(text)
    }

    /// Move the cursor forward to `pos`.
    pub fn advance_to(&mut self, pos: usize) {
        debug_assert!(pos >= self.pos && pos <= self.input.len());
        self.pos = pos;
    }

    /// Consume and return the rest of the input.
    pub fn terminate(&mut self) -> &'a str {
        let rest = self.rest();
        self.pos = self.input.len();
        rest
    }

    /// Consume a line break (`\n` or `\r\n`) if one follows.
    pub fn scan_newline(&mut self) -> bool {
        self.scan_literal("\n") || self.scan_literal("\r\n")
    }

    /// Check if only spaces and tabs remain before the next line break or
    /// the end of input.
    pub fn rest_of_line_is_blank(&self) -> bool {
        let rest = self.rest().as_bytes();
        for (i, &b) in rest.iter().enumerate() {
            match b {
                b' ' | b'\t' => continue,
                b'\n' => return true,
                b'\r' => return rest.get(i + 1) == Some(&b'\n'),
                _ => return false,
            }
        }
        true
    }

    /// Current position with line and column information.
    pub fn position(&self) -> Position {
        Position::locate(self.input, self.pos)
    }

    /// Position of an arbitrary offset in the input.
    pub fn position_at(&self, offset: usize) -> Position {
        Position::locate(self.input, offset)
    }
}
