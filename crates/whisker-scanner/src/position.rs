//! Source positions for diagnostics.

/// Position in template source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    /// Byte offset within the template.
    pub offset: usize,
    /// Byte offset of the start of the current line.
    pub line_start: usize,
    /// 0-indexed line number.
    pub line: usize,
    /// 0-indexed column number (in bytes).
    pub column: usize,
}

impl Position {
    /// Create a new Position.
    pub fn new(offset: usize, line_start: usize, line: usize, column: usize) -> Self {
        Self {
            offset,
            line_start,
            line,
            column,
        }
    }

    /// Locate a byte offset in `source` by counting the newlines before it.
    pub fn locate(source: &str, offset: usize) -> Self {
        let offset = offset.min(source.len());
        let consumed = &source.as_bytes()[..offset];
        let line = consumed.iter().filter(|&&b| b == b'\n').count();
        let line_start = consumed
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |i| i + 1);
        Self::new(offset, line_start, line, offset - line_start)
    }

    /// Returns the 1-indexed line number.
    pub fn line_number(&self) -> usize {
        self.line + 1
    }

    /// Returns the 1-indexed column number.
    pub fn column_number(&self) -> usize {
        self.column + 1
    }

    /// The full text of the line this position is on, without its newline.
    pub fn line_text<'a>(&self, source: &'a str) -> &'a str {
        let start = self.line_start.min(source.len());
        let rest = &source[start..];
        let end = rest.find('\n').unwrap_or(rest.len());
        rest[..end].strip_suffix('\r').unwrap_or(&rest[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position() {
        let pos = Position::new(10, 5, 1, 5);
        assert_eq!(pos.line_number(), 2);
        assert_eq!(pos.column_number(), 6);
    }

    #[test]
    fn test_locate() {
        let source = "first\nsecond {{x}}\nthird";
        let pos = Position::locate(source, 13);
        assert_eq!(pos.line, 1);
        assert_eq!(pos.column, 7);
        assert_eq!(pos.line_start, 6);
        assert_eq!(pos.line_text(source), "second {{x}}");

        let start = Position::locate(source, 0);
        assert_eq!(start, Position::default());
        assert_eq!(start.line_text(source), "first");
    }

    #[test]
    fn test_locate_past_end() {
        let source = "a\nb";
        let pos = Position::locate(source, 99);
        assert_eq!(pos.offset, 3);
        assert_eq!(pos.line_number(), 2);
        assert_eq!(pos.line_text(source), "b");
    }
}
