//! Render output accumulation.

/// How interpolated values are escaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EscapeMode {
    /// Escape `& < > " '` as HTML entities.
    #[default]
    Html,
    /// Write values unchanged.
    None,
}

/// Escape text for safe inclusion in HTML.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Output buffer that distinguishes trusted text from values that need
/// escaping.
#[derive(Debug, Default)]
pub struct OutputBuffer {
    out: String,
    escape: EscapeMode,
}

impl OutputBuffer {
    pub fn new(escape: EscapeMode) -> Self {
        Self {
            out: String::new(),
            escape,
        }
    }

    /// Append text verbatim.
    pub fn push_trusted(&mut self, text: &str) {
        self.out.push_str(text);
    }

    /// Append text, escaping it under the buffer's mode.
    pub fn push_escaped(&mut self, text: &str) {
        match self.escape {
            EscapeMode::Html => self.out.push_str(&escape_html(text)),
            EscapeMode::None => self.out.push_str(text),
        }
    }

    pub fn escape_mode(&self) -> EscapeMode {
        self.escape
    }

    pub fn as_str(&self) -> &str {
        &self.out
    }

    pub fn is_empty(&self) -> bool {
        self.out.is_empty()
    }

    pub fn into_string(self) -> String {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_trusted_and_escaped() {
        let mut buffer = OutputBuffer::new(EscapeMode::Html);
        buffer.push_trusted("<b>");
        buffer.push_escaped("1 < 2");
        buffer.push_trusted("</b>");
        assert_eq!(buffer.into_string(), "<b>1 &lt; 2</b>");
    }

    #[test]
    fn test_escape_disabled() {
        let mut buffer = OutputBuffer::new(EscapeMode::None);
        buffer.push_escaped("<raw>");
        assert_eq!(buffer.as_str(), "<raw>");
    }
}
