/// The not-yet-lexed remainder of a template.
///
/// Line endings are normalized to `\n` and a leading byte order mark is
/// dropped. Lexer rules inspect the front of [`Scanner::rest`] and truncate
/// whatever they recognize with [`Scanner::consume`].
#[derive(Debug, Clone)]
pub struct Scanner {
    source: String,
    offset: usize,
}

impl Scanner {
    #[must_use]
    pub fn new(source: &str) -> Self {
        let source = source.strip_prefix('\u{feff}').unwrap_or(source);
        Self {
            source: source.replace("\r\n", "\n").replace('\r', "\n"),
            offset: 0,
        }
    }

    #[must_use]
    pub fn rest(&self) -> &str {
        &self.source[self.offset..]
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offset >= self.source.len()
    }

    #[must_use]
    pub fn starts_with(&self, prefix: &str) -> bool {
        self.rest().starts_with(prefix)
    }

    #[must_use]
    pub fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    /// Remainder of the current line, without the newline.
    #[must_use]
    pub fn line(&self) -> &str {
        let rest = self.rest();
        &rest[..rest.find('\n').unwrap_or(rest.len())]
    }

    /// Drop `len` bytes from the front and return them.
    pub fn consume(&mut self, len: usize) -> &str {
        let start = self.offset;
        self.offset = (self.offset + len).min(self.source.len());
        &self.source[start..self.offset]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_line_endings_and_bom() {
        let scanner = Scanner::new("\u{feff}p a\r\np b\rp c");
        assert_eq!(scanner.rest(), "p a\np b\np c");
    }

    #[test]
    fn consume_truncates_the_front() {
        let mut scanner = Scanner::new("div.box\n  p");
        assert!(scanner.starts_with("div"));
        assert_eq!(scanner.consume(3), "div");
        assert_eq!(scanner.peek(), Some('.'));
        assert_eq!(scanner.line(), ".box");
        assert_eq!(scanner.rest(), ".box\n  p");
        scanner.consume(100);
        assert!(scanner.is_empty());
        assert_eq!(scanner.peek(), None);
    }
}
