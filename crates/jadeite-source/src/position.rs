use std::fmt;
use std::sync::Arc;

/// A 1-based line and column position within a template.
///
/// Columns count characters, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineCol {
    line: u32,
    column: u32,
}

impl LineCol {
    #[must_use]
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    #[must_use]
    pub fn line(&self) -> u32 {
        self.line
    }

    #[must_use]
    pub fn column(&self) -> u32 {
        self.column
    }

    /// The position reached after reading `text` starting from `self`.
    #[must_use]
    pub fn advance(self, text: &str) -> Self {
        let mut line = self.line;
        let mut column = self.column;
        for ch in text.chars() {
            if ch == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        Self { line, column }
    }
}

impl Default for LineCol {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl fmt::Display for LineCol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Where a token, node or error originates: the file name plus a position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    file: Arc<str>,
    position: LineCol,
}

impl Location {
    #[must_use]
    pub fn new(file: Arc<str>, position: LineCol) -> Self {
        Self { file, position }
    }

    #[must_use]
    pub fn file(&self) -> &str {
        &self.file
    }

    #[must_use]
    pub fn position(&self) -> LineCol {
        self.position
    }

    #[must_use]
    pub fn line(&self) -> u32 {
        self.position.line()
    }

    #[must_use]
    pub fn column(&self) -> u32 {
        self.position.column()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.position)
    }
}

/// A byte range within a source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    start: u32,
    length: u32,
}

impl Span {
    #[must_use]
    pub fn new(start: u32, length: u32) -> Self {
        Self { start, length }
    }

    #[must_use]
    pub fn from_parts(start: usize, length: usize) -> Self {
        let start_u32 = u32::try_from(start).unwrap_or(u32::MAX);
        let length_u32 = u32::try_from(length).unwrap_or(u32::MAX.saturating_sub(start_u32));
        Span::new(start_u32, length_u32)
    }

    #[must_use]
    pub fn start_usize(self) -> usize {
        self.start as usize
    }

    #[must_use]
    pub fn length_usize(self) -> usize {
        self.length as usize
    }
}

/// Byte offsets of the start of every line in a text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(
            text.bytes()
                .enumerate()
                .filter(|(_, byte)| *byte == b'\n')
                .map(|(index, _)| index + 1),
        );
        Self {
            starts,
            len: text.len(),
        }
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        self.starts.len()
    }

    /// Byte offset of `position` inside `text`, clamped to the end of its line.
    #[must_use]
    pub fn offset(&self, text: &str, position: LineCol) -> Option<usize> {
        let line = usize::try_from(position.line()).ok()?.checked_sub(1)?;
        let start = *self.starts.get(line)?;
        let end = self.line_end(line);
        let skip = usize::try_from(position.column().saturating_sub(1)).ok()?;
        let within = text[start..end]
            .char_indices()
            .nth(skip)
            .map_or(end - start, |(index, _)| index);
        Some(start + within)
    }

    /// A span covering the character at `position`, or an empty span at the
    /// end of the line when the position points past its last character.
    #[must_use]
    pub fn span_at(&self, text: &str, position: LineCol) -> Span {
        let Some(start) = self.offset(text, position) else {
            return Span::from_parts(self.len, 0);
        };
        let width = text[start..]
            .chars()
            .next()
            .filter(|ch| *ch != '\n')
            .map_or(0, char::len_utf8);
        Span::from_parts(start, width)
    }

    fn line_end(&self, line: usize) -> usize {
        self.starts
            .get(line + 1)
            .map_or(self.len, |next| next - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_tracks_lines_and_columns() {
        let start = LineCol::default();
        assert_eq!(start.advance("ab"), LineCol::new(1, 3));
        assert_eq!(start.advance("ab\ncd"), LineCol::new(2, 3));
        assert_eq!(LineCol::new(4, 7).advance("\n"), LineCol::new(5, 1));
    }

    #[test]
    fn offset_of_a_position() {
        let text = "html\n  body\n    p hi\n";
        let index = LineIndex::from_text(text);
        assert_eq!(index.line_count(), 4);

        let offset = index.offset(text, LineCol::new(3, 5)).unwrap();
        assert_eq!(&text[offset..offset + 1], "p");
    }

    #[test]
    fn offset_clamps_to_line_end() {
        let text = "ab\ncd";
        let index = LineIndex::from_text(text);
        assert_eq!(index.offset(text, LineCol::new(1, 40)), Some(2));
        assert_eq!(index.offset(text, LineCol::new(9, 1)), None);
    }

    #[test]
    fn columns_count_characters() {
        let text = "p héllo";
        let index = LineIndex::from_text(text);
        let offset = index.offset(text, LineCol::new(1, 5)).unwrap();
        assert_eq!(&text[offset..], "llo");
    }

    #[test]
    fn span_at_covers_one_character() {
        let text = "div\n  span(\n";
        let index = LineIndex::from_text(text);
        let span = index.span_at(text, LineCol::new(2, 7));
        let start = span.start_usize();
        assert_eq!(&text[start..start + span.length_usize()], "(");

        let end = index.span_at(text, LineCol::new(2, 8));
        assert_eq!(end.length_usize(), 0);
    }

    #[test]
    fn location_display() {
        let location = Location::new(Arc::from("views/index.pug"), LineCol::new(3, 9));
        assert_eq!(location.to_string(), "views/index.pug:3:9");
    }
}
