/// Output buffer that knows where pretty-printed newlines go.
///
/// `depth` counts the open tags. Indentation is suspended while inside a
/// whitespace-sensitive element.
#[derive(Debug)]
pub(crate) struct IndentWriter {
    buffer: String,
    unit: Option<String>,
    depth: usize,
    verbatim: bool,
}

impl IndentWriter {
    pub(crate) fn new(pretty: bool, indent: usize) -> Self {
        Self {
            buffer: String::new(),
            unit: pretty.then(|| " ".repeat(indent)),
            depth: 0,
            verbatim: false,
        }
    }

    pub(crate) fn push(&mut self, text: &str) {
        self.buffer.push_str(text);
    }

    pub(crate) fn is_pretty(&self) -> bool {
        self.unit.is_some() && !self.verbatim
    }

    pub(crate) fn enter(&mut self) {
        self.depth += 1;
    }

    pub(crate) fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub(crate) fn is_verbatim(&self) -> bool {
        self.verbatim
    }

    pub(crate) fn set_verbatim(&mut self, verbatim: bool) {
        self.verbatim = verbatim;
    }

    fn indentation(&self, offset: usize) -> String {
        match &self.unit {
            Some(unit) => unit.repeat((self.depth + offset).saturating_sub(1)),
            None => String::new(),
        }
    }

    /// Start a new line indented to the current depth plus `offset`.
    ///
    /// Nothing is written at the very start of the output.
    pub(crate) fn pretty_indent(&mut self, offset: usize) {
        if !self.is_pretty() || self.buffer.is_empty() {
            return;
        }
        let indentation = self.indentation(offset);
        self.buffer.push('\n');
        self.buffer.push_str(&indentation);
    }

    /// Write text whose line breaks continue at the current indentation.
    pub(crate) fn push_lines(&mut self, text: &str) {
        if !self.is_pretty() || !text.contains('\n') {
            self.push(text);
            return;
        }
        let separator = format!("\n{}", self.indentation(1));
        self.push(&text.replace('\n', &separator));
    }

    pub(crate) fn into_string(self) -> String {
        self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_output_ignores_indentation() {
        let mut writer = IndentWriter::new(false, 2);
        writer.enter();
        writer.push("<a>");
        writer.pretty_indent(0);
        writer.push_lines("x\ny");
        assert_eq!(writer.into_string(), "<a>x\ny");
    }

    #[test]
    fn pretty_output_indents_by_depth() {
        let mut writer = IndentWriter::new(true, 4);
        writer.enter();
        writer.pretty_indent(0);
        writer.push("<ul>");
        writer.enter();
        writer.pretty_indent(0);
        writer.push("<li>");
        writer.leave();
        writer.pretty_indent(0);
        writer.push("</ul>");
        assert_eq!(writer.into_string(), "<ul>\n    <li>\n</ul>");
    }

    #[test]
    fn verbatim_suspends_indentation() {
        let mut writer = IndentWriter::new(true, 2);
        writer.push("<pre>");
        writer.enter();
        writer.set_verbatim(true);
        writer.pretty_indent(1);
        writer.push_lines("a\nb");
        writer.set_verbatim(false);
        assert!(writer.is_pretty());
        assert_eq!(writer.into_string(), "<pre>a\nb");
    }
}
