use annotate_snippets::AnnotationKind;
use annotate_snippets::Level;
use annotate_snippets::Renderer;
use annotate_snippets::Snippet;

use crate::LineCol;
use crate::LineIndex;

/// One compile or render failure, ready to be printed with an excerpt of the
/// offending template.
#[derive(Debug)]
pub struct Diagnostic<'a> {
    source: &'a str,
    path: &'a str,
    code: &'a str,
    message: &'a str,
    position: LineCol,
    label: &'a str,
    notes: Vec<String>,
}

impl<'a> Diagnostic<'a> {
    /// An error at `position` in `source`, the text of the file `path`.
    #[must_use]
    pub fn error(
        source: &'a str,
        path: &'a str,
        code: &'a str,
        message: &'a str,
        position: LineCol,
    ) -> Self {
        Self {
            source,
            path,
            code,
            message,
            position,
            label: "",
            notes: Vec::new(),
        }
    }

    /// Text printed next to the caret.
    #[must_use]
    pub fn label(mut self, label: &'a str) -> Self {
        self.label = label;
        self
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

/// Formats [`Diagnostic`]s through `annotate-snippets`.
///
/// `plain()` is for tests and piped output, `styled()` for terminals.
#[derive(Debug)]
pub struct DiagnosticRenderer {
    renderer: Renderer,
}

impl DiagnosticRenderer {
    #[must_use]
    pub fn plain() -> Self {
        Self {
            renderer: Renderer::plain(),
        }
    }

    #[must_use]
    pub fn styled() -> Self {
        Self {
            renderer: Renderer::styled(),
        }
    }

    #[must_use]
    pub fn render(&self, diagnostic: &Diagnostic<'_>) -> String {
        let span = LineIndex::from_text(diagnostic.source)
            .span_at(diagnostic.source, diagnostic.position);
        let start = span.start_usize();
        let end = start + span.length_usize();

        let snippet = Snippet::source(diagnostic.source)
            .path(diagnostic.path)
            .line_start(1)
            .annotation(
                AnnotationKind::Primary
                    .span(start..end)
                    .label(diagnostic.label),
            );

        let mut group = Level::ERROR
            .primary_title(diagnostic.message)
            .id(diagnostic.code)
            .element(snippet);

        for note in &diagnostic.notes {
            group = group.element(Level::NOTE.message(note.as_str()));
        }

        self.renderer.render(&[group])
    }
}

impl Default for DiagnosticRenderer {
    fn default() -> Self {
        Self::plain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caret_under_failing_column() {
        let source = "html\n  body\n    p(class=\n";

        let diag = Diagnostic::error(
            source,
            "views/index.pug",
            "J101",
            "`(` is never closed",
            LineCol::new(3, 6),
        )
        .label("opened here");
        let output = DiagnosticRenderer::plain().render(&diag);

        assert!(output.contains("error[J101]"));
        assert!(output.contains("views/index.pug"));
        assert!(output.contains("p(class="));
        assert!(output.contains("opened here"));
        assert!(output.contains('^'));
    }

    #[test]
    fn notes_follow_the_excerpt() {
        let source = "mixin card(title)\n  h2= title\n+crad('b')\n";
        let diag = Diagnostic::error(
            source,
            "cards.pug",
            "J302",
            "mixin `crad` is not defined",
            LineCol::new(3, 1),
        )
        .label("called here")
        .note("mixins must be defined before they are called");

        let output = DiagnosticRenderer::plain().render(&diag);

        assert!(output.contains("error[J302]"));
        assert!(output.contains("called here"));
        let excerpt = output.find("+crad('b')").unwrap();
        let note = output
            .find("note: mixins must be defined before they are called")
            .unwrap();
        assert!(excerpt < note);
    }

    #[test]
    fn position_past_the_end_of_a_line() {
        let source = "p(\n";
        let diag = Diagnostic::error(source, "a.pug", "J101", "unterminated", LineCol::new(1, 9));
        let output = DiagnosticRenderer::plain().render(&diag);
        assert!(output.contains("error[J101]: unterminated"));
        assert!(output.contains("a.pug"));
    }

    #[test]
    fn styled_output_uses_ansi_and_plain_does_not() {
        let source = "p(\n";
        let diag = Diagnostic::error(source, "a.pug", "J101", "unterminated", LineCol::new(1, 2));

        assert!(DiagnosticRenderer::styled().render(&diag).contains("\x1b["));
        assert!(!DiagnosticRenderer::plain().render(&diag).contains("\x1b["));
    }
}
