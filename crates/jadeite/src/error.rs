use std::io;

use camino::Utf8PathBuf;
use jadeite_render::RenderError;
use jadeite_source::Diagnostic;
use jadeite_source::DiagnosticRenderer;
use jadeite_source::Location;
use jadeite_templates::ParseError;
use jadeite_templates::TemplateError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("cannot read template `{path}`")]
    NotFound {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("template name `{name}` resolves outside of the template root")]
    OutsideRoot { name: String },
}

impl Error {
    /// Diagnostic code of compile and render failures.
    #[must_use]
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Error::Template(err) => Some(err.code()),
            Error::Render(err) => Some(err.code()),
            Error::NotFound { .. } | Error::OutsideRoot { .. } => None,
        }
    }

    #[must_use]
    pub fn location(&self) -> Option<&Location> {
        match self {
            Error::Template(err) => Some(err.location()),
            Error::Render(err) => Some(err.location()),
            Error::NotFound { .. } | Error::OutsideRoot { .. } => None,
        }
    }

    /// Extra help printed under the excerpt for errors whose message alone
    /// does not say how to fix them.
    #[must_use]
    pub fn note(&self) -> Option<&'static str> {
        match self {
            Error::Template(TemplateError::Parse(ParseError::RecursiveInclude { .. })) => {
                Some("templates cannot include or extend themselves, directly or through others")
            }
            Error::Render(RenderError::UndefinedMixin { .. }) => {
                Some("mixins must be defined before they are called")
            }
            Error::Render(RenderError::AttributesNotMap { .. }) => {
                Some("`&attributes` takes an object literal or a variable holding an object")
            }
            _ => None,
        }
    }

    /// Format the error for humans, with an excerpt of `source` (the text of
    /// the file the error points into) when one is available.
    #[must_use]
    pub fn render(&self, source: Option<&str>, renderer: &DiagnosticRenderer) -> String {
        let message = self.to_string();
        let (Some(code), Some(location)) = (self.code(), self.location()) else {
            return format!("error: {message}");
        };

        let Some(source) = source else {
            return format!(
                "error[{code}]: {message}\n --> {}:{}:{}",
                location.file(),
                location.line(),
                location.column()
            );
        };

        let mut diagnostic =
            Diagnostic::error(source, location.file(), code, &message, location.position());
        if let Some(note) = self.note() {
            diagnostic = diagnostic.note(note);
        }
        renderer.render(&diagnostic)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use jadeite_source::LineCol;

    use super::*;

    fn undefined_mixin() -> Error {
        Error::Render(RenderError::UndefinedMixin {
            name: "card".to_string(),
            location: Location::new(Arc::from("views/index.pug"), LineCol::new(2, 3)),
        })
    }

    #[test]
    fn codes_and_locations() {
        let err = undefined_mixin();
        assert_eq!(err.code(), Some("J302"));
        assert_eq!(err.location().map(Location::line), Some(2));

        let err = Error::OutsideRoot {
            name: "../secret".to_string(),
        };
        assert_eq!(err.code(), None);
        assert!(err.location().is_none());
    }

    #[test]
    fn render_without_source_points_at_the_file() {
        let rendered = undefined_mixin().render(None, &DiagnosticRenderer::plain());
        assert_eq!(
            rendered,
            "error[J302]: mixin `card` is not defined\n --> views/index.pug:2:3"
        );
    }

    #[test]
    fn render_with_source_shows_an_excerpt() {
        let rendered = undefined_mixin().render(
            Some("div\n  +card()\n"),
            &DiagnosticRenderer::plain(),
        );
        assert!(rendered.contains("error[J302]"));
        assert!(rendered.contains("mixin `card` is not defined"));
        assert!(rendered.contains("views/index.pug"));
        assert!(rendered.contains("+card()"));
        assert!(rendered.contains("note: mixins must be defined before they are called"));
    }

    #[test]
    fn notes_only_for_errors_that_need_them() {
        assert!(undefined_mixin().note().is_some());

        let recursive = Error::Template(TemplateError::Parse(ParseError::RecursiveInclude {
            path: Utf8PathBuf::from("a.pug"),
            location: Location::new(Arc::from("a.pug"), LineCol::new(1, 1)),
        }));
        assert_eq!(
            recursive.note(),
            Some("templates cannot include or extend themselves, directly or through others")
        );

        let outside = Error::OutsideRoot {
            name: "../x".to_string(),
        };
        assert_eq!(outside.note(), None);
    }

    #[test]
    fn errors_without_location() {
        let err = Error::NotFound {
            path: Utf8PathBuf::from("missing.pug"),
            source: io::Error::new(io::ErrorKind::NotFound, "gone"),
        };
        assert_eq!(
            err.render(Some("ignored"), &DiagnosticRenderer::plain()),
            "error: cannot read template `missing.pug`"
        );
    }
}
