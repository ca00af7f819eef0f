//! Output modes and the doctype shortcuts that select them.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// How elements are closed.
///
/// `Html` writes boolean attributes tersely and void elements as `<br>`;
/// `Xhtml` writes `<br/>` and `checked="checked"`; `Xml` has no void
/// elements at all, so `br` renders as `<br></br>`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Mode {
    #[default]
    Html,
    Xhtml,
    Xml,
}

impl Mode {
    /// The mode an explicit doctype switches output to.
    #[must_use]
    pub fn for_doctype(doctype: &str) -> Self {
        if doctype.eq_ignore_ascii_case("<!doctype html>") {
            Mode::Html
        } else if doctype.starts_with("<?xml") {
            Mode::Xml
        } else {
            Mode::Xhtml
        }
    }

    /// Doctype written by a bare `doctype` line.
    #[must_use]
    pub fn default_doctype(self) -> &'static str {
        match self {
            Mode::Html => "html",
            Mode::Xhtml => "transitional",
            Mode::Xml => "xml",
        }
    }

    #[must_use]
    pub fn is_terse(self) -> bool {
        self == Mode::Html
    }

    #[must_use]
    pub fn is_xml(self) -> bool {
        self == Mode::Xml
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Html => "html",
            Mode::Xhtml => "xhtml",
            Mode::Xml => "xml",
        })
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown output mode `{0}`, expected one of html, xhtml, xml")]
pub struct UnknownMode(String);

impl FromStr for Mode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "html" => Ok(Mode::Html),
            "xhtml" => Ok(Mode::Xhtml),
            "xml" => Ok(Mode::Xml),
            _ => Err(UnknownMode(s.to_string())),
        }
    }
}

/// Expand a doctype shortcut into the full declaration.
///
/// Unknown names are written as `<!DOCTYPE name>`.
#[must_use]
pub fn doctype_string(name: &str) -> String {
    let known = match name.to_ascii_lowercase().as_str() {
        "html" => "<!DOCTYPE html>",
        "xml" => r#"<?xml version="1.0" encoding="utf-8" ?>"#,
        "transitional" => {
            r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Transitional//EN" "http://www.w3.org/TR/xhtml1/DTD/xhtml1-transitional.dtd">"#
        }
        "strict" => {
            r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Strict//EN" "http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd">"#
        }
        "frameset" => {
            r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Frameset//EN" "http://www.w3.org/TR/xhtml1/DTD/xhtml1-frameset.dtd">"#
        }
        "1.1" => {
            r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.1//EN" "http://www.w3.org/TR/xhtml11/DTD/xhtml11.dtd">"#
        }
        "basic" => {
            r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML Basic 1.1//EN" "http://www.w3.org/TR/xhtml-basic/xhtml-basic11.dtd">"#
        }
        "mobile" => {
            r#"<!DOCTYPE html PUBLIC "-//WAPFORUM//DTD XHTML Mobile 1.2//EN" "http://www.openmobilealliance.org/tech/DTD/xhtml-mobile12.dtd">"#
        }
        "plist" => {
            r#"<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">"#
        }
        _ => return format!("<!DOCTYPE {name}>"),
    };
    known.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortcuts_expand() {
        assert_eq!(doctype_string("html"), "<!DOCTYPE html>");
        assert_eq!(doctype_string("HTML"), "<!DOCTYPE html>");
        assert_eq!(
            doctype_string("xml"),
            r#"<?xml version="1.0" encoding="utf-8" ?>"#
        );
        assert_eq!(doctype_string("custom stuff"), "<!DOCTYPE custom stuff>");
    }

    #[test]
    fn doctype_selects_mode() {
        assert_eq!(Mode::for_doctype(&doctype_string("html")), Mode::Html);
        assert_eq!(Mode::for_doctype(&doctype_string("xml")), Mode::Xml);
        assert_eq!(Mode::for_doctype(&doctype_string("strict")), Mode::Xhtml);
        assert_eq!(Mode::for_doctype("<!DOCTYPE custom>"), Mode::Xhtml);
    }

    #[test]
    fn parse_mode() {
        assert_eq!("XHTML".parse::<Mode>().unwrap(), Mode::Xhtml);
        assert_eq!(Mode::Xml.to_string(), "xml");
        assert!("svg".parse::<Mode>().is_err());
    }
}
