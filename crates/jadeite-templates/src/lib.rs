//! Template lexing and parsing.
//!
//! Compiling a template is a two stage pipeline:
//!
//! 1. **Lexing**: the [`Lexer`] turns the source text into a flat list of
//!    [`Token`]s, tracking indentation and splitting interpolations out of
//!    text.
//! 2. **Parsing**: the [`Parser`] builds a tree of [`ast::Node`]s, resolving
//!    `extends`, named blocks, `include` and mixin definitions on the way
//!    through a [`TemplateLoader`].
//!
//! The resulting [`Template`] is immutable and can be rendered any number of
//! times, from any number of threads.
//!
//! ```ignore
//! use jadeite_expr::DefaultExpressionHandler;
//! use jadeite_templates::{compile, InMemoryLoader};
//!
//! let loader = InMemoryLoader::new();
//! let syntax = DefaultExpressionHandler::new();
//! let template = compile("p Hello, #{name}!", "index.pug".into(), &loader, &syntax)?;
//! ```

pub mod ast;
pub mod brackets;
mod error;
mod lexer;
mod loader;
mod parser;
mod scanner;
mod tokens;

use std::sync::Arc;

use camino::Utf8Path;
use camino::Utf8PathBuf;
pub use error::LexError;
pub use error::ParseError;
pub use error::TemplateError;
use jadeite_expr::ExpressionHandler;
use jadeite_source::path::clean_utf8_path;
pub use lexer::lex_nested;
pub use lexer::Lexer;
pub use loader::FileSystemLoader;
pub use loader::InMemoryLoader;
pub use loader::TemplateLoader;
pub use loader::DEFAULT_EXTENSION;
pub use parser::ParseContext;
pub use parser::Parser;
pub use scanner::Scanner;
pub use tokens::BlockMode;
pub use tokens::Token;
pub use tokens::TokenKind;
pub use tokens::TokenStream;

use crate::ast::Block;

/// A compiled template: the fully resolved node tree of one template file.
#[derive(Clone, Debug, PartialEq)]
pub struct Template {
    path: Utf8PathBuf,
    root: Block,
}

impl Template {
    #[must_use]
    pub fn new(path: Utf8PathBuf, root: Block) -> Self {
        Self { path, root }
    }

    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    #[must_use]
    pub fn root(&self) -> &Block {
        &self.root
    }
}

/// Compile `source`, the contents of the template at `path`.
///
/// `extends` and `include` are resolved relative to `path` through `loader`.
/// Expressions are only syntax checked here; nothing is evaluated.
pub fn compile(
    source: &str,
    path: &Utf8Path,
    loader: &dyn TemplateLoader,
    syntax: &dyn ExpressionHandler,
) -> Result<Template, TemplateError> {
    let path = clean_utf8_path(path);
    tracing::debug!(template = %path, "compiling template");

    let file: Arc<str> = Arc::from(path.as_str());
    let tokens = Lexer::new(source, Arc::clone(&file), syntax).tokenize()?;

    let mut ctx = ParseContext::new(&path, loader, syntax);
    let root = Parser::new(TokenStream::new(tokens, file), path.clone(), &mut ctx).parse()?;
    Ok(Template::new(path, root))
}

#[cfg(test)]
mod tests {
    use jadeite_expr::DefaultExpressionHandler;

    use super::*;
    use crate::ast::Node;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn templates_are_shareable() {
        assert_send_sync::<Template>();
    }

    #[test]
    fn compile_is_idempotent() {
        let loader = InMemoryLoader::new().with_file("layout.pug", "html\n  block body");
        let syntax = DefaultExpressionHandler::new();
        let source = "extends layout\nblock body\n  h1= title\n  p Hello, #{name}!";

        let first = compile(source, Utf8Path::new("page.pug"), &loader, &syntax).unwrap();
        let second = compile(source, Utf8Path::new("page.pug"), &loader, &syntax).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn compile_cleans_the_path() {
        let loader = InMemoryLoader::new();
        let syntax = DefaultExpressionHandler::new();
        let template = compile("p", Utf8Path::new("./pages/../index.pug"), &loader, &syntax).unwrap();
        assert_eq!(template.path(), "index.pug");
        assert!(matches!(template.root().nodes.as_slice(), [Node::Tag(_)]));
    }

    #[test]
    fn errors_carry_codes_and_locations() {
        let loader = InMemoryLoader::new();
        let syntax = DefaultExpressionHandler::new();

        let err = compile("div\n  a(href='x'", Utf8Path::new("a.pug"), &loader, &syntax).unwrap_err();
        assert_eq!(err.code(), "J101");
        assert_eq!(err.location().file(), "a.pug");
        assert_eq!(err.location().line(), 2);

        let err = compile("p\n  include missing", Utf8Path::new("a.pug"), &loader, &syntax).unwrap_err();
        assert_eq!(err.code(), "J204");
        assert_eq!(err.location().line(), 2);
        assert_eq!(err.location().column(), 3);
    }
}
