//! Rendering compiled templates to markup.
//!
//! [`render`] walks a [`Template`] against a [`ScopeModel`] holding the
//! caller's data, evaluating expressions through an
//! [`ExpressionHandler`]. Nothing is written to the sink unless the whole
//! template renders; a failed render leaves the sink untouched.

mod attrs;
mod compiler;
mod doctype;
mod error;
mod escape;
mod filters;
mod model;
mod writer;

use std::fmt;

pub use doctype::doctype_string;
pub use doctype::Mode;
pub use doctype::UnknownMode;
pub use error::RenderError;
pub use escape::escape_html;
pub use filters::CdataFilter;
pub use filters::CssFilter;
pub use filters::Filter;
pub use filters::FilterRegistry;
pub use filters::JsFilter;
use jadeite_expr::ExpressionHandler;
use jadeite_templates::Template;
pub use model::ScopeModel;

use crate::compiler::Renderer;

pub const DEFAULT_INDENT: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderOptions {
    /// Indent nested elements on their own lines.
    pub pretty: bool,
    /// Starting output mode; a `doctype` in the template overrides it.
    pub mode: Mode,
    /// Spaces per nesting level when `pretty` is set.
    pub indent: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            pretty: false,
            mode: Mode::Html,
            indent: DEFAULT_INDENT,
        }
    }
}

/// Render `template` into `sink`.
///
/// Assignments made by unbuffered code at the top level of the template are
/// left in `model` afterwards.
pub fn render<'t>(
    template: &'t Template,
    model: &mut ScopeModel<'t>,
    syntax: &dyn ExpressionHandler,
    options: &RenderOptions,
    sink: &mut dyn fmt::Write,
) -> Result<(), RenderError> {
    let output = render_to_string(template, model, syntax, options)?;
    sink.write_str(&output)
        .map_err(|source| RenderError::Write {
            source,
            location: template.root().location.clone(),
        })
}

pub fn render_to_string<'t>(
    template: &'t Template,
    model: &mut ScopeModel<'t>,
    syntax: &dyn ExpressionHandler,
    options: &RenderOptions,
) -> Result<String, RenderError> {
    tracing::debug!(
        template = %template.path(),
        mode = %options.mode,
        pretty = options.pretty,
        "rendering template"
    );
    let mut renderer = Renderer::new(model, syntax, options);
    renderer.render_block(template.root())?;
    Ok(renderer.finish())
}
