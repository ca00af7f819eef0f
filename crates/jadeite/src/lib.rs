//! A Pug/Jade style template engine.
//!
//! ```ignore
//! use jadeite::Engine;
//! use jadeite::Value;
//! use serde_json::json;
//!
//! let engine = Engine::new("views");
//! let Value::Object(data) = json!({"name": "Bob"}) else { unreachable!() };
//! let html = engine.render("index", data)?;
//! ```
//!
//! The pipeline lives in the member crates: [`jadeite_templates`] lexes and
//! parses, [`jadeite_render`] renders, [`jadeite_expr`] evaluates the
//! embedded expressions. This crate ties them together behind [`Engine`],
//! which resolves template names, caches compiled templates and formats
//! errors.

mod engine;
mod error;

pub use engine::Engine;
pub use engine::EngineBuilder;
pub use error::Error;
pub use jadeite_conf::Settings;
pub use jadeite_expr::DefaultExpressionHandler;
pub use jadeite_expr::ExpressionHandler;
pub use jadeite_expr::Map;
pub use jadeite_expr::Value;
pub use jadeite_render::Filter;
pub use jadeite_render::FilterRegistry;
pub use jadeite_render::Mode;
pub use jadeite_render::RenderOptions;
pub use jadeite_source::DiagnosticRenderer;
pub use jadeite_templates::FileSystemLoader;
pub use jadeite_templates::InMemoryLoader;
pub use jadeite_templates::Template;
pub use jadeite_templates::TemplateLoader;
