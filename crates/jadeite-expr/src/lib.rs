//! Expression evaluation for templates.
//!
//! Templates embed expressions in many places: buffered code (`= user.name`),
//! attribute values, conditions, loop sources, mixin arguments and unbuffered
//! code lines (`- var total = 0`). The template engine never interprets them
//! itself; it hands them to an [`ExpressionHandler`] together with a [`Scope`].
//!
//! [`DefaultExpressionHandler`] evaluates a JavaScript subset over
//! [`serde_json::Value`].

mod ast;
mod error;
mod handler;
mod interpreter;
mod lexer;
mod parser;
pub mod value;

pub use error::ExpressionError;
pub use handler::DefaultExpressionHandler;
pub use serde_json::Map;
pub use serde_json::Value;

/// Variable storage an expression reads and writes.
///
/// The contract between the evaluator and the scope model:
///
/// - `get` resolves a name from the innermost binding outwards;
/// - `declare` handles `var`/`let`/`const` and always binds in the innermost
///   frame, remembering that the frame declared the name;
/// - `assign` handles plain assignment and writes to the innermost frame that
///   already declares or holds the name, falling back to the innermost frame.
pub trait Scope {
    fn get(&self, name: &str) -> Option<&Value>;
    fn declare(&mut self, name: &str, value: Value);
    fn assign(&mut self, name: &str, value: Value);
}

/// A single flat frame.
impl Scope for Map<String, Value> {
    fn get(&self, name: &str) -> Option<&Value> {
        Map::get(self, name)
    }

    fn declare(&mut self, name: &str, value: Value) {
        self.insert(name.to_string(), value);
    }

    fn assign(&mut self, name: &str, value: Value) {
        self.insert(name.to_string(), value);
    }
}

/// Evaluates the expression strings embedded in a template.
///
/// Implementations are shared between concurrent renders and must be
/// thread-safe.
pub trait ExpressionHandler: Send + Sync {
    fn evaluate_value(&self, expression: &str, scope: &mut dyn Scope)
        -> Result<Value, ExpressionError>;

    fn evaluate_boolean(
        &self,
        expression: &str,
        scope: &mut dyn Scope,
    ) -> Result<bool, ExpressionError> {
        self.evaluate_value(expression, scope)
            .map(|value| value::is_truthy(&value))
    }

    /// `None` when the expression evaluates to `null`/`undefined`.
    fn evaluate_string(
        &self,
        expression: &str,
        scope: &mut dyn Scope,
    ) -> Result<Option<String>, ExpressionError> {
        self.evaluate_value(expression, scope)
            .map(|value| value::to_display(&value))
    }

    /// Run a statement list (unbuffered code), returning the value of its
    /// last expression statement.
    fn execute(&self, code: &str, scope: &mut dyn Scope) -> Result<Value, ExpressionError>;

    /// Check that `expression` is one complete expression without evaluating it.
    fn assert_syntax_valid(&self, expression: &str) -> Result<(), ExpressionError>;

    fn set_cache_enabled(&self, enabled: bool);

    fn clear_cache(&self);
}
