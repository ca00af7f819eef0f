use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use jadeite_source::FxDashMap;
use serde_json::Value;

use crate::ast::Expr;
use crate::ast::Program;
use crate::interpreter::Interpreter;
use crate::parser::parse_expression;
use crate::parser::parse_program;
use crate::ExpressionError;
use crate::ExpressionHandler;
use crate::Scope;

/// The built-in JavaScript-subset evaluator.
///
/// Parsed expressions and statement lists are cached by source text while
/// caching is enabled. The caches are safe to share across threads.
#[derive(Debug)]
pub struct DefaultExpressionHandler {
    expressions: FxDashMap<String, Arc<Expr>>,
    programs: FxDashMap<String, Arc<Program>>,
    cache_enabled: AtomicBool,
}

impl DefaultExpressionHandler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            expressions: FxDashMap::default(),
            programs: FxDashMap::default(),
            cache_enabled: AtomicBool::new(true),
        }
    }

    #[must_use]
    pub fn cached_entries(&self) -> usize {
        self.expressions.len() + self.programs.len()
    }

    fn caching(&self) -> bool {
        self.cache_enabled.load(Ordering::Relaxed)
    }

    fn expression(&self, source: &str) -> Result<Arc<Expr>, ExpressionError> {
        let source = source.trim();
        if let Some(expr) = self.expressions.get(source) {
            return Ok(Arc::clone(expr.value()));
        }
        let expr = Arc::new(parse_expression(source)?);
        if self.caching() {
            self.expressions
                .insert(source.to_string(), Arc::clone(&expr));
        }
        Ok(expr)
    }

    fn program(&self, source: &str) -> Result<Arc<Program>, ExpressionError> {
        if let Some(program) = self.programs.get(source) {
            return Ok(Arc::clone(program.value()));
        }
        let program = Arc::new(parse_program(source)?);
        if self.caching() {
            self.programs.insert(source.to_string(), Arc::clone(&program));
        }
        Ok(program)
    }
}

impl Default for DefaultExpressionHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpressionHandler for DefaultExpressionHandler {
    fn evaluate_value(
        &self,
        expression: &str,
        scope: &mut dyn Scope,
    ) -> Result<Value, ExpressionError> {
        let expr = self.expression(expression)?;
        Interpreter::new(scope).eval(&expr)
    }

    fn execute(&self, code: &str, scope: &mut dyn Scope) -> Result<Value, ExpressionError> {
        let program = self.program(code)?;
        Interpreter::new(scope).run(&program)
    }

    fn assert_syntax_valid(&self, expression: &str) -> Result<(), ExpressionError> {
        self.expression(expression).map(|_| ())
    }

    fn set_cache_enabled(&self, enabled: bool) {
        self.cache_enabled.store(enabled, Ordering::Relaxed);
        if !enabled {
            self.clear_cache();
        }
    }

    fn clear_cache(&self) {
        tracing::debug!(entries = self.cached_entries(), "clearing expression cache");
        self.expressions.clear();
        self.programs.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use serde_json::json;
    use serde_json::Map;

    use super::*;

    #[test]
    fn evaluates_through_the_trait() {
        let handler = DefaultExpressionHandler::new();
        let mut scope = Map::new();
        scope.insert("name".into(), json!("Bob"));

        assert_eq!(
            handler.evaluate_string("'Hello, ' + name", &mut scope).unwrap(),
            Some("Hello, Bob".to_string())
        );
        assert!(handler.evaluate_boolean("name.length == 3", &mut scope).unwrap());
        assert_eq!(handler.evaluate_string("missing", &mut scope).unwrap(), None);
    }

    #[test]
    fn execute_runs_statements() {
        let handler = DefaultExpressionHandler::new();
        let mut scope = Map::new();
        handler.execute("var count = 2; count++", &mut scope).unwrap();
        assert_eq!(scope.get("count"), Some(&json!(3)));
    }

    #[test]
    fn syntax_check() {
        let handler = DefaultExpressionHandler::new();
        assert!(handler.assert_syntax_valid("'/home'").is_ok());
        assert!(handler.assert_syntax_valid("a + ").is_err());
        assert!(handler.assert_syntax_valid("'/home' title").is_err());
    }

    #[test]
    fn cache_fills_and_clears() {
        let handler = DefaultExpressionHandler::new();
        let mut scope = Map::new();
        handler.evaluate_value("1 + 1", &mut scope).unwrap();
        handler.evaluate_value(" 1 + 1 ", &mut scope).unwrap();
        handler.execute("var a = 1", &mut scope).unwrap();
        assert_eq!(handler.cached_entries(), 2);

        handler.clear_cache();
        assert_eq!(handler.cached_entries(), 0);
    }

    #[test]
    fn disabled_cache_stays_empty() {
        let handler = DefaultExpressionHandler::new();
        handler.set_cache_enabled(false);
        let mut scope = Map::new();
        handler.evaluate_value("1 + 1", &mut scope).unwrap();
        assert_eq!(handler.cached_entries(), 0);
    }

    #[test]
    fn shared_between_threads() {
        let handler = Arc::new(DefaultExpressionHandler::new());
        let workers: Vec<_> = (0..4)
            .map(|n| {
                let handler = Arc::clone(&handler);
                thread::spawn(move || {
                    let mut scope = Map::new();
                    scope.insert("n".into(), json!(n));
                    handler.evaluate_value("n * 10", &mut scope).unwrap()
                })
            })
            .collect();

        let results: Vec<Value> = workers
            .into_iter()
            .map(|worker| worker.join().unwrap())
            .collect();
        assert_eq!(results, vec![json!(0), json!(10), json!(20), json!(30)]);
        assert_eq!(handler.cached_entries(), 1);
    }
}
