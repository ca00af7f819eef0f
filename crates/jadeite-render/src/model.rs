//! Variable scopes, mixins and filters visible while rendering.

use jadeite_expr::Map;
use jadeite_expr::Scope;
use jadeite_expr::Value;
use jadeite_templates::ast::MixinDefinition;
use rustc_hash::FxHashMap;
use rustc_hash::FxHashSet;

use crate::filters::Filter;
use crate::filters::FilterRegistry;

#[derive(Debug, Default)]
struct Frame {
    values: Map<String, Value>,
    declared: FxHashSet<String>,
}

/// A stack of variable frames over the caller's globals.
///
/// `each` loops, `while` loops and mixin calls push a frame; names declared
/// inside it disappear when it is popped, while plain assignment to an outer
/// name updates that outer binding.
#[derive(Debug)]
pub struct ScopeModel<'t> {
    frames: Vec<Frame>,
    mixins: FxHashMap<String, &'t MixinDefinition>,
    filters: &'t FilterRegistry,
}

impl<'t> ScopeModel<'t> {
    #[must_use]
    pub fn new(globals: Map<String, Value>, filters: &'t FilterRegistry) -> Self {
        Self {
            frames: vec![Frame {
                values: globals,
                declared: FxHashSet::default(),
            }],
            mixins: FxHashMap::default(),
            filters,
        }
    }

    pub fn push(&mut self) {
        self.frames.push(Frame::default());
    }

    /// Drop the innermost frame. The globals frame is never dropped.
    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.values.get(name))
    }

    pub fn declare(&mut self, name: &str, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            frame.declared.insert(name.to_string());
            frame.values.insert(name.to_string(), value);
        }
    }

    pub fn assign(&mut self, name: &str, value: Value) {
        let index = self
            .frames
            .iter()
            .rposition(|frame| frame.declared.contains(name) || frame.values.contains_key(name))
            .unwrap_or(self.frames.len() - 1);
        self.frames[index].values.insert(name.to_string(), value);
    }

    /// The outermost frame, holding the caller's data and any top-level
    /// assignments made while rendering.
    #[must_use]
    pub fn globals(&self) -> &Map<String, Value> {
        &self.frames[0].values
    }

    pub fn register_mixin(&mut self, definition: &'t MixinDefinition) {
        tracing::trace!(mixin = %definition.name, "registering mixin");
        self.mixins.insert(definition.name.clone(), definition);
    }

    #[must_use]
    pub fn mixin(&self, name: &str) -> Option<&'t MixinDefinition> {
        self.mixins.get(name).copied()
    }

    #[must_use]
    pub fn filter(&self, name: &str) -> Option<&'t dyn Filter> {
        self.filters.get(name)
    }
}

impl Scope for ScopeModel<'_> {
    fn get(&self, name: &str) -> Option<&Value> {
        ScopeModel::get(self, name)
    }

    fn declare(&mut self, name: &str, value: Value) {
        ScopeModel::declare(self, name, value);
    }

    fn assign(&mut self, name: &str, value: Value) {
        ScopeModel::assign(self, name, value);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn globals() -> Map<String, Value> {
        let Value::Object(map) = json!({"name": "Bob", "count": 1}) else {
            unreachable!()
        };
        map
    }

    #[test]
    fn inner_frames_shadow_and_disappear() {
        let filters = FilterRegistry::new();
        let mut model = ScopeModel::new(globals(), &filters);

        model.push();
        model.declare("name", json!("Alice"));
        model.declare("local", json!(1));
        assert_eq!(model.get("name"), Some(&json!("Alice")));
        model.pop();

        assert_eq!(model.get("name"), Some(&json!("Bob")));
        assert_eq!(model.get("local"), None);
    }

    #[test]
    fn assignment_updates_the_outer_binding() {
        let filters = FilterRegistry::new();
        let mut model = ScopeModel::new(globals(), &filters);

        model.push();
        model.assign("count", json!(2));
        model.assign("fresh", json!(true));
        model.pop();

        assert_eq!(model.get("count"), Some(&json!(2)));
        assert_eq!(model.get("fresh"), None);
    }

    #[test]
    fn globals_frame_is_never_popped() {
        let filters = FilterRegistry::new();
        let mut model = ScopeModel::new(globals(), &filters);
        model.pop();
        model.pop();
        model.declare("top", json!(true));
        assert_eq!(model.globals().len(), 3);
        assert_eq!(model.globals().get("top"), Some(&json!(true)));
    }

    #[test]
    fn filters_come_from_the_registry() {
        let filters = FilterRegistry::with_builtins();
        let model = ScopeModel::new(Map::new(), &filters);
        assert!(model.filter("cdata").is_some());
        assert!(model.filter("markdown").is_none());
        assert!(model.mixin("card").is_none());
    }
}
