//! Text filters applied to `:name` blocks.

use std::fmt;
use std::sync::Arc;

use jadeite_expr::Map;
use jadeite_expr::Value;
use rustc_hash::FxHashMap;

/// Transforms the text of a filter block.
///
/// `attributes` holds the evaluated `:name(key=value)` options.
pub trait Filter: Send + Sync {
    fn apply(&self, text: &str, attributes: &Map<String, Value>) -> String;
}

impl<F> Filter for F
where
    F: Fn(&str, &Map<String, Value>) -> String + Send + Sync,
{
    fn apply(&self, text: &str, attributes: &Map<String, Value>) -> String {
        self(text, attributes)
    }
}

/// Wraps the text in a CDATA section.
#[derive(Clone, Copy, Debug, Default)]
pub struct CdataFilter;

impl Filter for CdataFilter {
    fn apply(&self, text: &str, _attributes: &Map<String, Value>) -> String {
        format!("<![CDATA[\n{text}\n]]>")
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct CssFilter;

impl Filter for CssFilter {
    fn apply(&self, text: &str, _attributes: &Map<String, Value>) -> String {
        format!(r#"<style type="text/css">{text}</style>"#)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct JsFilter;

impl Filter for JsFilter {
    fn apply(&self, text: &str, _attributes: &Map<String, Value>) -> String {
        format!(r#"<script type="text/javascript">{text}</script>"#)
    }
}

/// Filters available to templates, by name.
///
/// [`FilterRegistry::default`] carries the built-in `cdata`, `css` and `js`
/// filters; [`FilterRegistry::new`] starts empty.
#[derive(Clone)]
pub struct FilterRegistry {
    filters: FxHashMap<String, Arc<dyn Filter>>,
}

impl FilterRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            filters: FxHashMap::default(),
        }
    }

    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("cdata", CdataFilter);
        registry.register("css", CssFilter);
        registry.register("js", JsFilter);
        registry
    }

    /// Add a filter, replacing any filter already registered as `name`.
    pub fn register(&mut self, name: impl Into<String>, filter: impl Filter + 'static) {
        self.filters.insert(name.into(), Arc::new(filter));
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn Filter> {
        self.filters.get(name).map(AsRef::as_ref)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.filters.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("FilterRegistry")
            .field("filters", &names)
            .finish()
    }
}
