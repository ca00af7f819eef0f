use std::fmt;
use std::sync::Arc;

use camino::Utf8Path;
use camino::Utf8PathBuf;
use jadeite_conf::OutputMode;
use jadeite_conf::Settings;
use jadeite_expr::DefaultExpressionHandler;
use jadeite_expr::ExpressionHandler;
use jadeite_expr::Map;
use jadeite_expr::Value;
use jadeite_render::render;
use jadeite_render::render_to_string;
use jadeite_render::Filter;
use jadeite_render::FilterRegistry;
use jadeite_render::Mode;
use jadeite_render::RenderOptions;
use jadeite_render::ScopeModel;
use jadeite_source::DiagnosticRenderer;
use jadeite_source::FxDashMap;
use jadeite_templates::compile;
use jadeite_templates::FileSystemLoader;
use jadeite_templates::Template;
use jadeite_templates::TemplateLoader;
use jadeite_templates::DEFAULT_EXTENSION;

use crate::error::Error;

/// Path given to templates compiled from a string.
const INLINE_PATH: &str = "<string>";

/// Compiles, caches and renders templates from one template root.
///
/// An `Engine` is `Send + Sync`; share it behind an `Arc` to render from
/// many threads. Compiled templates are cached per resolved path until
/// [`Engine::clear_cache`] is called.
pub struct Engine {
    loader: Arc<dyn TemplateLoader>,
    syntax: Arc<dyn ExpressionHandler>,
    filters: FilterRegistry,
    options: RenderOptions,
    cache_enabled: bool,
    cache: FxDashMap<Utf8PathBuf, Arc<Template>>,
}

impl Engine {
    #[must_use]
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// An engine reading templates from `root` with default options.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self::builder().root(root).build()
    }

    #[must_use]
    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    #[must_use]
    pub fn loader(&self) -> &dyn TemplateLoader {
        self.loader.as_ref()
    }

    /// Resolve a template name against the root: `pages/home` and
    /// `/pages/home` both name `<root>/pages/home.pug`.
    pub fn resolve(&self, name: &str) -> Result<Utf8PathBuf, Error> {
        let absolute = format!("/{}", name.trim_start_matches('/'));
        self.loader
            .resolve(self.loader.root(), &absolute)
            .map_err(|_| Error::OutsideRoot {
                name: name.to_string(),
            })
    }

    /// The compiled template called `name`, from the cache when possible.
    pub fn template(&self, name: &str) -> Result<Arc<Template>, Error> {
        let path = self.resolve(name)?;
        if self.cache_enabled {
            if let Some(template) = self.cache.get(&path) {
                tracing::debug!(template = %path, "template cache hit");
                return Ok(Arc::clone(template.value()));
            }
            tracing::debug!(template = %path, "template cache miss");
        }

        let template = Arc::new(self.compile_file(&path)?);
        if self.cache_enabled {
            self.cache.insert(path, Arc::clone(&template));
        }
        Ok(template)
    }

    /// Compile the file at `path`, bypassing the cache.
    pub fn compile_file(&self, path: &Utf8Path) -> Result<Template, Error> {
        let source = self.loader.read(path).map_err(|source| Error::NotFound {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(compile(&source, path, self.loader.as_ref(), self.syntax.as_ref())?)
    }

    /// Compile template source that does not live in a file. `extends` and
    /// `include` resolve against the root.
    pub fn compile_str(&self, source: &str) -> Result<Template, Error> {
        Ok(compile(
            source,
            Utf8Path::new(INLINE_PATH),
            self.loader.as_ref(),
            self.syntax.as_ref(),
        )?)
    }

    pub fn render(&self, name: &str, data: Map<String, Value>) -> Result<String, Error> {
        let template = self.template(name)?;
        self.render_template(&template, data)
    }

    pub fn render_str(&self, source: &str, data: Map<String, Value>) -> Result<String, Error> {
        let template = self.compile_str(source)?;
        self.render_template(&template, data)
    }

    pub fn render_template(
        &self,
        template: &Template,
        data: Map<String, Value>,
    ) -> Result<String, Error> {
        let mut model = ScopeModel::new(data, &self.filters);
        Ok(render_to_string(
            template,
            &mut model,
            self.syntax.as_ref(),
            &self.options,
        )?)
    }

    /// Render into `sink`. Nothing is written when rendering fails.
    pub fn render_to(
        &self,
        name: &str,
        data: Map<String, Value>,
        sink: &mut dyn fmt::Write,
    ) -> Result<(), Error> {
        let template = self.template(name)?;
        let mut model = ScopeModel::new(data, &self.filters);
        render(
            &template,
            &mut model,
            self.syntax.as_ref(),
            &self.options,
            sink,
        )?;
        Ok(())
    }

    /// Drop every compiled template and cached expression.
    pub fn clear_cache(&self) {
        tracing::debug!(templates = self.cache.len(), "clearing template cache");
        self.cache.clear();
        self.syntax.clear_cache();
    }

    #[must_use]
    pub fn cached_templates(&self) -> usize {
        self.cache.len()
    }

    /// Format `error` with an excerpt of the template it points into.
    #[must_use]
    pub fn report(&self, error: &Error, renderer: &DiagnosticRenderer) -> String {
        let source = error
            .location()
            .and_then(|location| self.loader.read(Utf8Path::new(location.file())).ok());
        error.render(source.as_deref(), renderer)
    }

    /// Like [`Engine::report`], for an error returned by
    /// [`Engine::render_str`] or [`Engine::compile_str`] on `source`. Errors
    /// raised inside included or parent files still read those files.
    #[must_use]
    pub fn report_str(&self, error: &Error, source: &str, renderer: &DiagnosticRenderer) -> String {
        match error.location() {
            Some(location) if location.file() == INLINE_PATH => {
                error.render(Some(source), renderer)
            }
            _ => self.report(error, renderer),
        }
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("root", &self.loader.root())
            .field("filters", &self.filters)
            .field("options", &self.options)
            .field("cache_enabled", &self.cache_enabled)
            .field("cached_templates", &self.cache.len())
            .finish_non_exhaustive()
    }
}

/// Configures an [`Engine`].
pub struct EngineBuilder {
    root: Utf8PathBuf,
    extension: String,
    loader: Option<Arc<dyn TemplateLoader>>,
    syntax: Option<Arc<dyn ExpressionHandler>>,
    filters: FilterRegistry,
    options: RenderOptions,
    cache: bool,
    expression_cache: bool,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            root: Utf8PathBuf::from("."),
            extension: DEFAULT_EXTENSION.to_string(),
            loader: None,
            syntax: None,
            filters: FilterRegistry::default(),
            options: RenderOptions::default(),
            cache: true,
            expression_cache: true,
        }
    }
}

impl EngineBuilder {
    /// Start from loaded settings; `project_root` anchors a relative
    /// template root.
    #[must_use]
    pub fn from_settings(settings: &Settings, project_root: &Utf8Path) -> Self {
        Self::default()
            .root(settings.template_root(project_root))
            .extension(settings.extension.clone())
            .pretty(settings.pretty)
            .mode(mode_from_settings(settings.mode))
            .indent(settings.indent)
            .cache(settings.cache)
            .expression_cache(settings.expression_cache)
    }

    /// Root directory of the default file system loader.
    #[must_use]
    pub fn root(mut self, root: impl Into<Utf8PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    #[must_use]
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Load templates through `loader` instead of from disk. `root` and
    /// `extension` are then ignored.
    #[must_use]
    pub fn loader(mut self, loader: impl TemplateLoader + 'static) -> Self {
        self.loader = Some(Arc::new(loader));
        self
    }

    #[must_use]
    pub fn expression_handler(mut self, syntax: impl ExpressionHandler + 'static) -> Self {
        self.syntax = Some(Arc::new(syntax));
        self
    }

    #[must_use]
    pub fn filter(mut self, name: impl Into<String>, filter: impl Filter + 'static) -> Self {
        self.filters.register(name, filter);
        self
    }

    #[must_use]
    pub fn filters(mut self, filters: FilterRegistry) -> Self {
        self.filters = filters;
        self
    }

    #[must_use]
    pub fn options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.options.pretty = pretty;
        self
    }

    #[must_use]
    pub fn mode(mut self, mode: Mode) -> Self {
        self.options.mode = mode;
        self
    }

    #[must_use]
    pub fn indent(mut self, indent: usize) -> Self {
        self.options.indent = indent;
        self
    }

    #[must_use]
    pub fn cache(mut self, enabled: bool) -> Self {
        self.cache = enabled;
        self
    }

    #[must_use]
    pub fn expression_cache(mut self, enabled: bool) -> Self {
        self.expression_cache = enabled;
        self
    }

    #[must_use]
    pub fn build(self) -> Engine {
        let loader = self.loader.unwrap_or_else(|| {
            Arc::new(FileSystemLoader::new(self.root).with_extension(self.extension))
        });
        let syntax = self
            .syntax
            .unwrap_or_else(|| Arc::new(DefaultExpressionHandler::new()));
        syntax.set_cache_enabled(self.expression_cache);

        Engine {
            loader,
            syntax,
            filters: self.filters,
            options: self.options,
            cache_enabled: self.cache,
            cache: FxDashMap::default(),
        }
    }
}

fn mode_from_settings(mode: OutputMode) -> Mode {
    match mode {
        OutputMode::Html => Mode::Html,
        OutputMode::Xhtml => Mode::Xhtml,
        OutputMode::Xml => Mode::Xml,
    }
}

#[cfg(test)]
mod tests {
    use jadeite_source::Location;
    use jadeite_templates::InMemoryLoader;
    use serde_json::json;

    use super::*;

    fn data(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn engine() -> Engine {
        Engine::builder()
            .loader(
                InMemoryLoader::new()
                    .with_file("layout.pug", "html\n  body\n    block content")
                    .with_file("pages/home.pug", "extends ../layout\nblock content\n  h1= title"),
            )
            .build()
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn engines_are_shareable() {
        assert_send_sync::<Engine>();
    }

    #[test]
    fn renders_named_templates() {
        let output = engine()
            .render("pages/home", data(json!({"title": "Home"})))
            .unwrap();
        assert_eq!(output, "<html><body><h1>Home</h1></body></html>");
    }

    #[test]
    fn caches_compiled_templates() {
        let engine = engine();
        let first = engine.template("pages/home").unwrap();
        let second = engine.template("/pages/home.pug").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(engine.cached_templates(), 1);

        engine.clear_cache();
        assert_eq!(engine.cached_templates(), 0);
        let third = engine.template("pages/home").unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(*first, *third);
    }

    #[test]
    fn cache_can_be_disabled() {
        let engine = Engine::builder()
            .loader(InMemoryLoader::new().with_file("a.pug", "p a"))
            .cache(false)
            .build();
        engine.template("a").unwrap();
        assert_eq!(engine.cached_templates(), 0);
    }

    #[test]
    fn names_cannot_leave_the_root() {
        assert!(matches!(
            engine().template("../../etc/passwd"),
            Err(Error::OutsideRoot { .. })
        ));
    }

    #[test]
    fn missing_templates() {
        let err = engine().render("nope", Map::new()).unwrap_err();
        assert!(matches!(err, Error::NotFound { ref path, .. } if path == "nope.pug"));
    }

    #[test]
    fn render_str_and_options() {
        let engine = Engine::builder()
            .loader(InMemoryLoader::new())
            .mode(Mode::Xhtml)
            .filter("upper", |text: &str, _: &Map<String, Value>| text.to_uppercase())
            .build();
        assert_eq!(
            engine.render_str("br\n:upper\n  shout", Map::new()).unwrap(),
            "<br/>SHOUT"
        );
    }

    #[test]
    fn render_to_writes_only_on_success() {
        let engine = Engine::builder()
            .loader(
                InMemoryLoader::new()
                    .with_file("ok.pug", "p ok")
                    .with_file("bad.pug", "p ok\n+missing"),
            )
            .build();

        let mut out = String::new();
        engine.render_to("ok", Map::new(), &mut out).unwrap();
        assert_eq!(out, "<p>ok</p>");

        let mut out = String::new();
        let err = engine.render_to("bad", Map::new(), &mut out).unwrap_err();
        assert_eq!(err.code(), Some("J302"));
        assert!(out.is_empty());
    }

    #[test]
    fn report_includes_an_excerpt() {
        let engine = Engine::builder()
            .loader(InMemoryLoader::new().with_file("bad.pug", "div\n  +missing"))
            .build();
        let err = engine.render("bad", Map::new()).unwrap_err();
        let report = engine.report(&err, &DiagnosticRenderer::plain());
        assert!(report.contains("error[J302]"));
        assert!(report.contains("+missing"));
    }

    #[test]
    fn inline_sources_are_reported_with_an_excerpt() {
        let engine = Engine::builder()
            .loader(InMemoryLoader::new().with_file("part.pug", "p\n  +gone"))
            .build();

        let source = "div\n  +missing";
        let err = engine.render_str(source, Map::new()).unwrap_err();
        assert_eq!(err.location().map(Location::file), Some("<string>"));
        let report = engine.report_str(&err, source, &DiagnosticRenderer::plain());
        assert!(report.contains("error[J302]"));
        assert!(report.contains("<string>"));
        assert!(report.contains("+missing"));

        let source = "include part";
        let err = engine.render_str(source, Map::new()).unwrap_err();
        let report = engine.report_str(&err, source, &DiagnosticRenderer::plain());
        assert!(report.contains("+gone"));
    }

    #[test]
    fn builder_from_settings() {
        let settings = Settings {
            pretty: true,
            mode: OutputMode::Xml,
            indent: 4,
            ..Settings::default()
        };
        let engine = EngineBuilder::from_settings(&settings, Utf8Path::new("/srv/site")).build();
        assert_eq!(
            engine.options(),
            &RenderOptions {
                pretty: true,
                mode: Mode::Xml,
                indent: 4,
            }
        );
        assert_eq!(engine.loader().root(), "/srv/site");
    }
}
