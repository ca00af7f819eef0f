//! Where `extends` and `include` find their templates.
//!
//! The parser never touches the filesystem itself; it asks a
//! [`TemplateLoader`] to resolve a referenced path against the current
//! template and to read it. [`FileSystemLoader`] reads from disk,
//! [`InMemoryLoader`] serves a fixed set of sources (tests, embedding).

use std::io;

use camino::Utf8Path;
use camino::Utf8PathBuf;
use jadeite_source::path::safe_join;
use jadeite_source::path::SafeJoinError;
use rustc_hash::FxHashMap;

pub const DEFAULT_EXTENSION: &str = "pug";

pub trait TemplateLoader: Send + Sync {
    /// Directory every resolved template must stay under.
    fn root(&self) -> &Utf8Path;

    /// Extension of template files, without the dot.
    fn extension(&self) -> &str;

    fn read(&self, path: &Utf8Path) -> io::Result<String>;

    /// Resolve `referenced` as written in `current`.
    ///
    /// A leading `/` makes the path relative to the root, otherwise it is
    /// relative to the directory of `current`. A path without an extension
    /// gets the template extension.
    fn resolve(
        &self,
        current: &Utf8Path,
        referenced: &str,
    ) -> Result<Utf8PathBuf, SafeJoinError> {
        let referenced = referenced.trim();
        let mut name = referenced.to_string();
        if Utf8Path::new(referenced).extension().is_none() {
            name.push('.');
            name.push_str(self.extension());
        }

        let root = self.root();
        if let Some(absolute) = name.strip_prefix('/') {
            return safe_join(root, absolute);
        }

        let directory = current.parent().unwrap_or(Utf8Path::new(""));
        let directory = directory.strip_prefix(root).unwrap_or(directory);
        safe_join(root, directory.join(&name).as_str())
    }
}

/// Reads templates from disk under a root directory.
#[derive(Clone, Debug)]
pub struct FileSystemLoader {
    root: Utf8PathBuf,
    extension: String,
}

impl FileSystemLoader {
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            root: root.into(),
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }

    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }
}

impl TemplateLoader for FileSystemLoader {
    fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn extension(&self) -> &str {
        &self.extension
    }

    fn read(&self, path: &Utf8Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }
}

/// Serves templates from memory, keyed by their path under the root.
#[derive(Clone, Debug)]
pub struct InMemoryLoader {
    root: Utf8PathBuf,
    extension: String,
    files: FxHashMap<Utf8PathBuf, String>,
}

impl InMemoryLoader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: Utf8PathBuf::from("."),
            extension: DEFAULT_EXTENSION.to_string(),
            files: FxHashMap::default(),
        }
    }

    /// Add a file; `path` is relative to the root.
    #[must_use]
    pub fn with_file(mut self, path: &str, source: &str) -> Self {
        self.insert(path, source);
        self
    }

    pub fn insert(&mut self, path: &str, source: &str) {
        let path = jadeite_source::path::clean_utf8_path(&self.root.join(path));
        self.files.insert(path, source.to_string());
    }
}

impl Default for InMemoryLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateLoader for InMemoryLoader {
    fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn extension(&self) -> &str {
        &self.extension
    }

    fn read(&self, path: &Utf8Path) -> io::Result<String> {
        self.files
            .get(&jadeite_source::path::clean_utf8_path(path))
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no template at `{path}`")))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    mod resolve {
        use super::*;

        #[test]
        fn relative_to_current_file() {
            let loader = FileSystemLoader::new("/srv/views");
            assert_eq!(
                loader
                    .resolve(Utf8Path::new("/srv/views/pages/home.pug"), "../layout")
                    .unwrap(),
                Utf8PathBuf::from("/srv/views/layout.pug")
            );
        }

        #[test]
        fn leading_slash_is_root_relative() {
            let loader = FileSystemLoader::new("/srv/views");
            assert_eq!(
                loader
                    .resolve(Utf8Path::new("/srv/views/pages/home.pug"), "/mixins/forms")
                    .unwrap(),
                Utf8PathBuf::from("/srv/views/mixins/forms.pug")
            );
        }

        #[test]
        fn keeps_explicit_extension() {
            let loader = FileSystemLoader::new("/srv/views");
            assert_eq!(
                loader
                    .resolve(Utf8Path::new("/srv/views/home.pug"), "style.css")
                    .unwrap(),
                Utf8PathBuf::from("/srv/views/style.css")
            );
        }

        #[test]
        fn refuses_to_leave_the_root() {
            let loader = FileSystemLoader::new("/srv/views");
            assert!(loader
                .resolve(Utf8Path::new("/srv/views/home.pug"), "../../etc/passwd")
                .is_err());
        }

        #[test]
        fn relative_root() {
            let loader = InMemoryLoader::new();
            assert_eq!(
                loader
                    .resolve(Utf8Path::new("pages/home.pug"), "../layout")
                    .unwrap(),
                Utf8PathBuf::from("layout.pug")
            );
        }
    }

    #[test]
    fn in_memory_reads_what_was_inserted() {
        let loader = InMemoryLoader::new().with_file("layout.pug", "html");
        assert_eq!(loader.read(Utf8Path::new("layout.pug")).unwrap(), "html");
        assert_eq!(loader.read(Utf8Path::new("./layout.pug")).unwrap(), "html");
        assert_eq!(
            loader.read(Utf8Path::new("missing.pug")).unwrap_err().kind(),
            io::ErrorKind::NotFound
        );
    }

    #[test]
    fn file_system_reads_from_disk() {
        let dir = tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        fs::write(root.join("index.pug"), "p hi").unwrap();

        let loader = FileSystemLoader::new(root.clone()).with_extension("jade");
        assert_eq!(loader.extension(), "jade");
        assert_eq!(loader.read(&root.join("index.pug")).unwrap(), "p hi");
        assert!(loader.read(&root.join("missing.pug")).is_err());
    }
}
