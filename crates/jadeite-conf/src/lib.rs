use std::path::Path;
use std::path::PathBuf;

use camino::Utf8Path;
use camino::Utf8PathBuf;
use config::Config;
use config::ConfigError as ExternalConfigError;
use config::Environment;
use config::File;
use config::FileFormat;
use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration build/deserialize error")]
    Config(#[from] ExternalConfigError),
}

/// Output mode as written in configuration files.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    #[default]
    Html,
    Xhtml,
    Xml,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub pretty: bool,
    pub mode: OutputMode,
    /// Template root; relative paths are taken from the project root.
    pub root: Option<Utf8PathBuf>,
    pub extension: String,
    /// Cache compiled templates.
    pub cache: bool,
    /// Cache parsed expressions.
    pub expression_cache: bool,
    pub indent: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            pretty: false,
            mode: OutputMode::Html,
            root: None,
            extension: "pug".to_string(),
            cache: true,
            expression_cache: true,
            indent: 2,
        }
    }
}

impl Settings {
    pub fn new(project_root: &Utf8Path) -> Result<Self, ConfigError> {
        let user_config_file = ProjectDirs::from("org", "jadeite", "jadeite")
            .map(|proj_dirs| proj_dirs.config_dir().join("jadeite.toml"));

        Self::load_from_paths(project_root, user_config_file.as_deref(), None)
    }

    /// Layer, lowest priority first: the user config file, `.jadeite.toml`,
    /// `jadeite.toml`, then `JADEITE_*` variables. `env` replaces the process
    /// environment when given.
    fn load_from_paths(
        project_root: &Utf8Path,
        user_config_path: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = user_config_path {
            tracing::debug!(path = %path.display(), "reading user settings");
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }

        for name in [".jadeite.toml", "jadeite.toml"] {
            builder = builder.add_source(
                File::from(PathBuf::from(project_root.join(name)))
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        builder = builder.add_source(
            Environment::with_prefix("JADEITE")
                .try_parsing(true)
                .source(env),
        );

        let config = builder.build()?;
        let settings = config.try_deserialize()?;
        Ok(settings)
    }

    /// The directory templates are loaded from.
    #[must_use]
    pub fn template_root(&self, project_root: &Utf8Path) -> Utf8PathBuf {
        match &self.root {
            Some(root) if root.is_absolute() => root.clone(),
            Some(root) => project_root.join(root),
            None => project_root.to_path_buf(),
        }
    }
}
