use std::io::Read as _;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use camino::Utf8Path;
use camino::Utf8PathBuf;
use clap::Parser;
use clap::ValueEnum;
use jadeite::EngineBuilder;
use jadeite::Map;
use jadeite::Mode;
use jadeite::Settings;
use jadeite::Value;

use super::pick_renderer;
use super::resolve_project_root;
use crate::args::Args;
use crate::commands::Command;
use crate::exit::Exit;

#[derive(Debug, Parser)]
pub struct Render {
    /// Template to render, as a path or a name under the template root.
    template: Utf8PathBuf,

    /// JSON file holding the template data object; `-` reads stdin.
    #[arg(long, short)]
    data: Option<String>,

    /// Indent nested tags on their own lines.
    #[arg(long)]
    pretty: bool,

    /// Output mode; a doctype in the template overrides it.
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Directory templates are loaded from.
    #[arg(long)]
    root: Option<Utf8PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    Html,
    Xhtml,
    Xml,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Html => Mode::Html,
            ModeArg::Xhtml => Mode::Xhtml,
            ModeArg::Xml => Mode::Xml,
        }
    }
}

impl Command for Render {
    fn execute(&self, _args: &Args) -> Result<Exit> {
        let project_root = resolve_project_root()?;
        let settings = Settings::new(&project_root).context("Failed to load settings")?;

        let mut builder = EngineBuilder::from_settings(&settings, &project_root);
        let root = match &self.root {
            Some(root) => absolute(&project_root, root),
            None => settings.template_root(&project_root),
        };
        builder = builder.root(root.clone());
        if self.pretty {
            builder = builder.pretty(true);
        }
        if let Some(mode) = self.mode {
            builder = builder.mode(mode.into());
        }
        let engine = builder.build();

        let data = match self.data.as_deref() {
            Some(source) => read_data(source)?,
            None => Map::new(),
        };

        let name = template_name(&project_root, &root, &self.template);
        tracing::info!(template = %name, root = %root, "rendering");

        match engine.render(&name, data) {
            Ok(html) => {
                println!("{html}");
                Ok(Exit::success())
            }
            Err(err) => {
                eprintln!("{}", engine.report(&err, &pick_renderer()));
                Ok(Exit::error())
            }
        }
    }
}

fn absolute(project_root: &Utf8Path, path: &Utf8Path) -> Utf8PathBuf {
    if path.is_relative() {
        project_root.join(path)
    } else {
        path.to_path_buf()
    }
}

/// A path inside the template root becomes a root-relative name; anything
/// else is taken as a name already.
fn template_name(project_root: &Utf8Path, root: &Utf8Path, template: &Utf8Path) -> String {
    let path = absolute(project_root, template);
    match path.strip_prefix(root) {
        Ok(relative) => relative.to_string(),
        Err(_) => template.to_string(),
    }
}

fn read_data(source: &str) -> Result<Map<String, Value>> {
    let text = if source == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read data from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(source)
            .with_context(|| format!("Failed to read data file `{source}`"))?
    };

    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("Data in `{source}` is not valid JSON"))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => bail!("Data in `{source}` must be a JSON object"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_under_the_root_become_names() {
        let project = Utf8Path::new("/srv/site");
        let root = Utf8Path::new("/srv/site/views");
        assert_eq!(
            template_name(project, root, Utf8Path::new("views/pages/home.pug")),
            "pages/home.pug"
        );
        assert_eq!(
            template_name(project, root, Utf8Path::new("/srv/site/views/index.pug")),
            "index.pug"
        );
    }

    #[test]
    fn other_paths_are_names() {
        let project = Utf8Path::new("/srv/site");
        let root = Utf8Path::new("/srv/site/views");
        assert_eq!(
            template_name(project, root, Utf8Path::new("pages/home")),
            "pages/home"
        );
    }
}
