use anyhow::Context;
use anyhow::Result;
use camino::Utf8Path;
use camino::Utf8PathBuf;
use clap::Parser;
use ignore::WalkBuilder;
use jadeite::EngineBuilder;
use jadeite::Settings;

use super::pick_renderer;
use super::resolve_project_root;
use crate::args::Args;
use crate::commands::Command;
use crate::exit::Exit;

#[derive(Debug, Parser)]
pub struct Check {
    /// Files or directories to check. Defaults to the template root.
    paths: Vec<Utf8PathBuf>,
}

impl Command for Check {
    fn execute(&self, _args: &Args) -> Result<Exit> {
        let project_root = resolve_project_root()?;
        let settings = Settings::new(&project_root).context("Failed to load settings")?;
        let engine = EngineBuilder::from_settings(&settings, &project_root)
            .cache(false)
            .build();
        let fmt = pick_renderer();

        let paths: Vec<Utf8PathBuf> = if self.paths.is_empty() {
            vec![settings.template_root(&project_root)]
        } else {
            self.paths
                .iter()
                .map(|p| {
                    if p.is_relative() {
                        project_root.join(p)
                    } else {
                        p.clone()
                    }
                })
                .collect()
        };

        let extension = engine.loader().extension().to_string();
        let files = walk_templates(&paths, &extension);
        tracing::debug!(files = files.len(), "checking templates");

        let mut error_count: usize = 0;
        for path in &files {
            if let Err(err) = engine.compile_file(path) {
                println!("{}\n", engine.report(&err, &fmt));
                error_count += 1;
            }
        }

        if error_count > 0 {
            // Compilation stops at the first error, so each failing file
            // reports exactly one.
            let file_word = if error_count == 1 { "file" } else { "files" };
            let error_word = if error_count == 1 { "error" } else { "errors" };
            Ok(Exit::error().with_message(format!(
                "Found {error_count} {error_word} in {error_count} {file_word}."
            )))
        } else {
            Ok(Exit::success())
        }
    }
}

/// Template files under `paths`, skipping hidden and ignored entries.
/// Explicit file arguments are kept whatever their extension.
fn walk_templates(paths: &[Utf8PathBuf], extension: &str) -> Vec<Utf8PathBuf> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_file() {
            files.push(path.clone());
            continue;
        }

        for entry in WalkBuilder::new(path.as_std_path()).build().flatten() {
            if !entry.file_type().is_some_and(|kind| kind.is_file()) {
                continue;
            }
            let Some(file) = Utf8Path::from_path(entry.path()) else {
                continue;
            };
            if file.extension() == Some(extension) {
                files.push(file.to_path_buf());
            }
        }
    }

    files.sort();
    files.dedup();
    files
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn walks_templates_and_skips_hidden_directories() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        fs::create_dir_all(root.join("pages")).unwrap();
        fs::create_dir_all(root.join(".cache")).unwrap();
        fs::write(root.join("index.pug"), "p").unwrap();
        fs::write(root.join("pages/home.pug"), "p").unwrap();
        fs::write(root.join("pages/notes.txt"), "p").unwrap();
        fs::write(root.join(".cache/old.pug"), "p").unwrap();

        let files = walk_templates(&[root.clone()], "pug");
        assert_eq!(files, vec![root.join("index.pug"), root.join("pages/home.pug")]);
    }

    #[test]
    fn explicit_files_are_kept() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        fs::write(root.join("page.jade"), "p").unwrap();

        let files = walk_templates(&[root.join("page.jade")], "pug");
        assert_eq!(files, vec![root.join("page.jade")]);
    }
}
