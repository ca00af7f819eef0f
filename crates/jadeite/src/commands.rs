mod check;
mod render;

use std::io::IsTerminal;

use anyhow::Context;
use anyhow::Result;
use camino::Utf8PathBuf;
use clap::Subcommand;
use jadeite::DiagnosticRenderer;

use crate::args::Args;
use crate::exit::Exit;

pub trait Command {
    fn execute(&self, args: &Args) -> Result<Exit>;
}

#[derive(Debug, Subcommand)]
pub enum JadeiteCommand {
    /// Render a template to stdout
    Render(self::render::Render),
    /// Compile templates and report every error
    Check(self::check::Check),
}

impl Command for JadeiteCommand {
    fn execute(&self, args: &Args) -> Result<Exit> {
        match self {
            JadeiteCommand::Render(command) => command.execute(args),
            JadeiteCommand::Check(command) => command.execute(args),
        }
    }
}

fn resolve_project_root() -> Result<Utf8PathBuf> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    Utf8PathBuf::from_path_buf(cwd)
        .map_err(|_| anyhow::anyhow!("Current directory is not valid UTF-8"))
}

fn pick_renderer() -> DiagnosticRenderer {
    if std::io::stderr().is_terminal() {
        DiagnosticRenderer::styled()
    } else {
        DiagnosticRenderer::plain()
    }
}
