use anyhow::Result;
use clap::Parser;

use crate::args::Args;
use crate::commands::Command;
use crate::commands::JadeiteCommand;
use crate::exit::Exit;
use crate::logging;

/// The main CLI structure that defines the command-line interface
#[derive(Parser)]
#[command(name = "jadeite")]
#[command(version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: JadeiteCommand,

    #[command(flatten)]
    pub args: Args,
}

/// Parse CLI arguments and execute the chosen command
pub fn run(args: Vec<String>) -> Result<Exit> {
    let cli = Cli::try_parse_from(args).unwrap_or_else(|e| {
        e.exit();
    });

    logging::init(&cli.args.global);
    cli.command.execute(&cli.args)
}
