//! CLI entry: dispatch the parsed subcommand to its handler.

use anyhow::Result;

use crate::engine::arg_parser::{Cli, Commands};
use crate::engine::handlers::{handle_plan, handle_read, handle_size};

pub fn handle_run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Size { common } => handle_size(common),
        Commands::Plan { common, output } => handle_plan(common, output.as_deref()),
        Commands::Read {
            common,
            bundles,
            threads,
            count,
        } => handle_read(common, bundles.as_ref(), *threads, count.unwrap_or(false)),
    }
}
