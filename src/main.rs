//! splitsrc CLI: estimate, plan and read bounded file sources.

use anyhow::Result;
use clap::Parser;
use splitsrc::engine::arg_parser::Cli;
use splitsrc::engine::handle_run;
use std::time::Instant;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
