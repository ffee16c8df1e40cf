//! Command handlers for size, plan and read

use anyhow::{Context, Result};
use kdam::Animation;
use log::{debug, info, warn};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::engine::arg_parser::CommonArgs;
use crate::engine::opts::CliOpts;
use crate::engine::progress::{ProgressBarConfig, create_progress_bar, finish_bar, refresh_bar};
use crate::pipeline::read_bundles;
use crate::source::BoundedSource;
use crate::types::InterruptFlag;
use crate::utils::setup_logging;

/// Setup logging and resolve opts from the working directory and CommonArgs
fn setup_operation(common: &CommonArgs) -> Result<CliOpts> {
    let cwd = std::env::current_dir().context("current directory")?;
    let opts = CliOpts::resolve(&cwd, common);
    setup_logging(opts.verbose);
    debug!(
        "{} CONFIG:{:#?}",
        env!("CARGO_PKG_NAME").to_uppercase(),
        opts
    );
    Ok(opts)
}

/// Handle size command
pub fn handle_size(common: &CommonArgs) -> Result<()> {
    let opts = setup_operation(common)?;
    let source = opts.source(common.resource()?);
    let ctx = opts.context(InterruptFlag::new());
    println!("{}", source.estimated_size_bytes(&ctx));
    Ok(())
}

/// Handle plan command: one JSON line per bundle.
pub fn handle_plan(common: &CommonArgs, output: Option<&Path>) -> Result<()> {
    let opts = setup_operation(common)?;
    let resource = common.resource()?;
    let source = opts.source(resource);
    let ctx = opts.context(InterruptFlag::new());
    let bundles = source
        .split_into_bundles(opts.bundle_size, &ctx)
        .with_context(|| format!("plan {resource}"))?;

    let mut out: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    for bundle in &bundles {
        writeln!(out, "{}", bundle.to_json().context("serialize bundle")?)?;
    }
    out.flush()?;
    if let Some(path) = output {
        info!("Wrote {} bundles to {}", bundles.len(), path.display());
    }
    Ok(())
}

/// Bundles previously written by `plan`, blank lines skipped.
pub fn load_bundles(path: &Path) -> Result<Vec<BoundedSource>> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut bundles = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let bundle = BoundedSource::from_json(&line)
            .with_context(|| format!("{}:{}: not a bundle", path.display(), i + 1))?;
        bundles.push(bundle);
    }
    Ok(bundles)
}

/// Handle read command: plan (or load) bundles, read them on a worker pool.
pub fn handle_read(
    common: &CommonArgs,
    bundles_file: Option<&PathBuf>,
    threads: Option<usize>,
    count_only: bool,
) -> Result<()> {
    let mut opts = setup_operation(common)?;
    if threads.is_some() {
        opts.threads = threads;
    }

    let interrupt = InterruptFlag::new();
    let handler_flag = interrupt.clone();
    ctrlc::set_handler(move || {
        handler_flag.raise();
    })
    .context("set Ctrl+C handler")?;
    let ctx = opts.context(interrupt);

    let bundles = match bundles_file {
        Some(path) => {
            if common.resource.is_some() {
                warn!("RESOURCE is ignored when --bundles is given");
            }
            load_bundles(path)?
        }
        None => {
            let resource = common.resource()?;
            opts.source(resource)
                .split_into_bundles(opts.bundle_size, &ctx)
                .with_context(|| format!("plan {resource}"))?
        }
    };
    info!("Reading {} bundles", bundles.len());

    let bar = create_progress_bar(ProgressBarConfig::new(
        bundles.len(),
        "Reading",
        Animation::Classic,
    ));
    refresh_bar(&bar);

    let mut out = BufWriter::new(io::stdout().lock());
    let summary = read_bundles(bundles, &ctx, opts.threads, Some(&bar), |pair| {
        if !count_only {
            writeln!(out, "{}\t{}", pair.key, pair.value)?;
        }
        Ok(())
    });
    finish_bar(&bar);
    out.flush()?;
    let summary = summary?;

    if count_only {
        println!("{} records in {} bundles", summary.records, summary.bundles);
    } else {
        info!(
            "Read {} records from {} bundles",
            summary.records, summary.bundles
        );
    }
    Ok(())
}
