use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::engine::opts::OrderArg;

/// `KEY=VALUE` for `-D`.
fn parse_define(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got {raw}")),
    }
}

/// Plan and read splittable file sources.
#[derive(Clone, Parser)]
#[command(name = "splitsrc")]
#[command(about = "Estimate, plan and read a bounded file source split into bundles.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Subcommand)]
pub enum Commands {
    /// Print the estimated size of RESOURCE in bytes (0 when unknown).
    Size {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Split RESOURCE into bundles and print each as one JSON source per line.
    Plan {
        #[command(flatten)]
        common: CommonArgs,

        /// Write the bundles to this file instead of stdout.
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
    /// Read every record of RESOURCE, or of bundles written by `plan`, with a worker pool.
    Read {
        #[command(flatten)]
        common: CommonArgs,

        /// Read the bundles in this file (one JSON source per line) instead of planning.
        #[arg(long, value_name = "FILE")]
        bundles: Option<PathBuf>,

        /// Worker threads. Default: one per available thread, at most one per bundle.
        #[arg(long, short = 't', value_parser = clap::value_parser!(usize))]
        threads: Option<usize>,

        /// Print only the record and bundle counts.
        #[arg(
            long,
            short = 'c',
            num_args = 0..=1,
            default_missing_value = "true",
            value_parser = clap::value_parser!(bool)
        )]
        count: Option<bool>,
    },
}

#[derive(Clone, Args)]
pub struct CommonArgs {
    /// File, directory or glob to read. Not needed for `read --bundles`.
    #[arg(value_name = "RESOURCE")]
    pub resource: Option<String>,

    /// Registered format library. Default: text.
    #[arg(long, short = 'F')]
    pub format: Option<String>,

    /// Key type (long, text, bytes, void). Default: long.
    #[arg(long)]
    pub key_type: Option<String>,

    /// Value type (long, text, bytes, void). Default: text.
    #[arg(long)]
    pub value_type: Option<String>,

    /// Format library override. Can repeat: -D fileformat.block.size=1048576 -D ...
    #[arg(short = 'D', value_name = "KEY=VALUE", value_parser = parse_define)]
    pub define: Vec<(String, String)>,

    /// Desired bundle size in bytes. Raised to --min-bundle-size when smaller.
    #[arg(long, short = 'b', value_parser = clap::value_parser!(u64))]
    pub bundle_size: Option<u64>,

    /// Floor for the bundle size in bytes. Default: 100 MiB.
    #[arg(long, value_parser = clap::value_parser!(u64))]
    pub min_bundle_size: Option<u64>,

    /// Order bundles are handed out in.
    #[arg(long, value_enum)]
    pub order: Option<OrderArg>,

    /// Seed for a reproducible shuffle.
    #[arg(long, value_parser = clap::value_parser!(u64))]
    pub seed: Option<u64>,

    /// Report size 0 instead of listing the resource (or SPLITSRC_SUPPRESS_REMOTE / .env).
    #[arg(
        long,
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = clap::value_parser!(bool)
    )]
    pub suppress_remote: Option<bool>,

    /// Verbose output.
    #[arg(
        long,
        short = 'v',
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = clap::value_parser!(bool)
    )]
    pub verbose: Option<bool>,
}

impl CommonArgs {
    pub fn resource(&self) -> anyhow::Result<&str> {
        self.resource
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("RESOURCE is required"))
    }
}
