//! Resolved CLI settings. Precedence: defaults, then `.splitsrc.toml`, then `.env` and the
//! environment, then command-line flags.

use clap::ValueEnum;
use serde::Deserialize;
use std::path::Path;

use crate::context::SourceContext;
use crate::engine::arg_parser::CommonArgs;
use crate::format::TextLineFormat;
use crate::source::BoundedSource;
use crate::split::SplitOrder;
use crate::types::{InterruptFlag, Overrides, RecordKind, TypeTag};
use crate::utils::config::{BundleConsts, PackagePaths};
use crate::utils::splitsrc_toml::{apply_file_to_opts, load_splitsrc_toml};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderArg {
    #[default]
    Shuffle,
    Discovery,
}

#[derive(Clone, Debug)]
pub struct CliOpts {
    pub format: String,
    pub key_type: TypeTag,
    pub value_type: TypeTag,
    pub overrides: Overrides,
    pub bundle_size: u64,
    pub min_bundle_size: u64,
    pub order: OrderArg,
    pub seed: Option<u64>,
    pub suppress_remote: bool,
    pub threads: Option<usize>,
    pub verbose: bool,
}

impl Default for CliOpts {
    fn default() -> Self {
        Self {
            format: TextLineFormat::NAME.to_string(),
            key_type: TypeTag::Record(RecordKind::Long),
            value_type: TypeTag::Record(RecordKind::Text),
            overrides: Overrides::new(),
            bundle_size: BundleConsts::DEFAULT_BUNDLE_SIZE_BYTES,
            min_bundle_size: BundleConsts::MIN_BUNDLE_SIZE_BYTES,
            order: OrderArg::Shuffle,
            seed: None,
            suppress_remote: false,
            threads: None,
            verbose: false,
        }
    }
}

fn parse_env_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Overwrite opts field from CLI when given.
macro_rules! apply_cli_opt {
    ($args:expr, $opts:expr, $field:ident) => {
        if let Some(v) = $args.$field.clone() {
            $opts.$field = v;
        }
    };
}

impl CliOpts {
    /// Resolve settings for a command run from `dir`.
    pub fn resolve(dir: &Path, args: &CommonArgs) -> Self {
        let mut opts = Self::default();
        if let Some(file) = load_splitsrc_toml(dir) {
            apply_file_to_opts(&file, &mut opts);
        }
        opts.apply_env(dir);
        opts.apply_cli(args);
        opts
    }

    /// `.env` in `dir` does not override variables already set in the environment.
    fn apply_env(&mut self, dir: &Path) {
        let env_path = dir.join(".env");
        if env_path.is_file() {
            let _ = dotenvy::from_path(&env_path);
        }
        let key = PackagePaths::get().suppress_remote_env();
        if let Ok(raw) = std::env::var(&key) {
            match parse_env_bool(&raw) {
                Some(v) => self.suppress_remote = v,
                None => log::warn!("{key}={raw}: expected true or false, ignoring"),
            }
        }
    }

    fn apply_cli(&mut self, args: &CommonArgs) {
        apply_cli_opt!(args, self, format);
        if let Some(tag) = &args.key_type {
            self.key_type = TypeTag::from_name(tag);
        }
        if let Some(tag) = &args.value_type {
            self.value_type = TypeTag::from_name(tag);
        }
        apply_cli_opt!(args, self, bundle_size);
        apply_cli_opt!(args, self, min_bundle_size);
        apply_cli_opt!(args, self, order);
        if args.seed.is_some() {
            self.seed = args.seed;
        }
        apply_cli_opt!(args, self, suppress_remote);
        apply_cli_opt!(args, self, verbose);
        self.overrides.extend(args.define.iter().cloned());
    }

    /// An explicit seed turns the shuffle deterministic.
    pub fn split_order(&self) -> SplitOrder {
        match (self.order, self.seed) {
            (OrderArg::Discovery, _) => SplitOrder::Discovery,
            (OrderArg::Shuffle, Some(seed)) => SplitOrder::Seeded(seed),
            (OrderArg::Shuffle, None) => SplitOrder::Shuffle,
        }
    }

    pub fn context(&self, interrupt: InterruptFlag) -> SourceContext {
        SourceContext::builder()
            .suppress_remote_listing(self.suppress_remote)
            .min_bundle_size(self.min_bundle_size)
            .split_order(self.split_order())
            .interrupt(interrupt)
            .build()
    }

    pub fn source(&self, resource: &str) -> BoundedSource {
        BoundedSource::builder()
            .resource(resource)
            .format(self.format.as_str())
            .key_type(self.key_type.clone())
            .value_type(self.value_type.clone())
            .overrides(self.overrides.clone())
            .build()
    }
}
