//! Load `.splitsrc.toml` from a directory (CLI only). Library callers configure through
//! `SourceContext` and `BoundedSource` directly.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::engine::opts::{CliOpts, OrderArg};
use crate::types::TypeTag;
use crate::utils::config::PackagePaths;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SplitsrcToml {
    #[serde(default)]
    settings: SettingsSection,
    /// Passed to the format library as-is; non-string values are stringified.
    #[serde(default)]
    overrides: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct SettingsSection {
    format: Option<String>,
    key_type: Option<String>,
    value_type: Option<String>,
    bundle_size: Option<u64>,
    min_bundle_size: Option<u64>,
    order: Option<OrderArg>,
    seed: Option<u64>,
    suppress_remote: Option<bool>,
    threads: Option<usize>,
    verbose: Option<bool>,
}

/// Load the config file from `dir` if present. None if missing; a malformed file is logged
/// and ignored.
pub(crate) fn load_splitsrc_toml(dir: &Path) -> Option<SplitsrcToml> {
    let path = dir.join(PackagePaths::get().config_filename());
    let s = std::fs::read_to_string(&path).ok()?;
    toml::from_str(&s)
        .map_err(|e| log::warn!("{}: {}", path.display(), e))
        .ok()
}

/// Overwrite opts field from file when present.
macro_rules! apply_file_opt {
    ($section:expr, $opts:expr, $field:ident) => {
        if let Some(v) = $section.$field.clone() {
            $opts.$field = v;
        }
    };
    ($section:expr, $opts:expr, $field:ident => Some) => {
        if let Some(v) = $section.$field.clone() {
            $opts.$field = Some(v);
        }
    };
}

/// Apply file config to opts (only fields present in the file). Call before env and CLI.
pub(crate) fn apply_file_to_opts(file: &SplitsrcToml, opts: &mut CliOpts) {
    let settings = &file.settings;
    apply_file_opt!(settings, opts, format);
    if let Some(tag) = &settings.key_type {
        opts.key_type = TypeTag::from_name(tag);
    }
    if let Some(tag) = &settings.value_type {
        opts.value_type = TypeTag::from_name(tag);
    }
    apply_file_opt!(settings, opts, bundle_size);
    apply_file_opt!(settings, opts, min_bundle_size);
    apply_file_opt!(settings, opts, order);
    apply_file_opt!(settings, opts, seed => Some);
    apply_file_opt!(settings, opts, suppress_remote);
    apply_file_opt!(settings, opts, threads => Some);
    apply_file_opt!(settings, opts, verbose);
    for (key, value) in &file.overrides {
        let value = match value {
            toml::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        opts.overrides.insert(key.clone(), value);
    }
}
