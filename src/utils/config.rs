//! Application configuration constants.
//! Tuning and thresholds in one place.

use std::sync::OnceLock;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    pkg_name: &'static str,
    config_filename: String,
    env_prefix: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache names from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                pkg_name: pkg,
                config_filename: format!(".{pkg}.toml"),
                env_prefix: pkg.to_uppercase(),
            }
        })
    }

    pub fn pkg_name(&self) -> &str {
        self.pkg_name
    }

    /// CLI config file looked up in the working directory (e.g. `.splitsrc.toml`).
    pub fn config_filename(&self) -> &str {
        &self.config_filename
    }

    /// Environment variable for the remote-suppression switch (e.g. `SPLITSRC_SUPPRESS_REMOTE`).
    pub fn suppress_remote_env(&self) -> String {
        format!("{}_SUPPRESS_REMOTE", self.env_prefix)
    }
}

// ---- Planning ----

/// Split planning thresholds.
pub struct BundleConsts;

impl BundleConsts {
    /// Floor for the desired bundle size (bytes). Callers may ask for sizes as low as 1. 100 MiB.
    pub const MIN_BUNDLE_SIZE_BYTES: u64 = 100 * (1 << 20);
    /// Desired bundle size the CLI asks for when none is configured. 64 MiB, so the floor wins.
    pub const DEFAULT_BUNDLE_SIZE_BYTES: u64 = 64 * (1 << 20);
}

// ---- Built-in text format ----

pub struct FormatConsts;

impl FormatConsts {
    /// Block size used for split sizing when no override is given (bytes). 32 MiB.
    pub const DEFAULT_BLOCK_SIZE: u64 = 32 * (1 << 20);
    /// A file tail up to this factor of the split size stays in the last split.
    pub const SPLIT_SLOP: f64 = 1.1;
}

/// Override keys understood by the built-in text format.
pub struct ConfKeys;

impl ConfKeys {
    /// `true` to descend into subdirectories of directory resources.
    pub const INPUT_RECURSIVE: &'static str = "fileformat.input.recursive";
    /// Block size (bytes) that split sizing starts from.
    pub const BLOCK_SIZE: &'static str = "fileformat.block.size";
    /// Record delimiter; newline (with `\r\n` handled) when unset.
    pub const RECORD_DELIMITER: &'static str = "textformat.record.delimiter";
}

// ---- Worker threads ----

/// Thread limits for the bundle pipeline.
/// Use [`WorkerThreadLimits::current()`] to fill `all_threads` from rayon; the rest are const.
#[derive(Clone, Copy, Debug)]
pub struct WorkerThreadLimits {
    /// Available threads (from rayon); set by [`WorkerThreadLimits::current()`].
    pub all_threads: usize,
    /// Floor / minimum worker count.
    pub floor: usize,
}

impl Default for WorkerThreadLimits {
    fn default() -> Self {
        Self {
            all_threads: 0, // use current() to set from rayon
            floor: Self::FLOOR_THREADS,
        }
    }
}

impl WorkerThreadLimits {
    pub const FLOOR_THREADS: usize = 1;

    /// Build limits with `all_threads` set from `rayon::current_num_threads()`.
    pub fn current() -> Self {
        Self {
            all_threads: rayon::current_num_threads(),
            ..Self::default()
        }
    }

    /// Workers for `bundles` units: explicit request, else one per thread, never more
    /// workers than bundles, never fewer than the floor.
    pub fn workers_for(&self, requested: Option<usize>, bundles: usize) -> usize {
        requested
            .unwrap_or(self.all_threads)
            .min(bundles)
            .max(self.floor)
    }
}

// ---- Streaming channel cap ----

/// Record channel cap between reader workers and the consumer.
pub const RECORD_CHANNEL_CAP: usize = 10_000;
