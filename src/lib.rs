//! splitsrc: splittable bounded file source with shippable split handles

pub mod context;
pub mod engine;
pub mod error;
pub mod format;
pub mod pipeline;
pub mod source;
pub mod split;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

pub use context::{SourceContext, SourceContextBuilder};
pub use error::{SourceError, SourceResult};
pub use format::{FormatLibrary, FormatRegistry, RecordCursor, SplitDescriptor};
pub use source::{
    BoundedReader, BoundedSource, BoundedSourceBuilder, ElementEncoding, KvEncoding, ReaderState,
};
pub use split::{SplitHandle, SplitOrder, SplitPlanner, SplitRegistry};

/// Result alias used by the application-level API (CLI, pipeline)
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Plan `source` into bundles and read all of them with a worker pool, collecting every
/// record. Record order across bundles is unspecified.
///
/// `num_threads: None` uses one worker per available thread (at most one per bundle).
pub fn read_all(
    source: &BoundedSource,
    desired_bundle_size_bytes: u64,
    ctx: &SourceContext,
    num_threads: Option<usize>,
) -> Result<Vec<KvPair>> {
    let bundles = source.split_into_bundles(desired_bundle_size_bytes, ctx)?;
    let mut records = Vec::new();
    pipeline::read_bundles(bundles, ctx, num_threads, None, |pair| {
        records.push(pair.clone());
        Ok(())
    })?;
    Ok(records)
}
