//! Everything a source needs from its environment, passed explicitly.

use std::sync::Arc;

use crate::format::{FormatLibrary, FormatRegistry};
use crate::split::{DecodeFn, SplitOrder, SplitRegistry};
use crate::types::InterruptFlag;
use crate::utils::config::BundleConsts;

/// Registries, planning policy, and the interruption signal shared by sources and readers.
///
/// Nothing here is global: two contexts in one process can disagree about remote listing
/// or the bundle floor.
#[derive(Clone, Debug)]
pub struct SourceContext {
    formats: FormatRegistry,
    splits: SplitRegistry,
    suppress_remote_listing: bool,
    min_bundle_size: u64,
    split_order: SplitOrder,
    interrupt: InterruptFlag,
}

impl Default for SourceContext {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl SourceContext {
    /// Builder with the built-in `text` format and `file` split decoder registered.
    pub fn builder() -> SourceContextBuilder {
        SourceContextBuilder {
            formats: FormatRegistry::with_builtin(),
            splits: SplitRegistry::with_builtin(),
            suppress_remote_listing: false,
            min_bundle_size: BundleConsts::MIN_BUNDLE_SIZE_BYTES,
            split_order: SplitOrder::default(),
            interrupt: InterruptFlag::new(),
        }
    }

    pub fn formats(&self) -> &FormatRegistry {
        &self.formats
    }

    pub fn splits(&self) -> &SplitRegistry {
        &self.splits
    }

    /// When set, size estimation reports 0 instead of listing the resource.
    pub fn suppress_remote_listing(&self) -> bool {
        self.suppress_remote_listing
    }

    pub fn min_bundle_size(&self) -> u64 {
        self.min_bundle_size
    }

    pub fn split_order(&self) -> SplitOrder {
        self.split_order
    }

    pub fn interrupt(&self) -> &InterruptFlag {
        &self.interrupt
    }

    /// Same context with `flag` as its interruption signal.
    pub fn with_interrupt(&self, flag: InterruptFlag) -> Self {
        Self {
            interrupt: flag,
            ..self.clone()
        }
    }
}

pub struct SourceContextBuilder {
    formats: FormatRegistry,
    splits: SplitRegistry,
    suppress_remote_listing: bool,
    min_bundle_size: u64,
    split_order: SplitOrder,
    interrupt: InterruptFlag,
}

impl SourceContextBuilder {
    /// Drop the built-in registrations; only what is registered afterwards is known.
    pub fn without_builtin(mut self) -> Self {
        self.formats = FormatRegistry::new();
        self.splits = SplitRegistry::new();
        self
    }

    pub fn format(mut self, library: Arc<dyn FormatLibrary>) -> Self {
        self.formats.register(library);
        self
    }

    pub fn split_decoder(mut self, type_tag: impl Into<String>, decode: DecodeFn) -> Self {
        self.splits.register(type_tag, decode);
        self
    }

    pub fn suppress_remote_listing(mut self, suppress: bool) -> Self {
        self.suppress_remote_listing = suppress;
        self
    }

    pub fn min_bundle_size(mut self, bytes: u64) -> Self {
        self.min_bundle_size = bytes;
        self
    }

    pub fn split_order(mut self, order: SplitOrder) -> Self {
        self.split_order = order;
        self
    }

    /// Share an existing flag, e.g. one a signal handler raises.
    pub fn interrupt(mut self, flag: InterruptFlag) -> Self {
        self.interrupt = flag;
        self
    }

    pub fn build(self) -> SourceContext {
        SourceContext {
            formats: self.formats,
            splits: self.splits,
            suppress_remote_listing: self.suppress_remote_listing,
            min_bundle_size: self.min_bundle_size,
            split_order: self.split_order,
            interrupt: self.interrupt,
        }
    }
}
