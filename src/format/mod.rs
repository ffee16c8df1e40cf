//! Format library capability: listing, split discovery and record cursors.
//!
//! The source and reader only ever talk to these traits. [`TextLineFormat`] is the built-in
//! local-filesystem implementation; callers can register their own in a [`FormatRegistry`].

pub mod file_split;
pub mod listing;
pub mod text;

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::Arc;

use crate::types::{DatumRef, FileStatus, InterruptFlag, Overrides, SplitSize};

pub use file_split::FileSplit;
pub use listing::{is_remote_resource, resolve_listing};
pub use text::{TextLineCursor, TextLineFormat};

/// A backend-specific unit of work, opaque to the source except for size and serialization.
pub trait SplitDescriptor: fmt::Debug + Send + Sync {
    /// Stable tag a [`SplitRegistry`](crate::split::SplitRegistry) decoder is registered under.
    fn type_tag(&self) -> &'static str;

    /// Size of the unit in bytes.
    fn length(&self) -> u64;

    /// Write a self-describing payload the registered decoder can rebuild this split from.
    /// Descriptors that cannot be shipped return `ErrorKind::Unsupported`.
    fn write_payload(&self, out: &mut dyn io::Write) -> io::Result<()>;

    fn as_any(&self) -> &dyn Any;
}

/// Sequential cursor over the key/value pairs of one split.
pub trait RecordCursor: Send {
    /// Move to the next pair. The returned values borrow the cursor's buffers, which are
    /// reused by the next call; copy them before storing.
    fn next_pair(&mut self) -> io::Result<Option<(DatumRef<'_>, DatumRef<'_>)>>;

    /// Fraction of this split consumed so far, or `None` if the backend cannot tell.
    fn progress(&self) -> Option<f64>;

    fn close(&mut self) -> io::Result<()>;
}

/// External file-format library: resolves resources, computes splits, opens cursors.
pub trait FormatLibrary: fmt::Debug + Send + Sync {
    /// Name sources use as their format descriptor.
    fn name(&self) -> &str;

    /// Every file the resource identifier resolves to, with its length.
    fn listing(&self, resource: &str, overrides: &Overrides) -> io::Result<Vec<FileStatus>>;

    /// Partition the resource into splits. `size: None` means "use the library default".
    fn discover_splits(
        &self,
        resource: &str,
        overrides: &Overrides,
        size: Option<SplitSize>,
    ) -> io::Result<Vec<Arc<dyn SplitDescriptor>>>;

    fn open_cursor(
        &self,
        split: &dyn SplitDescriptor,
        overrides: &Overrides,
        interrupt: &InterruptFlag,
    ) -> io::Result<Box<dyn RecordCursor>>;
}

/// Format libraries by name.
#[derive(Clone, Default)]
pub struct FormatRegistry {
    libraries: HashMap<String, Arc<dyn FormatLibrary>>,
}

impl FormatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with [`TextLineFormat`] registered as `text`.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(TextLineFormat));
        registry
    }

    /// Register under the library's own name, replacing any previous entry.
    pub fn register(&mut self, library: Arc<dyn FormatLibrary>) {
        self.libraries.insert(library.name().to_string(), library);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn FormatLibrary>> {
        self.libraries.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.libraries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatRegistry")
            .field("libraries", &self.names())
            .finish()
    }
}
