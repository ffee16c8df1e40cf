//! Serializable wrapper around a backend split, plus the registry that decodes it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::{Arc, OnceLock};

use crate::error::{SourceError, SourceResult};
use crate::format::{FileSplit, SplitDescriptor};

/// Rebuilds a split from the payload its `write_payload` produced.
pub type DecodeFn = fn(&[u8]) -> io::Result<Arc<dyn SplitDescriptor>>;

/// Decoders keyed by split type tag. Populated explicitly at startup; a split whose tag is
/// not registered here cannot be wrapped in a [`SplitHandle`].
#[derive(Clone, Default)]
pub struct SplitRegistry {
    decoders: HashMap<String, DecodeFn>,
}

impl SplitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with [`FileSplit`] registered.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(FileSplit::TYPE_TAG, FileSplit::decode);
        registry
    }

    pub fn register(&mut self, type_tag: impl Into<String>, decode: DecodeFn) {
        self.decoders.insert(type_tag.into(), decode);
    }

    pub fn contains(&self, type_tag: &str) -> bool {
        self.decoders.contains_key(type_tag)
    }

    pub fn decode(&self, type_tag: &str, payload: &[u8]) -> SourceResult<Arc<dyn SplitDescriptor>> {
        let decode = self.decoders.get(type_tag).ok_or_else(|| {
            SourceError::Split(format!("no decoder registered for split type {type_tag}"))
        })?;
        decode(payload)
            .map_err(|e| SourceError::Split(format!("cannot decode {type_tag} split: {e}")))
    }

    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.decoders.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }
}

impl fmt::Debug for SplitRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SplitRegistry")
            .field("tags", &self.tags())
            .finish()
    }
}

/// One unit of work, carried as `(type tag, length, payload)`.
///
/// The payload is written once at construction, which is also where non-serializable splits
/// are rejected. After crossing a process boundary the descriptor is rebuilt lazily, on the
/// first [`SplitHandle::split`] call.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SplitHandle {
    type_tag: String,
    length: u64,
    payload: Vec<u8>,
    #[serde(skip)]
    decoded: OnceLock<Arc<dyn SplitDescriptor>>,
}

impl SplitHandle {
    pub fn new(split: Arc<dyn SplitDescriptor>, registry: &SplitRegistry) -> SourceResult<Self> {
        let type_tag = split.type_tag();
        if !registry.contains(type_tag) {
            return Err(SourceError::Split(format!(
                "split type {type_tag} has no registered decoder and cannot be shipped: {split:?}"
            )));
        }
        let mut payload = Vec::new();
        split
            .write_payload(&mut payload)
            .map_err(|e| SourceError::Split(format!("split is not serializable: {split:?}: {e}")))?;
        let length = split.length();
        let decoded = OnceLock::new();
        let _ = decoded.set(split);
        Ok(Self {
            type_tag: type_tag.to_string(),
            length,
            payload,
            decoded,
        })
    }

    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    /// Size of the wrapped unit in bytes.
    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// True once the concrete split is available without decoding.
    pub fn is_decoded(&self) -> bool {
        self.decoded.get().is_some()
    }

    /// The concrete split, decoding it through `registry` on first access.
    pub fn split(&self, registry: &SplitRegistry) -> SourceResult<Arc<dyn SplitDescriptor>> {
        if let Some(split) = self.decoded.get() {
            return Ok(Arc::clone(split));
        }
        let split = registry.decode(&self.type_tag, &self.payload)?;
        Ok(Arc::clone(self.decoded.get_or_init(|| split)))
    }
}

impl PartialEq for SplitHandle {
    fn eq(&self, other: &Self) -> bool {
        self.type_tag == other.type_tag
            && self.length == other.length
            && self.payload == other.payload
    }
}

impl Eq for SplitHandle {}
