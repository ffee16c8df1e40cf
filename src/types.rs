//! Public record and metadata types shared by sources, readers and format libraries.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Free-form configuration passed to the format library. Order is irrelevant.
pub type Overrides = BTreeMap<String, String>;

/// Built-in record types with a self-describing wire form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    Long,
    Text,
    Bytes,
}

/// Declared type of a source's keys or values.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeTag {
    Record(RecordKind),
    /// No value at all (e.g. keyless formats).
    Void,
    /// A caller-defined type. Carried through, but has no default encoding.
    Opaque(String),
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::Record(RecordKind::Long) => f.write_str("long"),
            TypeTag::Record(RecordKind::Text) => f.write_str("text"),
            TypeTag::Record(RecordKind::Bytes) => f.write_str("bytes"),
            TypeTag::Void => f.write_str("void"),
            TypeTag::Opaque(name) => f.write_str(name),
        }
    }
}

impl TypeTag {
    /// Built-in names map to their tag; any other name is an opaque type.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "long" | "u64" | "offset" => TypeTag::Record(RecordKind::Long),
            "text" | "string" => TypeTag::Record(RecordKind::Text),
            "bytes" => TypeTag::Record(RecordKind::Bytes),
            "void" | "none" => TypeTag::Void,
            _ => TypeTag::Opaque(name.trim().to_string()),
        }
    }
}

impl FromStr for TypeTag {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_name(s))
    }
}

/// An owned record value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Datum {
    Void,
    Long(u64),
    Text(String),
    Bytes(Vec<u8>),
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Void => Ok(()),
            Datum::Long(n) => write!(f, "{n}"),
            Datum::Text(s) => f.write_str(s),
            Datum::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
        }
    }
}

/// A record value borrowed from a cursor's internal buffers.
///
/// Valid only until the cursor's next `next_pair()` call; copy it with
/// [`DatumRef::to_datum`] before keeping it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DatumRef<'a> {
    Void,
    Long(u64),
    Text(&'a str),
    Bytes(&'a [u8]),
}

impl DatumRef<'_> {
    pub fn to_datum(&self) -> Datum {
        match *self {
            DatumRef::Void => Datum::Void,
            DatumRef::Long(n) => Datum::Long(n),
            DatumRef::Text(s) => Datum::Text(s.to_owned()),
            DatumRef::Bytes(b) => Datum::Bytes(b.to_vec()),
        }
    }
}

/// One key/value record produced by a reader.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KvPair {
    pub key: Datum,
    pub value: Datum,
}

impl KvPair {
    pub fn new(key: Datum, value: Datum) -> Self {
        Self { key, value }
    }
}

/// One file resolved by a format library's listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileStatus {
    pub path: PathBuf,
    pub len: u64,
}

/// Soft min/max split size handed to split discovery.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SplitSize {
    pub min: u64,
    pub max: u64,
}

impl SplitSize {
    /// Same value as both bounds.
    pub fn exact(bytes: u64) -> Self {
        Self {
            min: bytes,
            max: bytes,
        }
    }
}

/// Cooperative interruption signal shared between an orchestrator and its cursors.
///
/// Raising it makes blocked or subsequent cursor calls fail with `ErrorKind::Interrupted`.
/// Nothing in the crate lowers it again once raised. A [`child`](InterruptFlag::child) also
/// reads as raised when its parent is, but raising the child leaves the parent alone.
#[derive(Clone, Debug, Default)]
pub struct InterruptFlag {
    raised: Arc<AtomicBool>,
    parent: Option<Box<InterruptFlag>>,
}

impl InterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh flag scoped under this one, e.g. for a single pipeline run.
    pub fn child(&self) -> Self {
        Self {
            raised: Arc::new(AtomicBool::new(false)),
            parent: Some(Box::new(self.clone())),
        }
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
            || self.parent.as_ref().is_some_and(|parent| parent.is_raised())
    }
}
