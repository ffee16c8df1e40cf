//! Shared fixtures: an in-memory format library and small text-file helpers.
#![allow(dead_code)]

use splitsrc::format::{FormatLibrary, RecordCursor, SplitDescriptor};
use splitsrc::{
    BoundedSource, DatumRef, FileStatus, InterruptFlag, Overrides, RecordKind, SourceContext,
    SplitSize, TypeTag,
};
use std::any::Any;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// --- in-memory split ---

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemorySplit {
    pub id: u32,
    pub records: Vec<String>,
    /// When set, `write_payload` refuses, so the split cannot be shipped.
    pub unshippable: bool,
}

impl MemorySplit {
    pub const TYPE_TAG: &'static str = "memory";

    pub fn decode(mut payload: &[u8]) -> io::Result<Arc<dyn SplitDescriptor>> {
        let id = read_u32(&mut payload)?;
        let count = read_u32(&mut payload)?;
        let mut records = Vec::new();
        for _ in 0..count {
            let len = read_u32(&mut payload)? as usize;
            let mut bytes = vec![0u8; len];
            payload.read_exact(&mut bytes)?;
            let record = String::from_utf8(bytes)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            records.push(record);
        }
        Ok(Arc::new(MemorySplit {
            id,
            records,
            unshippable: false,
        }))
    }
}

fn read_u32(buf: &mut &[u8]) -> io::Result<u32> {
    let mut bytes = [0u8; 4];
    buf.read_exact(&mut bytes)?;
    Ok(u32::from_be_bytes(bytes))
}

impl SplitDescriptor for MemorySplit {
    fn type_tag(&self) -> &'static str {
        Self::TYPE_TAG
    }

    fn length(&self) -> u64 {
        self.records.iter().map(|r| r.len() as u64).sum()
    }

    fn write_payload(&self, out: &mut dyn Write) -> io::Result<()> {
        if self.unshippable {
            return Err(io::Error::new(io::ErrorKind::Unsupported, "not shippable"));
        }
        out.write_all(&self.id.to_be_bytes())?;
        out.write_all(&(self.records.len() as u32).to_be_bytes())?;
        for record in &self.records {
            out.write_all(&(record.len() as u32).to_be_bytes())?;
            out.write_all(record.as_bytes())?;
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// --- in-memory format library ---

/// Format library over fixed in-memory splits. Keys are record indexes within the split,
/// values the record text. Counts cursor opens and closes.
#[derive(Debug, Default)]
pub struct MemoryFormat {
    pub splits: Vec<Vec<String>>,
    pub fail_listing: bool,
    pub unshippable: bool,
    /// `(split id, record index)` at which `next_pair` fails.
    pub fail_at: Option<(u32, usize)>,
    /// Cursors report no progress when false.
    pub no_progress: bool,
    pub opened: Arc<AtomicUsize>,
    pub closed: Arc<AtomicUsize>,
    pub last_size: Mutex<Option<Option<SplitSize>>>,
}

impl MemoryFormat {
    pub const NAME: &'static str = "memory";

    pub fn new(splits: Vec<Vec<&str>>) -> Self {
        Self {
            splits: splits
                .into_iter()
                .map(|s| s.into_iter().map(String::from).collect())
                .collect(),
            ..Self::default()
        }
    }

    /// `n` splits of one record each, `"r{i}"`.
    pub fn numbered(n: usize) -> Self {
        Self {
            splits: (0..n).map(|i| vec![format!("r{i}")]).collect(),
            ..Self::default()
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn last_size(&self) -> Option<Option<SplitSize>> {
        *self.last_size.lock().unwrap()
    }
}

impl FormatLibrary for MemoryFormat {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn listing(&self, _resource: &str, _overrides: &Overrides) -> io::Result<Vec<FileStatus>> {
        if self.fail_listing {
            return Err(io::Error::other("listing failed"));
        }
        Ok(self
            .splits
            .iter()
            .enumerate()
            .map(|(i, records)| FileStatus {
                path: PathBuf::from(format!("mem/{i}")),
                len: records.iter().map(|r| r.len() as u64).sum(),
            })
            .collect())
    }

    fn discover_splits(
        &self,
        _resource: &str,
        _overrides: &Overrides,
        size: Option<SplitSize>,
    ) -> io::Result<Vec<Arc<dyn SplitDescriptor>>> {
        *self.last_size.lock().unwrap() = Some(size);
        Ok(self
            .splits
            .iter()
            .enumerate()
            .map(|(i, records)| {
                Arc::new(MemorySplit {
                    id: i as u32,
                    records: records.clone(),
                    unshippable: self.unshippable,
                }) as Arc<dyn SplitDescriptor>
            })
            .collect())
    }

    fn open_cursor(
        &self,
        split: &dyn SplitDescriptor,
        _overrides: &Overrides,
        interrupt: &InterruptFlag,
    ) -> io::Result<Box<dyn RecordCursor>> {
        let split = split
            .as_any()
            .downcast_ref::<MemorySplit>()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "not a memory split"))?;
        self.opened.fetch_add(1, Ordering::SeqCst);
        let fail_at = match self.fail_at {
            Some((id, index)) if id == split.id => Some(index),
            _ => None,
        };
        Ok(Box::new(MemoryCursor {
            records: split.records.clone(),
            next: 0,
            buf: String::new(),
            fail_at,
            no_progress: self.no_progress,
            closed: Arc::clone(&self.closed),
            interrupt: interrupt.clone(),
        }))
    }
}

/// Hands out every value through one reused buffer.
struct MemoryCursor {
    records: Vec<String>,
    next: usize,
    buf: String,
    fail_at: Option<usize>,
    no_progress: bool,
    closed: Arc<AtomicUsize>,
    interrupt: InterruptFlag,
}

impl RecordCursor for MemoryCursor {
    fn next_pair(&mut self) -> io::Result<Option<(DatumRef<'_>, DatumRef<'_>)>> {
        if self.interrupt.is_raised() {
            return Err(io::Error::new(io::ErrorKind::Interrupted, "interrupted"));
        }
        if self.fail_at == Some(self.next) {
            return Err(io::Error::other("backend exploded"));
        }
        let Some(record) = self.records.get(self.next) else {
            return Ok(None);
        };
        self.buf.clear();
        self.buf.push_str(record);
        let key = self.next as u64;
        self.next += 1;
        Ok(Some((DatumRef::Long(key), DatumRef::Text(&self.buf))))
    }

    fn progress(&self) -> Option<f64> {
        if self.no_progress || self.records.is_empty() {
            return None;
        }
        Some(self.next as f64 / self.records.len() as f64)
    }

    fn close(&mut self) -> io::Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// --- helpers ---

pub fn memory_source() -> BoundedSource {
    BoundedSource::new(
        "mem://fixture",
        MemoryFormat::NAME,
        TypeTag::Record(RecordKind::Long),
        TypeTag::Record(RecordKind::Text),
    )
}

/// Context with `library` and its split decoder registered, no bundle floor, stable order.
pub fn memory_context(library: Arc<MemoryFormat>) -> SourceContext {
    SourceContext::builder()
        .format(library)
        .split_decoder(MemorySplit::TYPE_TAG, MemorySplit::decode)
        .min_bundle_size(1)
        .split_order(splitsrc::SplitOrder::Discovery)
        .build()
}

pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, contents).unwrap();
    path
}

/// `(offset, line)` for every newline-terminated line of `contents`.
pub fn expected_lines(contents: &str) -> Vec<(u64, String)> {
    let mut offset = 0u64;
    let mut out = Vec::new();
    for line in contents.split_inclusive('\n') {
        out.push((offset, line.trim_end_matches('\n').to_string()));
        offset += line.len() as u64;
    }
    out
}

/// Lines of varying length, `count` of them.
pub fn numbered_lines(count: usize) -> String {
    (0..count)
        .map(|i| format!("line {i} {}\n", "x".repeat(i % 7)))
        .collect()
}
