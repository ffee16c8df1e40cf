//! Line-oriented text format over local files: keys are byte offsets, values are lines.

use log::trace;
use rayon::prelude::*;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::sync::Arc;

use super::file_split::FileSplit;
use super::listing::resolve_listing;
use super::{FormatLibrary, RecordCursor, SplitDescriptor};
use crate::types::{DatumRef, FileStatus, InterruptFlag, Overrides, SplitSize};
use crate::utils::config::{ConfKeys, FormatConsts};

/// Built-in format registered as `text`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TextLineFormat;

impl TextLineFormat {
    pub const NAME: &'static str = "text";
}

/// `max(min, min(max, block))`: the block size, clamped into the requested bounds.
pub fn compute_split_size(block_size: u64, min: u64, max: u64) -> u64 {
    min.max(max.min(block_size)).max(1)
}

/// Carve one file into byte-range splits of `split_size`, folding a tail within the slop
/// factor into the last split. An empty file still yields one (empty) split.
pub fn carve_file(file: &FileStatus, split_size: u64) -> Vec<FileSplit> {
    if file.len == 0 {
        return vec![FileSplit::new(&file.path, 0, 0)];
    }
    let mut splits = Vec::new();
    let mut remaining = file.len;
    while remaining as f64 / split_size as f64 > FormatConsts::SPLIT_SLOP {
        splits.push(FileSplit::new(&file.path, file.len - remaining, split_size));
        remaining -= split_size;
    }
    if remaining != 0 {
        splits.push(FileSplit::new(&file.path, file.len - remaining, remaining));
    }
    splits
}

fn parse_u64(overrides: &Overrides, key: &str, default: u64) -> io::Result<u64> {
    match overrides.get(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<u64>().map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("{key}={raw}: {e}"))
        }),
    }
}

fn parse_bool(overrides: &Overrides, key: &str) -> io::Result<bool> {
    match overrides.get(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) if v == "true" || v == "1" => Ok(true),
        Some(v) if v == "false" || v == "0" => Ok(false),
        Some(v) => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{key}={v}: expected true or false"),
        )),
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Delimiter {
    /// `\n`, with a trailing `\r` stripped.
    Newline,
    Custom(Vec<u8>),
}

impl Delimiter {
    fn from_overrides(overrides: &Overrides) -> io::Result<Self> {
        match overrides.get(ConfKeys::RECORD_DELIMITER) {
            None => Ok(Delimiter::Newline),
            Some(d) if d.is_empty() => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} must not be empty", ConfKeys::RECORD_DELIMITER),
            )),
            Some(d) => Ok(Delimiter::Custom(d.as_bytes().to_vec())),
        }
    }

    fn len(&self) -> u64 {
        match self {
            Delimiter::Newline => 1,
            Delimiter::Custom(delim) => delim.len() as u64,
        }
    }
}

/// Read one record into `buf` (delimiter stripped). Returns bytes consumed, 0 at EOF.
fn read_record<R: BufRead>(
    reader: &mut R,
    delimiter: &Delimiter,
    buf: &mut Vec<u8>,
) -> io::Result<usize> {
    buf.clear();
    match delimiter {
        Delimiter::Newline => {
            let n = reader.read_until(b'\n', buf)?;
            if buf.last() == Some(&b'\n') {
                buf.pop();
                if buf.last() == Some(&b'\r') {
                    buf.pop();
                }
            }
            Ok(n)
        }
        Delimiter::Custom(delim) => {
            let last = delim[delim.len() - 1];
            let mut total = 0;
            loop {
                let n = reader.read_until(last, buf)?;
                total += n;
                if n == 0 {
                    break;
                }
                if buf.ends_with(delim) {
                    buf.truncate(buf.len() - delim.len());
                    break;
                }
            }
            Ok(total)
        }
    }
}

impl FormatLibrary for TextLineFormat {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn listing(&self, resource: &str, overrides: &Overrides) -> io::Result<Vec<FileStatus>> {
        resolve_listing(resource, parse_bool(overrides, ConfKeys::INPUT_RECURSIVE)?)
    }

    fn discover_splits(
        &self,
        resource: &str,
        overrides: &Overrides,
        size: Option<SplitSize>,
    ) -> io::Result<Vec<Arc<dyn SplitDescriptor>>> {
        let files = self.listing(resource, overrides)?;
        let block_size = parse_u64(
            overrides,
            ConfKeys::BLOCK_SIZE,
            FormatConsts::DEFAULT_BLOCK_SIZE,
        )?;
        let split_size = match size {
            Some(size) => compute_split_size(block_size, size.min, size.max),
            None => compute_split_size(block_size, 1, u64::MAX),
        };
        trace!(
            "Carving {} files of {} with split size {}",
            files.len(),
            resource,
            split_size
        );
        Ok(files
            .par_iter()
            .flat_map_iter(|file| carve_file(file, split_size))
            .map(|split| Arc::new(split) as Arc<dyn SplitDescriptor>)
            .collect())
    }

    fn open_cursor(
        &self,
        split: &dyn SplitDescriptor,
        overrides: &Overrides,
        interrupt: &InterruptFlag,
    ) -> io::Result<Box<dyn RecordCursor>> {
        let split = split.as_any().downcast_ref::<FileSplit>().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("text format cannot read a {} split", split.type_tag()),
            )
        })?;
        let cursor = TextLineCursor::open(split, Delimiter::from_overrides(overrides)?, interrupt)?;
        Ok(Box::new(cursor))
    }
}

/// Cursor over the lines that begin inside one [`FileSplit`].
///
/// A record begins at offset 0 or right after a delimiter. A split `[start, end)` reads the
/// records beginning in `(start, end]`, plus the one at 0 when `start == 0`, so adjacent
/// splits cover each record exactly once.
#[derive(Debug)]
pub struct TextLineCursor {
    reader: Option<BufReader<File>>,
    delimiter: Delimiter,
    start: u64,
    end: u64,
    pos: u64,
    buf: Vec<u8>,
    interrupt: InterruptFlag,
}

impl TextLineCursor {
    fn open(
        split: &FileSplit,
        delimiter: Delimiter,
        interrupt: &InterruptFlag,
    ) -> io::Result<Self> {
        let mut start = split.start();
        // Back up so a delimiter straddling `start` is seen whole: the record after it
        // begins past `start` and belongs here.
        let seek_to = if start == 0 {
            0
        } else {
            start.saturating_sub(delimiter.len() - 1)
        };
        let mut file = File::open(split.path())?;
        file.seek(SeekFrom::Start(seek_to))?;
        let mut reader = BufReader::new(file);
        let mut buf = Vec::new();
        if start != 0 {
            start = seek_to + read_record(&mut reader, &delimiter, &mut buf)? as u64;
        }
        Ok(Self {
            reader: Some(reader),
            delimiter,
            start,
            end: split.end(),
            pos: start,
            buf,
            interrupt: interrupt.clone(),
        })
    }
}

impl RecordCursor for TextLineCursor {
    fn next_pair(&mut self) -> io::Result<Option<(DatumRef<'_>, DatumRef<'_>)>> {
        if self.interrupt.is_raised() {
            return Err(io::Error::new(
                io::ErrorKind::Interrupted,
                "interrupted while reading split",
            ));
        }
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };
        if self.pos > self.end {
            return Ok(None);
        }
        let key = self.pos;
        let consumed = read_record(reader, &self.delimiter, &mut self.buf)?;
        if consumed == 0 {
            // EOF before the split end; nothing further can begin inside this split.
            self.pos = self.end + 1;
            return Ok(None);
        }
        self.pos += consumed as u64;
        let line = std::str::from_utf8(&self.buf).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("line at offset {key} is not valid UTF-8: {e}"),
            )
        })?;
        Ok(Some((DatumRef::Long(key), DatumRef::Text(line))))
    }

    fn progress(&self) -> Option<f64> {
        if self.end <= self.start {
            return Some(if self.pos > self.end { 1.0 } else { 0.0 });
        }
        let consumed = self.pos.saturating_sub(self.start) as f64;
        Some((consumed / (self.end - self.start) as f64).min(1.0))
    }

    fn close(&mut self) -> io::Result<()> {
        self.reader = None;
        Ok(())
    }
}
