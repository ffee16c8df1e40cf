//! Byte-range split of a single file.

use std::any::Any;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::SplitDescriptor;

/// `[start, start + length)` of the file at `path`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileSplit {
    path: PathBuf,
    start: u64,
    length: u64,
}

impl FileSplit {
    pub const TYPE_TAG: &'static str = "file";

    pub fn new(path: impl Into<PathBuf>, start: u64, length: u64) -> Self {
        Self {
            path: path.into(),
            start,
            length,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    /// Offset one past the last byte of the range.
    pub fn end(&self) -> u64 {
        self.start + self.length
    }

    /// Payload layout: u32 BE path length, UTF-8 path, u64 BE start, u64 BE length.
    pub fn decode(mut payload: &[u8]) -> io::Result<Arc<dyn SplitDescriptor>> {
        let path_len = read_u32(&mut payload)? as usize;
        if payload.len() < path_len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "file split payload truncated in path",
            ));
        }
        let (path_bytes, rest) = payload.split_at(path_len);
        let path = std::str::from_utf8(path_bytes)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?
            .to_string();
        payload = rest;
        let start = read_u64(&mut payload)?;
        let length = read_u64(&mut payload)?;
        if !payload.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} trailing bytes after file split", payload.len()),
            ));
        }
        Ok(Arc::new(FileSplit::new(path, start, length)))
    }
}

fn read_u32(buf: &mut &[u8]) -> io::Result<u32> {
    let mut bytes = [0u8; 4];
    buf.read_exact(&mut bytes)?;
    Ok(u32::from_be_bytes(bytes))
}

fn read_u64(buf: &mut &[u8]) -> io::Result<u64> {
    let mut bytes = [0u8; 8];
    buf.read_exact(&mut bytes)?;
    Ok(u64::from_be_bytes(bytes))
}

impl SplitDescriptor for FileSplit {
    fn type_tag(&self) -> &'static str {
        Self::TYPE_TAG
    }

    fn length(&self) -> u64 {
        self.length
    }

    fn write_payload(&self, out: &mut dyn Write) -> io::Result<()> {
        let path = self.path.to_str().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::Unsupported,
                format!("path is not valid UTF-8: {}", self.path.display()),
            )
        })?;
        let path_len = u32::try_from(path.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path too long"))?;
        out.write_all(&path_len.to_be_bytes())?;
        out.write_all(path.as_bytes())?;
        out.write_all(&self.start.to_be_bytes())?;
        out.write_all(&self.length.to_be_bytes())?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
