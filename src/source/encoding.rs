//! Wire encoding for records shipped downstream of a reader.
//!
//! Layout per element: `Long` is 8 bytes big-endian, `Text` and `Bytes` are a `u32` BE length
//! followed by the bytes, `Void` writes nothing. A pair is its key followed by its value.

use serde::{Deserialize, Serialize};
use std::io::Read;

use crate::error::{SourceError, SourceResult};
use crate::types::{Datum, KvPair, RecordKind, TypeTag};

/// Encoding of a single key or value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementEncoding {
    Record(RecordKind),
    Void,
}

impl ElementEncoding {
    /// Default encoding for a declared type. Opaque types have none.
    pub fn for_type(tag: &TypeTag) -> SourceResult<Self> {
        match tag {
            TypeTag::Record(kind) => Ok(ElementEncoding::Record(*kind)),
            TypeTag::Void => Ok(ElementEncoding::Void),
            TypeTag::Opaque(name) => Err(SourceError::UnsupportedType(name.clone())),
        }
    }

    pub fn encode(&self, datum: &Datum, out: &mut Vec<u8>) -> SourceResult<()> {
        match (self, datum) {
            (ElementEncoding::Void, Datum::Void) => {}
            (ElementEncoding::Record(RecordKind::Long), Datum::Long(n)) => {
                out.extend_from_slice(&n.to_be_bytes());
            }
            (ElementEncoding::Record(RecordKind::Text), Datum::Text(s)) => {
                write_len_prefixed(s.as_bytes(), out)?;
            }
            (ElementEncoding::Record(RecordKind::Bytes), Datum::Bytes(b)) => {
                write_len_prefixed(b, out)?;
            }
            (encoding, datum) => {
                return Err(SourceError::Encoding(format!(
                    "{datum:?} cannot be written with {encoding:?}"
                )));
            }
        }
        Ok(())
    }

    /// Read one element from the front of `input`, advancing it.
    pub fn decode(&self, input: &mut &[u8]) -> SourceResult<Datum> {
        match self {
            ElementEncoding::Void => Ok(Datum::Void),
            ElementEncoding::Record(RecordKind::Long) => {
                let mut bytes = [0u8; 8];
                input.read_exact(&mut bytes).map_err(truncated)?;
                Ok(Datum::Long(u64::from_be_bytes(bytes)))
            }
            ElementEncoding::Record(RecordKind::Text) => {
                let bytes = read_len_prefixed(input)?;
                String::from_utf8(bytes)
                    .map(Datum::Text)
                    .map_err(|e| SourceError::Encoding(format!("text is not valid UTF-8: {e}")))
            }
            ElementEncoding::Record(RecordKind::Bytes) => {
                read_len_prefixed(input).map(Datum::Bytes)
            }
        }
    }
}

fn truncated(e: std::io::Error) -> SourceError {
    SourceError::Encoding(format!("truncated record: {e}"))
}

fn write_len_prefixed(bytes: &[u8], out: &mut Vec<u8>) -> SourceResult<()> {
    let len = u32::try_from(bytes.len()).map_err(|_| {
        SourceError::Encoding(format!("element of {} bytes is too large", bytes.len()))
    })?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(bytes);
    Ok(())
}

fn read_len_prefixed(input: &mut &[u8]) -> SourceResult<Vec<u8>> {
    let mut len = [0u8; 4];
    input.read_exact(&mut len).map_err(truncated)?;
    let len = u32::from_be_bytes(len) as usize;
    if input.len() < len {
        return Err(SourceError::Encoding(format!(
            "truncated record: need {len} bytes, have {}",
            input.len()
        )));
    }
    let (head, rest) = input.split_at(len);
    *input = rest;
    Ok(head.to_vec())
}

/// Key/value encoding of a source's output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KvEncoding {
    pub key: ElementEncoding,
    pub value: ElementEncoding,
}

impl KvEncoding {
    pub fn new(key: ElementEncoding, value: ElementEncoding) -> Self {
        Self { key, value }
    }

    pub fn for_types(key: &TypeTag, value: &TypeTag) -> SourceResult<Self> {
        Ok(Self::new(
            ElementEncoding::for_type(key)?,
            ElementEncoding::for_type(value)?,
        ))
    }

    pub fn encode(&self, pair: &KvPair) -> SourceResult<Vec<u8>> {
        let mut out = Vec::new();
        self.key.encode(&pair.key, &mut out)?;
        self.value.encode(&pair.value, &mut out)?;
        Ok(out)
    }

    /// Decode exactly one pair; leftover bytes are an error.
    pub fn decode(&self, mut bytes: &[u8]) -> SourceResult<KvPair> {
        let key = self.key.decode(&mut bytes)?;
        let value = self.value.decode(&mut bytes)?;
        if !bytes.is_empty() {
            return Err(SourceError::Encoding(format!(
                "{} trailing bytes after record",
                bytes.len()
            )));
        }
        Ok(KvPair::new(key, value))
    }
}
