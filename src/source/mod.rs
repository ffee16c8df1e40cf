//! Bounded sources, their readers, and output encodings.

pub mod bounded;
pub mod encoding;
pub mod reader;

pub use bounded::{BoundedSource, BoundedSourceBuilder};
pub use encoding::{ElementEncoding, KvEncoding};
pub use reader::{BoundedReader, ReaderState};
