use log::{debug, trace, warn};
use std::io;
use std::sync::Arc;

use super::bounded::BoundedSource;
use crate::context::SourceContext;
use crate::error::{SourceError, SourceResult};
use crate::format::{FormatLibrary, RecordCursor, SplitDescriptor};
use crate::types::KvPair;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReaderState {
    NotStarted,
    Active,
    Exhausted,
    /// A read failed; only `close()` is accepted from here.
    Failed,
    Closed,
}

impl ReaderState {
    pub fn name(&self) -> &'static str {
        match self {
            ReaderState::NotStarted => "not started",
            ReaderState::Active => "active",
            ReaderState::Exhausted => "exhausted",
            ReaderState::Failed => "failed",
            ReaderState::Closed => "closed",
        }
    }
}

/// Sequential cursor over every record of one [`BoundedSource`].
///
/// Splits are opened one at a time, in order; the previous split's cursor is always closed
/// before the next one is opened. Not meant to be shared between threads: give each worker
/// its own reader.
pub struct BoundedReader<'a> {
    source: &'a BoundedSource,
    ctx: &'a SourceContext,
    library: Arc<dyn FormatLibrary>,
    splits: Vec<Arc<dyn SplitDescriptor>>,
    /// Splits opened so far; the open cursor (if any) belongs to `splits[next_split - 1]`.
    next_split: usize,
    cursor: Option<Box<dyn RecordCursor>>,
    current: Option<KvPair>,
    done: bool,
    state: ReaderState,
    /// Reported once the reader has failed or closed.
    frozen_fraction: f64,
}

impl<'a> BoundedReader<'a> {
    pub(crate) fn new(
        source: &'a BoundedSource,
        ctx: &'a SourceContext,
        library: Arc<dyn FormatLibrary>,
    ) -> Self {
        Self {
            source,
            ctx,
            library,
            splits: Vec::new(),
            next_split: 0,
            cursor: None,
            current: None,
            done: false,
            state: ReaderState::NotStarted,
            frozen_fraction: 0.0,
        }
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    pub fn current_source(&self) -> &BoundedSource {
        self.source
    }

    /// Resolve the splits to visit and position on the first record.
    /// Returns whether a record is available.
    pub fn start(&mut self) -> SourceResult<bool> {
        if self.state != ReaderState::NotStarted {
            return Err(SourceError::IllegalState {
                op: "start",
                state: self.state.name(),
            });
        }
        self.splits = match self.resolve_splits() {
            Ok(splits) => splits,
            Err(e) => {
                self.state = ReaderState::Failed;
                return Err(e);
            }
        };
        debug!(
            "Reader starting over {} split(s) of {}",
            self.splits.len(),
            self.source.resource().unwrap_or_default()
        );
        self.state = ReaderState::Active;
        self.advance()
    }

    fn resolve_splits(&self) -> SourceResult<Vec<Arc<dyn SplitDescriptor>>> {
        if let Some(handle) = self.source.split() {
            return Ok(vec![handle.split(self.ctx.splits())?]);
        }
        let resource = self.source.resource().unwrap_or_default();
        self.library
            .discover_splits(resource, self.source.overrides(), None)
            .map_err(|e| {
                SourceError::planning(
                    format!(
                        "cannot compute splits of {resource} with the {} format",
                        self.library.name()
                    ),
                    Some(e),
                )
            })
    }

    /// Move to the next record. Returns false once every split is drained, and keeps
    /// returning false after that.
    ///
    /// On error the open cursor is closed, the current record cleared, and the reader moves
    /// to `Failed`.
    pub fn advance(&mut self) -> SourceResult<bool> {
        match self.state {
            ReaderState::Active => {}
            ReaderState::Exhausted => return Ok(false),
            state => {
                return Err(SourceError::IllegalState {
                    op: "advance",
                    state: state.name(),
                });
            }
        }
        match self.advance_through_splits() {
            Ok(true) => Ok(true),
            Ok(false) => {
                self.current = None;
                self.done = true;
                self.state = ReaderState::Exhausted;
                trace!("Reader exhausted after {} split(s)", self.splits.len());
                Ok(false)
            }
            Err(e) => {
                self.frozen_fraction = self.fraction_consumed();
                self.current = None;
                self.state = ReaderState::Failed;
                if let Some(mut cursor) = self.cursor.take()
                    && let Err(close_err) = cursor.close()
                {
                    warn!("Closing cursor after read failure: {close_err}");
                }
                Err(e)
            }
        }
    }

    fn advance_through_splits(&mut self) -> SourceResult<bool> {
        loop {
            if let Some(cursor) = self.cursor.as_mut() {
                match cursor.next_pair() {
                    Ok(Some((key, value))) => {
                        // Cursor buffers are reused by the next call; keep owned copies.
                        self.current = Some(KvPair::new(key.to_datum(), value.to_datum()));
                        return Ok(true);
                    }
                    Ok(None) => {}
                    Err(e) => return Err(read_error(&self.splits, self.next_split, e)),
                }
            }

            if let Some(mut cursor) = self.cursor.take() {
                cursor
                    .close()
                    .map_err(|e| read_error(&self.splits, self.next_split, e))?;
            }
            if self.next_split >= self.splits.len() {
                return Ok(false);
            }
            if self.ctx.interrupt().is_raised() {
                return Err(read_error(
                    &self.splits,
                    self.next_split + 1,
                    io::Error::new(io::ErrorKind::Interrupted, "interrupted before opening split"),
                ));
            }

            let split = Arc::clone(&self.splits[self.next_split]);
            self.next_split += 1;
            debug!(
                "Opening split {}/{}: {:?}",
                self.next_split,
                self.splits.len(),
                split
            );
            let cursor = self
                .library
                .open_cursor(split.as_ref(), self.source.overrides(), self.ctx.interrupt())
                .map_err(|e| read_error(&self.splits, self.next_split, e))?;
            self.cursor = Some(cursor);
        }
    }

    /// The record the reader is positioned on.
    pub fn current(&self) -> SourceResult<&KvPair> {
        match (self.state, &self.current) {
            (ReaderState::Active, Some(pair)) => Ok(pair),
            _ => Err(SourceError::NoCurrentElement),
        }
    }

    /// Progress through the whole reader in `[0, 1]`, non-decreasing over its lifetime.
    pub fn fraction_consumed(&self) -> f64 {
        if matches!(self.state, ReaderState::Failed | ReaderState::Closed) {
            return self.frozen_fraction;
        }
        if self.done {
            return 1.0;
        }
        if self.next_split == 0 {
            return if self.state == ReaderState::Active && self.splits.is_empty() {
                1.0
            } else {
                0.0
            };
        }
        let index = (self.next_split - 1) as f64;
        let progress = self
            .cursor
            .as_ref()
            .and_then(|cursor| cursor.progress())
            .unwrap_or(0.0)
            .clamp(0.0, 1.0);
        // 1.0 is reserved for the exhausted reader.
        ((index + progress) / self.splits.len() as f64).clamp(0.0, 1.0_f64.next_down())
    }

    /// 1 until exhausted or failed, then 0. Readers never split themselves further.
    pub fn split_points_remaining(&self) -> u64 {
        if self.done || self.state == ReaderState::Failed {
            0
        } else {
            1
        }
    }

    /// Dynamic rebalancing is not supported; always declines.
    pub fn split_at_fraction(&mut self, fraction: f64) -> Option<BoundedSource> {
        debug!("Declining split at fraction {fraction}: dynamic splitting is not supported");
        None
    }

    /// Release the open cursor. Safe from any state; later calls do nothing.
    pub fn close(&mut self) -> SourceResult<()> {
        if self.state == ReaderState::Closed {
            return Ok(());
        }
        self.frozen_fraction = self.fraction_consumed();
        self.current = None;
        self.state = ReaderState::Closed;
        if let Some(mut cursor) = self.cursor.take() {
            cursor
                .close()
                .map_err(|e| read_error(&self.splits, self.next_split, e))?;
        }
        Ok(())
    }
}

impl Drop for BoundedReader<'_> {
    fn drop(&mut self) {
        if let Some(mut cursor) = self.cursor.take()
            && let Err(e) = cursor.close()
        {
            warn!("Closing cursor on drop: {e}");
        }
    }
}

/// Read error attributed to the split opened `opened`-th (1-based).
fn read_error(
    splits: &[Arc<dyn SplitDescriptor>],
    opened: usize,
    source: io::Error,
) -> SourceError {
    let split = match opened.checked_sub(1).and_then(|i| splits.get(i)) {
        Some(split) => format!("split {opened}/{} {split:?}", splits.len()),
        None => format!("split {opened}/{}", splits.len()),
    };
    SourceError::Read { split, source }
}
