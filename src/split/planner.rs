//! Turns a resource into shippable split handles.

use log::{debug, info};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use super::handle::SplitHandle;
use crate::context::SourceContext;
use crate::error::{SourceError, SourceResult};
use crate::format::FormatLibrary;
use crate::types::{Overrides, SplitSize};

/// Order the planner hands splits out in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitOrder {
    /// Random order, so concurrent readers of adjacent splits spread over storage.
    #[default]
    Shuffle,
    /// Shuffle driven by a fixed seed; same input, same order.
    Seeded(u64),
    /// Whatever order the format library discovered them in.
    Discovery,
}

/// Reorder `items` in place according to `order`.
pub fn apply_order<T>(items: &mut [T], order: SplitOrder) {
    match order {
        SplitOrder::Shuffle => items.shuffle(&mut rand::rng()),
        SplitOrder::Seeded(seed) => items.shuffle(&mut StdRng::seed_from_u64(seed)),
        SplitOrder::Discovery => {}
    }
}

pub struct SplitPlanner<'a> {
    ctx: &'a SourceContext,
}

impl<'a> SplitPlanner<'a> {
    pub fn new(ctx: &'a SourceContext) -> Self {
        Self { ctx }
    }

    /// Desired size raised to the context floor.
    pub fn effective_bundle_size(&self, desired_bytes: u64) -> u64 {
        desired_bytes.max(self.ctx.min_bundle_size())
    }

    pub fn plan(
        &self,
        library: &dyn FormatLibrary,
        resource: &str,
        overrides: &Overrides,
        desired_bytes: u64,
    ) -> SourceResult<Vec<SplitHandle>> {
        let size = self.effective_bundle_size(desired_bytes);
        debug!(
            "Planning {} ({} format) with bundle size {} (desired {})",
            resource,
            library.name(),
            size,
            desired_bytes
        );
        let splits = library
            .discover_splits(resource, overrides, Some(SplitSize::exact(size)))
            .map_err(|e| {
                SourceError::planning(
                    format!(
                        "cannot compute splits of {resource} with the {} format",
                        library.name()
                    ),
                    Some(e),
                )
            })?;
        info!("Got {} splits.", splits.len());

        let mut handles = splits
            .into_iter()
            .map(|split| SplitHandle::new(split, self.ctx.splits()))
            .collect::<SourceResult<Vec<_>>>()
            .map_err(|e| SourceError::planning(e.to_string(), None))?;
        apply_order(&mut handles, self.ctx.split_order());
        Ok(handles)
    }
}
