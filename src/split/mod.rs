//! Split handles, their decoder registry, and the planner that produces them.

pub mod handle;
pub mod planner;

pub use handle::{DecodeFn, SplitHandle, SplitRegistry};
pub use planner::{SplitOrder, SplitPlanner, apply_order};
