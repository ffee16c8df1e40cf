//! Bundle pipeline: a worker pool that reads planned bundles concurrently.

pub mod context;
pub mod error_handler;
pub mod orchestrator;
pub mod workers;

pub use context::{
    PipelineChannels, PipelineHandles, PipelineTuning, WorkerEvent, create_pipeline_channels,
};
pub use error_handler::check_for_first_error;
pub use orchestrator::{
    ReadSummary, read_bundles, run_pipeline, shutdown_pipeline_handles, tuning_for_bundles,
};
pub use workers::spawn_bundle_workers;
