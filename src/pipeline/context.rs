//! Pipeline channels and handles: what the orchestrator hands to workers and keeps for itself.

use crossbeam_channel::{Receiver, Sender, bounded};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::source::BoundedSource;
use crate::types::{InterruptFlag, KvPair};

/// Worker count and record channel capacity for one run.
#[derive(Clone, Copy, Debug)]
pub struct PipelineTuning {
    pub num_threads: usize,
    pub channel_cap: usize,
}

/// What a worker reports back to the orchestrator.
#[derive(Clone, Debug, PartialEq)]
pub enum WorkerEvent {
    Record(KvPair),
    /// One bundle fully read; carries its record count.
    BundleDone { records: usize },
}

/// Handles returned by [`run_pipeline`](super::run_pipeline): receive events, then join.
pub struct PipelineHandles {
    pub event_rx: Receiver<WorkerEvent>,
    pub worker_handles: Vec<JoinHandle<()>>,
    pub first_error: Arc<Mutex<Option<String>>>,
    /// This run's stop flag: a child of the caller's, raised on the first failure.
    pub stop: InterruptFlag,
}

/// Channels and shared state. Workers get `bundle_rx` and `event_tx`; the orchestrator keeps
/// `event_rx` and drops its copy of `event_tx` once workers are spawned.
pub struct PipelineChannels {
    pub bundle_tx: Sender<BoundedSource>,
    pub bundle_rx: Receiver<BoundedSource>,
    pub event_tx: Sender<WorkerEvent>,
    pub event_rx: Receiver<WorkerEvent>,
    pub first_error: Arc<Mutex<Option<String>>>,
}

/// `bundles` sizes the bundle channel so queueing every bundle up front never blocks.
pub fn create_pipeline_channels(bundles: usize, channel_cap: usize) -> PipelineChannels {
    let (bundle_tx, bundle_rx) = bounded::<BoundedSource>(bundles.max(1));
    let (event_tx, event_rx) = bounded::<WorkerEvent>(channel_cap);
    PipelineChannels {
        bundle_tx,
        bundle_rx,
        event_tx,
        event_rx,
        first_error: Arc::new(Mutex::new(None)),
    }
}
