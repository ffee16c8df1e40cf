use anyhow::{Context, Result};
use log::debug;

use crate::context::SourceContext;
use crate::engine::progress::{ProgressBar, update_progress_bar};
use crate::pipeline::{self, PipelineHandles, PipelineTuning, WorkerEvent};
use crate::source::BoundedSource;
use crate::types::KvPair;
use crate::utils::config::{RECORD_CHANNEL_CAP, WorkerThreadLimits};

/// Totals of a finished read.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReadSummary {
    pub bundles: usize,
    pub records: usize,
}

/// Worker count for `bundles` bundles: `requested` if given, else one per available thread.
pub fn tuning_for_bundles(bundles: usize, requested: Option<usize>) -> PipelineTuning {
    PipelineTuning {
        num_threads: WorkerThreadLimits::current().workers_for(requested, bundles),
        channel_cap: RECORD_CHANNEL_CAP,
    }
}

/// Queue every bundle and start the workers. Caller receives from `event_rx` and must join
/// `worker_handles` when done.
///
/// Workers read under `stop`, a child of the caller's flag: Ctrl-C on the caller's flag
/// reaches them, while stopping the run leaves `ctx` usable for later runs.
pub fn run_pipeline(
    bundles: Vec<BoundedSource>,
    ctx: &SourceContext,
    tuning: PipelineTuning,
) -> Result<PipelineHandles> {
    let channels = pipeline::create_pipeline_channels(bundles.len(), tuning.channel_cap);
    for bundle in bundles {
        channels
            .bundle_tx
            .send(bundle)
            .context("queue bundle for workers")?;
    }
    // No more bundles: workers exit once the queue is drained.
    drop(channels.bundle_tx);

    let stop = ctx.interrupt().child();
    let run_ctx = ctx.with_interrupt(stop.clone());
    let worker_handles = pipeline::spawn_bundle_workers(
        channels.bundle_rx,
        &channels.event_tx,
        &run_ctx,
        &channels.first_error,
        tuning.num_threads,
    );

    // Dropping the last sender closes the channel once every worker exits.
    drop(channels.event_tx);

    Ok(PipelineHandles {
        event_rx: channels.event_rx,
        worker_handles,
        first_error: channels.first_error,
        stop,
    })
}

/// Join worker threads (after the event stream is drained or abandoned).
pub fn shutdown_pipeline_handles(worker_handles: Vec<std::thread::JoinHandle<()>>) -> Result<()> {
    let mut panicked = 0;
    for h in worker_handles {
        if h.join().is_err() {
            panicked += 1;
        }
    }
    if panicked > 0 {
        anyhow::bail!("{panicked} bundle worker(s) panicked");
    }
    Ok(())
}

/// Main orchestrator: read every bundle concurrently, handing each record to `on_record` on
/// the calling thread. Bundles → bundle channel → workers (one reader each) → event channel.
///
/// Records of one bundle arrive in reader order; records of different bundles interleave.
/// The first worker error fails the whole read, as does an error from `on_record`.
pub fn read_bundles<F>(
    bundles: Vec<BoundedSource>,
    ctx: &SourceContext,
    num_threads: Option<usize>,
    progress: Option<&ProgressBar>,
    mut on_record: F,
) -> Result<ReadSummary>
where
    F: FnMut(&KvPair) -> Result<()>,
{
    let tuning = tuning_for_bundles(bundles.len(), num_threads);
    debug!(
        "Reading {} bundles with {} workers",
        bundles.len(),
        tuning.num_threads
    );
    let PipelineHandles {
        event_rx,
        worker_handles,
        first_error,
        stop,
    } = run_pipeline(bundles, ctx, tuning)?;

    let mut summary = ReadSummary::default();
    let mut consumer_error = None;
    while let Ok(event) = event_rx.recv() {
        match event {
            WorkerEvent::Record(pair) => {
                if let Err(e) = on_record(&pair) {
                    consumer_error = Some(e);
                    break;
                }
                summary.records += 1;
            }
            WorkerEvent::BundleDone { records } => {
                summary.bundles += 1;
                debug!("main: bundle {} finished with {} records", summary.bundles, records);
                if let Some(pb) = progress {
                    update_progress_bar(pb, 1);
                }
            }
        }
    }
    if consumer_error.is_some() {
        stop.raise();
    }
    // Unblocks any worker still sending.
    drop(event_rx);
    shutdown_pipeline_handles(worker_handles)?;

    if let Some(e) = consumer_error {
        return Err(e);
    }
    pipeline::check_for_first_error(&first_error)?;
    Ok(summary)
}
